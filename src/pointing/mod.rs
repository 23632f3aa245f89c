//! Pointing vector geometry
//!
//! The pointer is a ray with a fixed base point, a yaw and a pitch. Its
//! direction is
//!
//! - `x = cos(pitch) * sin(yaw)`
//! - `y = sin(pitch)`
//! - `z = cos(pitch) * cos(yaw)`
//!
//! and [`angles_to_target`] is the exact inverse of that formula, so aiming
//! at a point and then following the pointer for the base-to-target distance
//! lands on the point again. With the scene's horizontal mapping this puts
//! pointer yaw at `180° - azimuth`.

pub mod ray;

pub use ray::{intersect_dome, intersect_room, Boundary, Ray, RoomBounds};

use nalgebra::{Point3, Vector3};

use crate::constants::PITCH_LIMIT_DEG;
use crate::time::wrap_degrees;

/// Yaw and pitch in degrees that aim from `base` at `target`
///
/// # Examples
///
/// ```rust
/// use nalgebra::Point3;
/// use skytracker::pointing::angles_to_target;
///
/// let (yaw, pitch) = angles_to_target(&Point3::new(1.0, 1.0, 0.0), &Point3::origin());
/// assert!((yaw - 90.0).abs() < 1e-12);
/// assert!((pitch - 45.0).abs() < 1e-12);
/// ```
pub fn angles_to_target(target: &Point3<f64>, base: &Point3<f64>) -> (f64, f64) {
    let delta = target - base;
    let yaw = delta.x.atan2(delta.z).to_degrees();
    let horizontal = (delta.x * delta.x + delta.z * delta.z).sqrt();
    let pitch = delta.y.atan2(horizontal).to_degrees();
    (yaw, pitch)
}

/// Unit direction for a yaw and pitch in degrees
pub fn direction_from_angles(yaw_degrees: f64, pitch_degrees: f64) -> Vector3<f64> {
    let yaw = yaw_degrees.to_radians();
    let pitch = pitch_degrees.to_radians();
    Vector3::new(
        pitch.cos() * yaw.sin(),
        pitch.sin(),
        pitch.cos() * yaw.cos(),
    )
}

/// Directed pointer with a fixed base
///
/// Yaw is kept in [0, 360) and pitch in [-89, 89] degrees by every mutator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerVector {
    base: Point3<f64>,
    yaw: f64,
    pitch: f64,
    length: f64,
}

impl PointerVector {
    /// Create a pointer; the angles are normalized immediately
    pub fn new(base: Point3<f64>, yaw_degrees: f64, pitch_degrees: f64, length: f64) -> Self {
        let mut pointer = Self {
            base,
            yaw: 0.0,
            pitch: 0.0,
            length,
        };
        pointer.set_angles(yaw_degrees, pitch_degrees);
        pointer
    }

    pub fn base(&self) -> Point3<f64> {
        self.base
    }

    /// Yaw in degrees, [0, 360)
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Pitch in degrees, [-89, 89]
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Overwrite both angles
    pub fn set_angles(&mut self, yaw_degrees: f64, pitch_degrees: f64) {
        self.yaw = wrap_degrees(yaw_degrees);
        self.pitch = pitch_degrees.clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
    }

    /// Apply relative yaw/pitch input
    pub fn rotate(&mut self, delta_yaw: f64, delta_pitch: f64) {
        self.set_angles(self.yaw + delta_yaw, self.pitch + delta_pitch);
    }

    /// Aim at a scene point
    pub fn aim_at(&mut self, target: &Point3<f64>) {
        let (yaw, pitch) = angles_to_target(target, &self.base);
        self.set_angles(yaw, pitch);
    }

    /// Unit direction of the pointer
    pub fn direction(&self) -> Vector3<f64> {
        direction_from_angles(self.yaw, self.pitch)
    }

    /// Tip of the drawn pointer, `base + length * direction`
    pub fn end_point(&self) -> Point3<f64> {
        self.base + self.direction() * self.length
    }

    /// Ray from the base along the pointer direction
    pub fn ray(&self) -> Ray {
        Ray::new(self.base, self.direction())
    }

    /// Where the pointer meets `boundary`, or `None` if it points at nothing
    pub fn intersect(&self, boundary: &Boundary) -> Option<Point3<f64>> {
        boundary.intersect(&self.ray())
    }
}

impl Default for PointerVector {
    fn default() -> Self {
        Self::new(Point3::origin(), 45.0, 45.0, 3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WORLD_MAX;
    use crate::coordinates::Horizontal;
    use crate::projection::DomeGeometry;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Point3::new(10.0, 5.0, 3.0), Point3::origin())]
    #[case(Point3::new(-7.5, 2.0, -12.0), Point3::new(0.0, 0.5, 0.0))]
    #[case(Point3::new(0.0, -0.2, 30.0), Point3::new(1.0, 0.0, -1.0))]
    #[case(Point3::new(-30.0, 28.0, 4.0), Point3::new(-2.0, 1.0, 2.0))]
    fn test_angles_round_trip(#[case] target: Point3<f64>, #[case] base: Point3<f64>) {
        let (yaw, pitch) = angles_to_target(&target, &base);
        let distance = (target - base).norm();
        let reconstructed = base + direction_from_angles(yaw, pitch) * distance;
        assert_abs_diff_eq!(reconstructed, target, epsilon = 1e-9);
    }

    #[test]
    fn test_pointer_aim_matches_target() {
        let base = Point3::new(0.0, 0.5, 0.0);
        let target = Point3::new(-12.0, 9.0, 20.0);
        let mut pointer = PointerVector::new(base, 0.0, 0.0, 3.0);
        pointer.aim_at(&target);

        let unit = (target - base).normalize();
        assert_abs_diff_eq!(pointer.direction(), unit, epsilon = 1e-12);
        assert_abs_diff_eq!(pointer.end_point(), base + unit * 3.0, epsilon = 1e-12);
        assert!((0.0..360.0).contains(&pointer.yaw()));
    }

    #[test]
    fn test_yaw_is_one_eighty_minus_azimuth() {
        let horizontal = Horizontal::new(0.4, 1.1);
        let point = Point3::from(horizontal.to_unit_vector() * 30.0);
        let (yaw, pitch) = angles_to_target(&point, &Point3::origin());
        assert_abs_diff_eq!(
            wrap_degrees(yaw),
            wrap_degrees(180.0 - horizontal.azimuth_degrees()),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(pitch, horizontal.altitude_degrees(), epsilon = 1e-9);
    }

    #[test]
    fn test_angle_normalization() {
        let mut pointer = PointerVector::new(Point3::origin(), -30.0, 120.0, 1.0);
        assert_abs_diff_eq!(pointer.yaw(), 330.0, epsilon = 1e-12);
        assert_eq!(pointer.pitch(), 89.0);

        pointer.rotate(40.0, -200.0);
        assert_abs_diff_eq!(pointer.yaw(), 10.0, epsilon = 1e-12);
        assert_eq!(pointer.pitch(), -89.0);

        pointer.set_angles(720.0, 0.0);
        assert_eq!(pointer.yaw(), 0.0);
    }

    #[test]
    fn test_pointer_room_hit() {
        let pointer = PointerVector::new(Point3::origin(), 0.0, 0.0, 3.0);
        let hit = pointer.intersect(&Boundary::default()).unwrap();
        assert_abs_diff_eq!(hit, Point3::new(0.0, 0.0, WORLD_MAX), epsilon = 1e-12);
    }

    #[test]
    fn test_pointer_dome_hit_near_zenith() {
        let dome = DomeGeometry::default();
        let pointer = PointerVector::new(Point3::origin(), 0.0, 89.0, 3.0);
        let hit = pointer.intersect(&Boundary::dome(dome)).unwrap();
        assert!(hit.y > dome.radius * 0.9);
        assert!(hit.x.abs() < 1.0);
    }
}
