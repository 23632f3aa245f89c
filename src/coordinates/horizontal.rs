//! Horizontal (altitude/azimuth) coordinates
//!
//! ## Scene convention
//!
//! The 3D scene is y-up. A horizontal direction maps to the scene as
//!
//! - `x =  cos(alt) * sin(az)`
//! - `y =  sin(alt)`
//! - `z = -cos(alt) * cos(az)`
//!
//! so north (az = 0) lies along -z and east (az = 90°) along +x. Both the
//! flat and the dome projections use this mapping.

use nalgebra::Vector3;
use std::f64::consts::PI;

use super::Equatorial;

/// Denominators below this are treated as the zenith/pole singularity
const AZIMUTH_SINGULARITY: f64 = 1e-12;

/// Observer-centric direction on the sky
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizontal {
    /// Elevation above the horizon in radians, [-π/2, π/2]
    pub altitude: f64,
    /// Azimuth from north through east in radians, [0, 2π)
    pub azimuth: f64,
}

impl Horizontal {
    /// Create a new horizontal direction from radians
    pub fn new(altitude: f64, azimuth: f64) -> Self {
        Self { altitude, azimuth }
    }

    /// Convert an equatorial position for a given sidereal time and site latitude
    ///
    /// The azimuth comes from `acos`, which only covers half a circle; objects
    /// with a positive hour-angle sine (west of the meridian) get `2π - az`.
    /// Inverse-trig arguments are clamped into [-1, 1] so that values drifting
    /// marginally out of range never produce NaN.
    pub fn from_equatorial(position: &Equatorial, lst_hours: f64, latitude_degrees: f64) -> Self {
        let ha = position.hour_angle_degrees(lst_hours).to_radians();
        let dec = position.dec_degrees.to_radians();
        let lat = latitude_degrees.to_radians();

        let sin_alt = dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos();
        let altitude = sin_alt.clamp(-1.0, 1.0).asin();

        let denominator = altitude.cos() * lat.cos();
        let mut azimuth = if denominator.abs() < AZIMUTH_SINGULARITY {
            // Zenith or geographic pole: every azimuth is the same point
            0.0
        } else {
            let cos_az = (dec.sin() - altitude.sin() * lat.sin()) / denominator;
            cos_az.clamp(-1.0, 1.0).acos()
        };

        if ha.sin() > 0.0 {
            azimuth = 2.0 * PI - azimuth;
        }

        Self { altitude, azimuth }
    }

    /// Altitude in degrees
    pub fn altitude_degrees(&self) -> f64 {
        self.altitude.to_degrees()
    }

    /// Azimuth in degrees
    pub fn azimuth_degrees(&self) -> f64 {
        self.azimuth.to_degrees()
    }

    /// Whether the direction is above the horizon
    pub fn is_above_horizon(&self) -> bool {
        self.altitude >= 0.0
    }

    /// Same azimuth with negative altitudes raised to the horizon
    pub fn clamped_to_horizon(&self) -> Self {
        Self {
            altitude: self.altitude.max(0.0),
            azimuth: self.azimuth,
        }
    }

    /// Unit direction vector in scene axes
    pub fn to_unit_vector(&self) -> Vector3<f64> {
        let cos_alt = self.altitude.cos();
        Vector3::new(
            cos_alt * self.azimuth.sin(),
            self.altitude.sin(),
            -cos_alt * self.azimuth.cos(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_meridian_transit_southern_site() {
        // Sirius-like object on the meridian from a site at -32.49°
        let sirius = Equatorial::new(6.752, -16.72);
        let horizontal = Horizontal::from_equatorial(&sirius, 6.752, -32.49);

        // Transit altitude is 90° - |lat - dec|
        assert_abs_diff_eq!(horizontal.altitude_degrees(), 74.23, epsilon = 1e-6);
        // Declination is north of the site latitude, so it transits to the north
        assert!(horizontal.azimuth_degrees() < 1e-3 || horizontal.azimuth_degrees() > 359.999);
    }

    #[test]
    fn test_meridian_transit_south_of_zenith() {
        let canopus = Equatorial::new(6.4, -52.7);
        let horizontal = Horizontal::from_equatorial(&canopus, 6.4, -32.49);
        assert_abs_diff_eq!(horizontal.altitude_degrees(), 69.79, epsilon = 1e-6);
        assert_abs_diff_eq!(horizontal.azimuth_degrees(), 180.0, epsilon = 1e-3);
    }

    #[test]
    fn test_west_of_meridian_flips_azimuth() {
        let star = Equatorial::new(0.0, 0.0);
        // Three hours after transit the object is in the west
        let west = Horizontal::from_equatorial(&star, 3.0, 0.0);
        assert!(west.azimuth_degrees() > 180.0);
        // Three hours before transit it is in the east
        let east = Horizontal::from_equatorial(&star, 21.0, 0.0);
        assert!(east.azimuth_degrees() < 180.0);
        assert_abs_diff_eq!(west.azimuth_degrees(), 270.0, epsilon = 1e-9);
        assert_abs_diff_eq!(east.azimuth_degrees(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zenith_is_finite() {
        let overhead = Equatorial::new(5.0, -32.49);
        let horizontal = Horizontal::from_equatorial(&overhead, 5.0, -32.49);
        assert!(horizontal.azimuth.is_finite());
        assert_abs_diff_eq!(horizontal.altitude_degrees(), 90.0, epsilon = 1e-5);
    }

    #[test]
    fn test_unit_vector_axes() {
        let north = Horizontal::new(0.0, 0.0).to_unit_vector();
        assert_abs_diff_eq!(north.z, -1.0, epsilon = 1e-15);

        let east = Horizontal::new(0.0, PI / 2.0).to_unit_vector();
        assert_abs_diff_eq!(east.x, 1.0, epsilon = 1e-15);

        let up = Horizontal::new(PI / 2.0, 1.0).to_unit_vector();
        assert_abs_diff_eq!(up.y, 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(up.norm(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_clamped_to_horizon() {
        let below = Horizontal::new(-0.3, 1.2);
        assert!(!below.is_above_horizon());
        let clamped = below.clamped_to_horizon();
        assert_eq!(clamped.altitude, 0.0);
        assert_eq!(clamped.azimuth, 1.2);
    }
}
