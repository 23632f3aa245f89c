//! Sky projection onto the display scene
//!
//! Two projections share the same horizontal-coordinate derivation:
//!
//! - **Flat room**: the horizontal unit vector is rescaled so that its largest
//!   axis equals the world scale, which places every object on the surface of
//!   the room cube. This compresses distance on purpose; it is a display
//!   mapping, not astrometry.
//! - **Dome**: objects are placed on a hemisphere of a given radius whose
//!   centre sits `ground_offset` below the scene origin, so the rim meets the
//!   floor. Objects below the horizon are raised onto the horizon instead of
//!   being dropped, so every catalog object always has a position.
//!
//! Inputs are assumed range-validated by the catalog loader; out-of-range
//! declinations or latitudes give defined but meaningless positions.

use nalgebra::{Point3, Vector3};

use crate::constants::{DOME_GROUND_OFFSET, DOME_RADIUS, WORLD_SCALE};
use crate::coordinates::{Equatorial, Horizontal};

/// Hemisphere used by the dome projection and dome ray casting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomeGeometry {
    /// Sphere radius
    pub radius: f64,
    /// Distance the sphere centre sits below the scene origin
    pub ground_offset: f64,
}

impl DomeGeometry {
    /// Create a dome of the given radius and ground offset
    pub fn new(radius: f64, ground_offset: f64) -> Self {
        Self {
            radius,
            ground_offset,
        }
    }

    /// Centre of the dome sphere
    pub fn center(&self) -> Point3<f64> {
        Point3::new(0.0, -self.ground_offset, 0.0)
    }

    /// Lowest height still on the hemisphere
    pub fn ground_cutoff(&self) -> f64 {
        -self.ground_offset
    }

    /// Point on the dome surface in a horizontal direction
    pub fn surface_point(&self, direction: &Horizontal) -> Point3<f64> {
        self.center() + direction.to_unit_vector() * self.radius
    }

    /// Move a point toward the dome centre by `factor` of its distance
    ///
    /// Used to draw markers just inside the dome so they do not z-fight with
    /// the rendered dome surface.
    pub fn push_inside(&self, point: &Point3<f64>, factor: f64) -> Point3<f64> {
        let center = self.center();
        center + (*point - center) * factor
    }
}

impl Default for DomeGeometry {
    fn default() -> Self {
        Self::new(DOME_RADIUS, DOME_GROUND_OFFSET)
    }
}

/// Projection selected at configuration time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionMode {
    /// Room cube whose largest-axis extent is `world_scale`
    Flat { world_scale: f64 },
    /// Hemispherical dome
    Dome(DomeGeometry),
}

impl Default for ProjectionMode {
    fn default() -> Self {
        ProjectionMode::Flat {
            world_scale: WORLD_SCALE,
        }
    }
}

impl ProjectionMode {
    /// Project an equatorial position into the scene
    pub fn project(
        &self,
        position: &Equatorial,
        lst_hours: f64,
        latitude_degrees: f64,
    ) -> Point3<f64> {
        match self {
            ProjectionMode::Flat { world_scale } => project_flat(
                position.ra_hours,
                position.dec_degrees,
                lst_hours,
                latitude_degrees,
                *world_scale,
            ),
            ProjectionMode::Dome(dome) => project_dome(
                position.ra_hours,
                position.dec_degrees,
                lst_hours,
                latitude_degrees,
                dome,
            ),
        }
    }

    /// Whether this is the dome projection
    pub fn is_dome(&self) -> bool {
        matches!(self, ProjectionMode::Dome(_))
    }
}

/// Project onto the room cube
///
/// Returns a point whose largest absolute coordinate equals `world_scale`.
pub fn project_flat(
    ra_hours: f64,
    dec_degrees: f64,
    lst_hours: f64,
    latitude_degrees: f64,
    world_scale: f64,
) -> Point3<f64> {
    let position = Equatorial::new(ra_hours, dec_degrees);
    let unit = Horizontal::from_equatorial(&position, lst_hours, latitude_degrees).to_unit_vector();
    Point3::from(scale_to_cube(&unit, world_scale))
}

/// Project onto the dome hemisphere
///
/// The returned point lies at distance `dome.radius` from the dome centre and
/// never below `dome.ground_cutoff()`.
pub fn project_dome(
    ra_hours: f64,
    dec_degrees: f64,
    lst_hours: f64,
    latitude_degrees: f64,
    dome: &DomeGeometry,
) -> Point3<f64> {
    let position = Equatorial::new(ra_hours, dec_degrees);
    let horizontal = Horizontal::from_equatorial(&position, lst_hours, latitude_degrees);
    dome.surface_point(&horizontal.clamped_to_horizon())
}

/// Rescale a direction so its largest-magnitude axis equals `scale`
fn scale_to_cube(direction: &Vector3<f64>, scale: f64) -> Vector3<f64> {
    let largest = direction.amax();
    if largest == 0.0 {
        return Vector3::zeros();
    }
    direction * (scale / largest)
}
