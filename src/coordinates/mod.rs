//! Equatorial and horizontal coordinate systems
//!
//! Catalog positions are stored as equatorial coordinates (right ascension in
//! hours, declination in degrees). For display they are converted into the
//! observer-centric horizontal system (altitude above the horizon, azimuth
//! measured from north) for a given local sidereal time and site latitude.

pub mod horizontal;

pub use horizontal::Horizontal;

use crate::constants::{DEG_PER_HOUR, FULL_CIRCLE_HOURS};
use serde::{Deserialize, Serialize};

/// Position on the celestial sphere
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equatorial {
    /// Right ascension in hours, normalized to [0, 24)
    pub ra_hours: f64,
    /// Declination in degrees
    pub dec_degrees: f64,
}

impl Equatorial {
    /// Create a new position, wrapping the right ascension into [0, 24)
    pub fn new(ra_hours: f64, dec_degrees: f64) -> Self {
        Self {
            ra_hours: normalize_ra_hours(ra_hours),
            dec_degrees,
        }
    }

    /// Create a new position from a right ascension given in degrees
    pub fn from_degrees(ra_degrees: f64, dec_degrees: f64) -> Self {
        Self::new(ra_degrees / DEG_PER_HOUR, dec_degrees)
    }

    /// Hour angle in degrees for a given local sidereal time in hours
    ///
    /// Positive values are west of the meridian. The result is not reduced.
    pub fn hour_angle_degrees(&self, lst_hours: f64) -> f64 {
        (lst_hours - self.ra_hours) * DEG_PER_HOUR
    }

    /// Whether the declination is a valid latitude on the sphere
    pub fn is_valid(&self) -> bool {
        self.ra_hours.is_finite()
            && self.dec_degrees.is_finite()
            && (-90.0..=90.0).contains(&self.dec_degrees)
    }
}

/// Wrap a right ascension into [0, 24) hours
pub fn normalize_ra_hours(ra_hours: f64) -> f64 {
    let wrapped = ra_hours.rem_euclid(FULL_CIRCLE_HOURS);
    if wrapped >= FULL_CIRCLE_HOURS {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ra_normalization() {
        assert_abs_diff_eq!(Equatorial::new(25.0, 0.0).ra_hours, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Equatorial::new(-1.0, 0.0).ra_hours, 23.0, epsilon = 1e-12);
        assert_eq!(Equatorial::new(24.0, 0.0).ra_hours, 0.0);
        assert_eq!(normalize_ra_hours(-1e-18), 0.0);
    }

    #[test]
    fn test_from_degrees() {
        let vega = Equatorial::from_degrees(279.234, 38.783);
        assert_abs_diff_eq!(vega.ra_hours, 18.6156, epsilon = 1e-9);
        assert_eq!(vega.dec_degrees, 38.783);
    }

    #[test]
    fn test_hour_angle() {
        let sirius = Equatorial::new(6.752, -16.72);
        assert_abs_diff_eq!(sirius.hour_angle_degrees(6.752), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sirius.hour_angle_degrees(7.752), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_validity() {
        assert!(Equatorial::new(3.0, 89.0).is_valid());
        assert!(!Equatorial::new(3.0, 91.0).is_valid());
        assert!(!Equatorial::new(3.0, f64::NAN).is_valid());
    }
}
