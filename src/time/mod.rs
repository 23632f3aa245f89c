//! Time module for sidereal time calculations
//!
//! Converts UTC instants into Julian dates and computes Greenwich Mean and
//! Local Sidereal Time. The sidereal time is the clock that drives the whole
//! sky projection: every projected position is a function of it.
//!
//! All arithmetic is done in `f64`, and the fractional day includes the
//! sub-second part of the instant so that the sky does not stutter or drift
//! during a long session.

use crate::constants::{
    DEG_PER_HOUR, FULL_CIRCLE_DEG, GMST_AT_J2000_DEG, GMST_DEG_PER_DAY, GMST_T2,
    GMST_T3_DIVISOR, J2000, JULIAN_CENTURY,
};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::fmt;

/// Local sidereal time expressed both in degrees and in hours
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiderealTime {
    /// Sidereal angle in degrees, always in [0, 360)
    pub degrees: f64,
    /// Sidereal time in hours, always in [0, 24)
    pub hours: f64,
}

impl SiderealTime {
    /// Build from an angle in degrees, reducing it into [0, 360)
    pub fn from_degrees(degrees: f64) -> Self {
        let degrees = wrap_degrees(degrees);
        Self {
            degrees,
            hours: degrees / DEG_PER_HOUR,
        }
    }

    /// Build from a time in hours, reducing it into [0, 24)
    pub fn from_hours(hours: f64) -> Self {
        Self::from_degrees(hours * DEG_PER_HOUR)
    }
}

impl fmt::Display for SiderealTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}° ({:.2}h)", self.degrees, self.hours)
    }
}

/// Reduce an angle into [0, 360)
///
/// `rem_euclid` can return exactly 360.0 for tiny negative inputs because of
/// rounding, so that case is folded back to zero.
pub fn wrap_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(FULL_CIRCLE_DEG);
    if wrapped >= FULL_CIRCLE_DEG {
        0.0
    } else {
        wrapped
    }
}

/// Julian Date of a UTC instant
///
/// Uses the standard Gregorian calendar conversion: January and February are
/// counted as months 13 and 14 of the previous year so that the leap day
/// falls at the end of the computational year.
pub fn julian_date(utc: &DateTime<Utc>) -> f64 {
    let mut year = utc.year() as f64;
    let mut month = utc.month() as f64;
    let day = utc.day() as f64;

    if month <= 2.0 {
        year -= 1.0;
        month += 12.0;
    }

    let a = (year / 100.0).trunc();
    let b = 2.0 - a + (a / 4.0).trunc();
    let jd0 = (365.25 * (year + 4716.0)).trunc() + (30.6001 * (month + 1.0)).trunc() + day + b
        - 1524.5;

    jd0 + day_fraction(utc)
}

/// Fraction of the day elapsed at `utc`, including sub-second precision
fn day_fraction(utc: &DateTime<Utc>) -> f64 {
    // Leap-second representation in chrono stores nanoseconds >= 1e9
    let seconds = utc.second() as f64 + utc.nanosecond() as f64 / 1_000_000_000.0;
    let hours = utc.hour() as f64 + utc.minute() as f64 / 60.0 + seconds / 3600.0;
    hours / 24.0
}

/// Julian centuries elapsed since J2000.0
pub fn centuries_since_j2000(jd: f64) -> f64 {
    (jd - J2000) / JULIAN_CENTURY
}

/// Greenwich Mean Sidereal Time in degrees, reduced into [0, 360)
pub fn greenwich_mean_sidereal_time(jd: f64) -> f64 {
    let t = centuries_since_j2000(jd);
    let gmst = GMST_AT_J2000_DEG + GMST_DEG_PER_DAY * (jd - J2000) + GMST_T2 * t * t
        - t * t * t / GMST_T3_DIVISOR;
    wrap_degrees(gmst)
}

/// Local Sidereal Time for an instant and an observer longitude (east positive)
///
/// # Examples
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use skytracker::time::local_sidereal_time;
///
/// let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
/// let lst = local_sidereal_time(&j2000, 0.0);
/// assert!((lst.degrees - 280.46061837).abs() < 1e-6);
/// assert!((lst.hours - lst.degrees / 15.0).abs() < 1e-12);
/// ```
pub fn local_sidereal_time(utc: &DateTime<Utc>, longitude_degrees: f64) -> SiderealTime {
    let gmst = greenwich_mean_sidereal_time(julian_date(utc));
    SiderealTime::from_degrees(gmst + longitude_degrees)
}
