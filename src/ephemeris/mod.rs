//! Planet, Moon and Sun positions from the JPL Horizons service
//!
//! Solar-system bodies drift against the stars, so their catalog RA/Dec
//! values go stale within days. This module asks Horizons for the
//! topocentric apparent RA/Dec of each body at one instant and turns the
//! answers into [`EphemerisUpdate`]s for [`CatalogStore::apply_ephemeris`].
//!
//! [`CatalogStore::apply_ephemeris`]: crate::catalogs::CatalogStore::apply_ephemeris

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;

use crate::catalogs::{Catalog, Category, EphemerisUpdate};
use crate::config::ObservingSite;
use crate::constants::DEG_PER_HOUR;
use crate::{Result, SkytrackerError};

/// Horizons REST endpoint
pub const HORIZONS_URL: &str = "https://ssd.jpl.nasa.gov/api/horizons.api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pairs of (catalog name, Horizons body ID)
const BODY_ID_PAIRS: [(&str, &str); 9] = [
    ("Mercurio", "199"),
    ("Venus", "299"),
    ("Marte", "499"),
    ("Jupiter", "599"),
    ("Saturno", "699"),
    ("Urano", "799"),
    ("Neptuno", "899"),
    ("Luna", "301"),
    ("Sol", "10"),
];

lazy_static! {
    /// Map from lowercase catalog names to Horizons IDs
    static ref BODY_IDS: HashMap<String, &'static str> = {
        let mut m = HashMap::new();
        for &(name, id) in BODY_ID_PAIRS.iter() {
            m.insert(name.to_lowercase(), id);
        }
        // English spellings used by some catalogs
        for &(name, id) in [("mercury", "199"), ("mars", "499"), ("saturn", "699"),
            ("uranus", "799"), ("neptune", "899"), ("moon", "301"), ("sun", "10")].iter()
        {
            m.insert(name.to_string(), id);
        }
        m
    };

    /// One ephemeris row: date, time, optional marker flags, RA and Dec in degrees
    static ref EPHEMERIS_ROW: std::result::Result<Regex, regex::Error> = Regex::new(
        r"^\s*\d{4}-[A-Za-z]{3}-\d{2}\s+\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?\s+(?:[^\d\s+\-.]{1,3}\s+)?([+-]?\d+(?:\.\d+)?)\s+([+-]?\d+(?:\.\d+)?)"
    );
}

/// Horizons body ID for a catalog name, case-insensitive
pub fn horizons_id(name: &str) -> Option<&'static str> {
    BODY_IDS.get(&name.trim().to_lowercase()).copied()
}

/// Extract RA (hours) and Dec (degrees) from a plain-text Horizons reply
///
/// Only the first row between the `$$SOE` and `$$EOE` markers is used.
pub fn parse_radec_response(text: &str) -> Result<(f64, f64)> {
    let row_pattern = EPHEMERIS_ROW
        .as_ref()
        .map_err(|e| SkytrackerError::Ephemeris(format!("Failed to compile regex: {}", e)))?;
    let start = text
        .find("$$SOE")
        .ok_or_else(|| SkytrackerError::Ephemeris(horizons_complaint(text)))?;
    let block = &text[start + "$$SOE".len()..];
    let end = block
        .find("$$EOE")
        .ok_or_else(|| SkytrackerError::Ephemeris("unterminated ephemeris block".to_string()))?;

    let row = block[..end]
        .lines()
        .find_map(|line| row_pattern.captures(line))
        .ok_or_else(|| SkytrackerError::Ephemeris("no ephemeris rows".to_string()))?;

    let ra_degrees: f64 = row[1]
        .parse()
        .map_err(|_| SkytrackerError::Ephemeris(format!("bad RA '{}'", &row[1])))?;
    let dec_degrees: f64 = row[2]
        .parse()
        .map_err(|_| SkytrackerError::Ephemeris(format!("bad Dec '{}'", &row[2])))?;
    if !(-90.0..=90.0).contains(&dec_degrees) {
        return Err(SkytrackerError::Ephemeris(format!(
            "Dec {} outside [-90, 90]",
            dec_degrees
        )));
    }
    Ok(((ra_degrees / DEG_PER_HOUR).rem_euclid(24.0), dec_degrees))
}

/// First line of a reply without an ephemeris, which usually carries the reason
fn horizons_complaint(text: &str) -> String {
    let reason = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('*'))
        .unwrap_or("empty reply");
    format!("no ephemeris in reply: {}", reason)
}

/// Query parameters for one body at one instant, seen from `site`
pub fn query_parameters(id: &str, site: &ObservingSite, when: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let stop = when + ChronoDuration::minutes(1);
    let quoted = |value: String| format!("'{}'", value);
    vec![
        ("format", "text".to_string()),
        ("COMMAND", quoted(id.to_string())),
        ("OBJ_DATA", quoted("NO".to_string())),
        ("MAKE_EPHEM", quoted("YES".to_string())),
        ("EPHEM_TYPE", quoted("OBSERVER".to_string())),
        ("CENTER", quoted("coord@399".to_string())),
        ("COORD_TYPE", quoted("GEODETIC".to_string())),
        (
            "SITE_COORD",
            quoted(format!(
                "{:.6},{:.6},0",
                site.longitude_degrees, site.latitude_degrees
            )),
        ),
        ("START_TIME", quoted(when.format("%Y-%m-%d %H:%M").to_string())),
        ("STOP_TIME", quoted(stop.format("%Y-%m-%d %H:%M").to_string())),
        ("STEP_SIZE", quoted("1m".to_string())),
        ("QUANTITIES", quoted("1".to_string())),
        ("ANG_FORMAT", quoted("DEG".to_string())),
    ]
}

/// Blocking Horizons client
pub struct HorizonsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    site: ObservingSite,
}

impl HorizonsClient {
    pub fn new(site: ObservingSite) -> Result<Self> {
        Self::with_base_url(site, HORIZONS_URL)
    }

    /// Client against another endpoint, e.g. a mirror or a local stub
    pub fn with_base_url(site: ObservingSite, base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SkytrackerError::Ephemeris(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            site,
        })
    }

    /// Position of one catalog body at `when`
    pub fn fetch(&self, name: &str, when: DateTime<Utc>) -> Result<EphemerisUpdate> {
        let id = horizons_id(name)
            .ok_or_else(|| SkytrackerError::Ephemeris(format!("no Horizons ID for '{}'", name)))?;
        let response = self
            .client
            .get(&self.base_url)
            .query(&query_parameters(id, &self.site, when))
            .send()
            .map_err(|e| SkytrackerError::Ephemeris(format!("request for {} failed: {}", name, e)))?;
        if !response.status().is_success() {
            return Err(SkytrackerError::Ephemeris(format!(
                "request for {} failed, status: {}",
                name,
                response.status()
            )));
        }
        let text = response
            .text()
            .map_err(|e| SkytrackerError::Ephemeris(format!("reading reply for {}: {}", name, e)))?;
        let (ra_hours, dec_degrees) = parse_radec_response(&text)?;
        Ok(EphemerisUpdate::new(name, ra_hours, dec_degrees))
    }

    /// Positions of every planet, Moon and Sun in `catalog` that Horizons knows
    ///
    /// Bodies that fail are logged and left out; the catalog keeps their old
    /// coordinates.
    pub fn fetch_catalog(&self, catalog: &Catalog, when: DateTime<Utc>) -> Vec<EphemerisUpdate> {
        let bodies: Vec<&str> = catalog
            .iter()
            .filter(|object| {
                matches!(object.category, Category::Planet | Category::Moon | Category::Sun)
            })
            .map(|object| object.name.as_str())
            .collect();

        let mut updates = Vec::with_capacity(bodies.len());
        for name in bodies {
            if horizons_id(name).is_none() {
                warn!("Skipping {}: no Horizons ID", name);
                continue;
            }
            match self.fetch(name, when) {
                Ok(update) => {
                    info!(
                        "{}: RA {:.6} h, Dec {:.6}°",
                        name, update.position.ra_hours, update.position.dec_degrees
                    );
                    updates.push(update);
                }
                Err(e) => warn!("Keeping previous position of {}: {}", name, e),
            }
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;
    use rstest::rstest;

    const REPLY: &str = r#"
*******************************************************************************
Ephemeris / API_USER Wed Jan 15 03:00:00 2025 Pasadena, USA      / Horizons
*******************************************************************************
 Date__(UT)__HR:MN     R.A.___(ICRF)___DEC
***************************************************
$$SOE
 2025-Jan-15 03:00 *m  356.61253  -4.98760
 2025-Jan-15 03:01 *m  356.61300  -4.98700
$$EOE
***************************************************
"#;

    #[test]
    fn test_parse_reply() {
        let (ra, dec) = parse_radec_response(REPLY).unwrap();
        assert_abs_diff_eq!(ra, 356.61253 / 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dec, -4.98760, epsilon = 1e-12);
    }

    #[rstest]
    #[case(" 2025-Jan-15 03:00     123.45000  12.50000", 8.23, 12.5)]
    #[case(" 2025-Jan-15 03:00:00.000 C   0.00000 -89.99000", 0.0, -89.99)]
    #[case(" 2025-Jan-15 03:00 N   359.99999 +1.00000", 23.9999993, 1.0)]
    fn test_row_variants(#[case] row: &str, #[case] ra: f64, #[case] dec: f64) {
        let text = format!("$$SOE\n{}\n$$EOE\n", row);
        let (got_ra, got_dec) = parse_radec_response(&text).unwrap();
        assert_abs_diff_eq!(got_ra, ra, epsilon = 1e-6);
        assert_abs_diff_eq!(got_dec, dec, epsilon = 1e-9);
    }

    #[test]
    fn test_reply_without_ephemeris() {
        let err = parse_radec_response("\n  No matches found.\n").unwrap_err();
        assert!(err.to_string().contains("No matches found"));
        assert!(parse_radec_response("$$SOE\n$$EOE\n").is_err());
        assert!(parse_radec_response("$$SOE\n 2025-Jan-15 03:00  1.0 2.0\n").is_err());
    }

    #[test]
    fn test_body_ids() {
        assert_eq!(horizons_id("Marte"), Some("499"));
        assert_eq!(horizons_id(" luna "), Some("301"));
        assert_eq!(horizons_id("MOON"), Some("301"));
        assert_eq!(horizons_id("Sol"), Some("10"));
        assert_eq!(horizons_id("Sirius"), None);
    }

    #[test]
    fn test_query_parameters() {
        let when = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();
        let params = query_parameters("499", &ObservingSite::default(), when);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("COMMAND"), "'499'");
        assert_eq!(get("QUANTITIES"), "'1'");
        assert_eq!(get("ANG_FORMAT"), "'DEG'");
        assert_eq!(get("START_TIME"), "'2025-01-15 03:00'");
        assert_eq!(get("STOP_TIME"), "'2025-01-15 03:01'");
        assert_eq!(get("SITE_COORD"), "'-58.229712,-32.495417,0'");
    }
}
