//! Object tracking state machine
//!
//! The tracker is either idle or bound to one catalog object. While bound,
//! every update recomputes the object's scene position for the current
//! instant (independently of the coordinate cache) and aims the pointer at
//! it, overriding any manual rotation.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::catalogs::Catalog;
use crate::config::ObservingSite;
use crate::pointing::{angles_to_target, PointerVector};
use crate::projection::ProjectionMode;
use crate::time::local_sidereal_time;
use crate::{Result, SkytrackerError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectTracker {
    target: Option<String>,
}

impl ObjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `name`, matched case-insensitively against the catalog
    ///
    /// On success the catalog's spelling of the name is stored and returned.
    /// An unknown name leaves the tracker idle.
    pub fn start(&mut self, catalog: &Catalog, name: &str) -> Result<&str> {
        let object = catalog
            .lookup(name)
            .ok_or_else(|| SkytrackerError::ObjectNotFound(name.trim().to_string()))?;
        info!("Tracking {}", object.name);
        Ok(self.target.insert(object.name.clone()).as_str())
    }

    /// Return to idle; harmless when already idle
    pub fn stop(&mut self) {
        if let Some(name) = self.target.take() {
            info!("Stopped tracking {}", name);
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.target.is_some()
    }

    /// Name of the tracked object
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Yaw and pitch that aim `pointer` at the tracked object at `now`
    pub fn target_angles(
        &self,
        catalog: &Catalog,
        site: &ObservingSite,
        mode: &ProjectionMode,
        now: &DateTime<Utc>,
        pointer: &PointerVector,
    ) -> Option<(f64, f64)> {
        let name = self.target.as_deref()?;
        let Some(object) = catalog.lookup(name) else {
            debug!("Tracked object {} is no longer in the catalog", name);
            return None;
        };
        let lst = local_sidereal_time(now, site.longitude_degrees);
        let target = mode.project(&object.position, lst.hours, site.latitude_degrees);
        Some(angles_to_target(&target, &pointer.base()))
    }

    /// Aim `pointer` at the tracked object
    ///
    /// Returns false, leaving the pointer alone, when idle or when the tracked
    /// name has disappeared from the catalog.
    pub fn update(
        &self,
        catalog: &Catalog,
        site: &ObservingSite,
        mode: &ProjectionMode,
        now: &DateTime<Utc>,
        pointer: &mut PointerVector,
    ) -> bool {
        match self.target_angles(catalog, site, mode, now, pointer) {
            Some((yaw, pitch)) => {
                pointer.set_angles(yaw, pitch);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogs::{Category, CelestialObject};
    use crate::projection::DomeGeometry;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;
    use nalgebra::Point3;

    fn catalog() -> Catalog {
        Catalog::from_objects(vec![
            CelestialObject::new("Sirius", Category::Star, 6.7715556, -16.7474167),
            CelestialObject::new("Luna", Category::Moon, 12.5, -5.0),
        ])
    }

    #[test]
    fn test_start_unknown_stays_idle() {
        let mut tracker = ObjectTracker::new();
        let result = tracker.start(&catalog(), "nonexistent");
        assert!(matches!(result, Err(SkytrackerError::ObjectNotFound(ref n)) if n == "nonexistent"));
        assert!(!tracker.is_tracking());
        assert_eq!(tracker.target(), None);
    }

    #[test]
    fn test_start_any_case_stores_canonical_name() {
        let catalog = catalog();
        for spelling in ["Sirius", "sirius", "SIRIUS", " sIrIuS "] {
            let mut tracker = ObjectTracker::new();
            assert_eq!(tracker.start(&catalog, spelling).unwrap(), "Sirius");
            assert!(tracker.is_tracking());
            assert_eq!(tracker.target(), Some("Sirius"));
        }
        let mut tracker = ObjectTracker::new();
        assert_eq!(tracker.start(&catalog, "moon").unwrap(), "Luna");
    }

    #[test]
    fn test_failed_start_keeps_previous_target() {
        let catalog = catalog();
        let mut tracker = ObjectTracker::new();
        tracker.start(&catalog, "Sirius").unwrap();
        assert!(tracker.start(&catalog, "Vega").is_err());
        assert_eq!(tracker.target(), Some("Sirius"));
    }

    #[test]
    fn test_stop_returns_to_idle() {
        let mut tracker = ObjectTracker::new();
        tracker.start(&catalog(), "Sirius").unwrap();
        tracker.stop();
        assert!(!tracker.is_tracking());
        tracker.stop();
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn test_update_aims_pointer() {
        let catalog = catalog();
        let site = ObservingSite::default();
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();
        let mut tracker = ObjectTracker::new();
        let mut pointer = PointerVector::new(Point3::new(0.0, 0.5, 0.0), 0.0, 0.0, 3.0);

        for mode in [ProjectionMode::default(), ProjectionMode::Dome(DomeGeometry::default())] {
            tracker.stop();
            assert!(!tracker.update(&catalog, &site, &mode, &now, &mut pointer));

            tracker.start(&catalog, "sirius").unwrap();
            assert!(tracker.update(&catalog, &site, &mode, &now, &mut pointer));

            let lst = local_sidereal_time(&now, site.longitude_degrees);
            let sirius = catalog.lookup("Sirius").unwrap();
            let target = mode.project(&sirius.position, lst.hours, site.latitude_degrees);
            let expected = (target - pointer.base()).normalize();
            assert_abs_diff_eq!(pointer.direction(), expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_update_after_catalog_loses_target() {
        let mut tracker = ObjectTracker::new();
        tracker.start(&catalog(), "Sirius").unwrap();
        let mut pointer = PointerVector::default();
        let before = pointer;
        let now = Utc::now();
        assert!(!tracker.update(
            &Catalog::empty(),
            &ObservingSite::default(),
            &ProjectionMode::default(),
            &now,
            &mut pointer
        ));
        assert_eq!(pointer, before);
        assert!(tracker.is_tracking());
    }
}
