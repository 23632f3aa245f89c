//! Projected-coordinate cache
//!
//! Projecting the catalog costs several trig calls per object, while the sky
//! only rotates about 0.004° per second. The cache keeps the last projection
//! of the whole catalog and recomputes it only once the local sidereal time
//! has moved by more than a threshold.
//!
//! Each recomputation builds a complete [`ProjectedSky`] and swaps it in as a
//! new `Arc`, so holders of an older sky are never affected by an update.

use std::sync::Arc;

use log::debug;
use nalgebra::Point3;

use crate::catalogs::{Catalog, Category, CelestialObject};
use crate::config::ObservingSite;
use crate::constants::{FULL_CIRCLE_HOURS, LST_UPDATE_THRESHOLD_HOURS};
use crate::projection::ProjectionMode;

/// A catalog object's position in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedPoint {
    pub name: String,
    pub position: Point3<f64>,
}

impl ProjectedPoint {
    fn project(
        object: &CelestialObject,
        lst_hours: f64,
        site: &ObservingSite,
        mode: &ProjectionMode,
    ) -> Self {
        Self {
            name: object.name.clone(),
            position: mode.project(&object.position, lst_hours, site.latitude_degrees),
        }
    }
}

/// Scene positions of the whole catalog at one sidereal time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedSky {
    pub lst_hours: f64,
    pub stars: Vec<ProjectedPoint>,
    pub galaxies: Vec<ProjectedPoint>,
    pub planets: Vec<ProjectedPoint>,
    pub moon: Option<ProjectedPoint>,
    pub sun: Option<ProjectedPoint>,
}

impl ProjectedSky {
    /// Project every catalog object
    pub fn compute(
        catalog: &Catalog,
        lst_hours: f64,
        site: &ObservingSite,
        mode: &ProjectionMode,
    ) -> Self {
        let project_all = |objects: &[CelestialObject]| {
            objects
                .iter()
                .map(|object| ProjectedPoint::project(object, lst_hours, site, mode))
                .collect::<Vec<_>>()
        };
        Self {
            lst_hours,
            stars: project_all(catalog.stars()),
            galaxies: project_all(catalog.galaxies()),
            planets: project_all(catalog.planets()),
            moon: catalog
                .moon()
                .map(|moon| ProjectedPoint::project(moon, lst_hours, site, mode)),
            sun: catalog
                .sun()
                .map(|sun| ProjectedPoint::project(sun, lst_hours, site, mode)),
        }
    }

    /// Points of one category
    pub fn category(&self, category: Category) -> &[ProjectedPoint] {
        match category {
            Category::Star => &self.stars,
            Category::Galaxy => &self.galaxies,
            Category::Planet => &self.planets,
            Category::Moon => self.moon.as_ref().map(std::slice::from_ref).unwrap_or(&[]),
            Category::Sun => self.sun.as_ref().map(std::slice::from_ref).unwrap_or(&[]),
        }
    }

    /// All points in detection priority order
    pub fn iter(&self) -> impl Iterator<Item = &ProjectedPoint> + '_ {
        Category::PRIORITY
            .iter()
            .flat_map(move |category| self.category(*category).iter())
    }

    /// Position of a named object, case-insensitive
    pub fn position_of(&self, name: &str) -> Option<Point3<f64>> {
        self.iter()
            .find(|point| point.name.eq_ignore_ascii_case(name))
            .map(|point| point.position)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shortest distance between two sidereal times in hours, in [0, 12]
pub fn circular_lst_difference(a_hours: f64, b_hours: f64) -> f64 {
    let diff = (a_hours - b_hours).abs() % FULL_CIRCLE_HOURS;
    if diff > FULL_CIRCLE_HOURS / 2.0 {
        FULL_CIRCLE_HOURS - diff
    } else {
        diff
    }
}

/// LST-gated cache of the projected catalog
#[derive(Debug, Clone)]
pub struct CoordinateCache {
    threshold_hours: f64,
    last_lst: Option<f64>,
    sky: Arc<ProjectedSky>,
}

impl Default for CoordinateCache {
    fn default() -> Self {
        Self::new(LST_UPDATE_THRESHOLD_HOURS)
    }
}

impl CoordinateCache {
    pub fn new(threshold_hours: f64) -> Self {
        Self {
            threshold_hours,
            last_lst: None,
            sky: Arc::new(ProjectedSky::default()),
        }
    }

    /// Whether the sky must be recomputed for `lst_hours`
    ///
    /// True before the first update, after [`invalidate`](Self::invalidate),
    /// or once the sidereal time has moved by at least the threshold along
    /// the shorter arc (so 23.9999h → 0.0001h is a tiny step).
    pub fn should_update(&self, lst_hours: f64) -> bool {
        match self.last_lst {
            None => true,
            Some(last) => circular_lst_difference(lst_hours, last) >= self.threshold_hours,
        }
    }

    /// Recompute the sky and swap it in
    pub fn update(
        &mut self,
        lst_hours: f64,
        catalog: &Catalog,
        site: &ObservingSite,
        mode: &ProjectionMode,
    ) -> Arc<ProjectedSky> {
        let sky = Arc::new(ProjectedSky::compute(catalog, lst_hours, site, mode));
        debug!(
            "Projected {} objects at LST {:.4}h",
            sky.len(),
            lst_hours
        );
        self.sky = Arc::clone(&sky);
        self.last_lst = Some(lst_hours);
        sky
    }

    /// Recompute only if [`should_update`](Self::should_update) says so
    ///
    /// Returns the fresh sky when a recomputation happened.
    pub fn refresh(
        &mut self,
        lst_hours: f64,
        catalog: &Catalog,
        site: &ObservingSite,
        mode: &ProjectionMode,
    ) -> Option<Arc<ProjectedSky>> {
        if self.should_update(lst_hours) {
            Some(self.update(lst_hours, catalog, site, mode))
        } else {
            None
        }
    }

    /// Force the next [`should_update`](Self::should_update) to return true
    pub fn invalidate(&mut self) {
        self.last_lst = None;
    }

    /// Last computed sky; empty before the first update
    pub fn sky(&self) -> Arc<ProjectedSky> {
        Arc::clone(&self.sky)
    }

    pub fn last_lst(&self) -> Option<f64> {
        self.last_lst
    }

    pub fn threshold_hours(&self) -> f64 {
        self.threshold_hours
    }
}
