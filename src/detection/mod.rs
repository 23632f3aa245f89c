//! Which catalog object is being pointed or looked at
//!
//! Both queries scan the projected sky category by category in a fixed
//! priority order: stars, galaxies, planets, Moon, Sun. The first category
//! with a qualifying object wins, even when an object of a later category is
//! closer.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::cache::{ProjectedPoint, ProjectedSky};
use crate::catalogs::Category;
use crate::constants::{THRESHOLD_CAMERA_DEG, THRESHOLD_MOON, THRESHOLD_OBJECT, THRESHOLD_PLANET};

/// Acceptance radii for the detection queries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    /// Scene distance for stars and galaxies
    pub object: f64,
    /// Scene distance for planets
    pub planet: f64,
    /// Scene distance for the Moon and Sun
    pub moon: f64,
    /// Angle in degrees between the view direction and an object
    pub camera_degrees: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            object: THRESHOLD_OBJECT,
            planet: THRESHOLD_PLANET,
            moon: THRESHOLD_MOON,
            camera_degrees: THRESHOLD_CAMERA_DEG,
        }
    }
}

impl DetectionThresholds {
    /// Distance threshold for a category
    pub fn distance_for(&self, category: Category) -> f64 {
        match category {
            Category::Star | Category::Galaxy => self.object,
            Category::Planet => self.planet,
            Category::Moon | Category::Sun => self.moon,
        }
    }
}

/// Object whose projected position lies within its category threshold of `hit`
///
/// Within a category the first object in catalog order wins.
pub fn detect_by_point<'a>(
    hit: &Point3<f64>,
    sky: &'a ProjectedSky,
    thresholds: &DetectionThresholds,
) -> Option<&'a str> {
    Category::PRIORITY.iter().find_map(|category| {
        let limit = thresholds.distance_for(*category);
        sky.category(*category)
            .iter()
            .find(|point| (point.position - hit).norm() < limit)
            .map(|point| point.name.as_str())
    })
}

/// Object closest in angle to a view ray, if within the camera threshold
///
/// Within a category the object with the smallest angle wins.
pub fn detect_by_direction<'a>(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    sky: &'a ProjectedSky,
    thresholds: &DetectionThresholds,
) -> Option<&'a str> {
    let view = direction.try_normalize(0.0)?;
    Category::PRIORITY.iter().find_map(|category| {
        closest_by_angle(origin, &view, sky.category(*category), thresholds.camera_degrees)
            .map(|point| point.name.as_str())
    })
}

fn closest_by_angle<'a>(
    origin: &Point3<f64>,
    view: &Vector3<f64>,
    points: &'a [ProjectedPoint],
    threshold_degrees: f64,
) -> Option<&'a ProjectedPoint> {
    let mut best: Option<(f64, &ProjectedPoint)> = None;
    for point in points {
        let Some(to_object) = (point.position - origin).try_normalize(0.0) else {
            continue;
        };
        let angle = to_object.dot(view).clamp(-1.0, 1.0).acos().to_degrees();
        if angle < threshold_degrees && best.map_or(true, |(best_angle, _)| angle < best_angle) {
            best = Some((angle, point));
        }
    }
    best.map(|(_, point)| point)
}
