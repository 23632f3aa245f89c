//! Celestial object catalog
//!
//! The catalog is a small, closed set of named objects: bright stars,
//! galaxies, the naked-eye planets, the Moon and optionally the Sun. Each has
//! a fixed equatorial position. Planets and the Moon move, so their positions
//! are refreshed from time to time by an ephemeris update, which produces a
//! whole new catalog snapshot (see [`CatalogStore`]).

pub mod background;
mod document;
mod store;

pub use background::generate_background_stars;
pub use document::{CatalogDocument, ObjectRecord};
pub use store::CatalogStore;

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::coordinates::Equatorial;

/// Names under which the Moon can always be looked up
const MOON_ALIASES: [&str; 2] = ["moon", "luna"];

/// Kind of catalog object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Star,
    Galaxy,
    Planet,
    Moon,
    Sun,
}

impl Category {
    /// Categories in detection priority order
    pub const PRIORITY: [Category; 5] = [
        Category::Star,
        Category::Galaxy,
        Category::Planet,
        Category::Moon,
        Category::Sun,
    ];

    /// Render size used when a record does not give one
    ///
    /// Point sizes in pixels for stars and galaxies, sphere radii in scene
    /// units for the solar system bodies.
    pub fn default_size(&self) -> f64 {
        match self {
            Category::Star => 6.0,
            Category::Galaxy => 8.0,
            Category::Planet => 0.4,
            Category::Moon => 1.2,
            Category::Sun => 1.8,
        }
    }

    /// Render color used when a record does not give one
    pub fn default_color(&self) -> [f32; 3] {
        match self {
            Category::Star => [1.0, 1.0, 0.8],
            Category::Galaxy => [0.5, 1.0, 0.5],
            Category::Planet => [1.0, 0.6, 0.2],
            Category::Moon => [0.9, 0.9, 1.0],
            Category::Sun => [1.0, 0.95, 0.6],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Star => "star",
            Category::Galaxy => "galaxy",
            Category::Planet => "planet",
            Category::Moon => "moon",
            Category::Sun => "sun",
        };
        write!(f, "{}", name)
    }
}

/// A validated catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct CelestialObject {
    pub name: String,
    pub category: Category,
    pub position: Equatorial,
    pub size: f64,
    pub color: [f32; 3],
    /// When the position was last refreshed from an ephemeris
    pub last_update: Option<DateTime<Utc>>,
}

impl CelestialObject {
    /// Create an entry with the category's default size and color
    pub fn new(name: &str, category: Category, ra_hours: f64, dec_degrees: f64) -> Self {
        Self {
            name: name.to_string(),
            category,
            position: Equatorial::new(ra_hours, dec_degrees),
            size: category.default_size(),
            color: category.default_color(),
            last_update: None,
        }
    }

    pub fn ra_hours(&self) -> f64 {
        self.position.ra_hours
    }

    pub fn dec_degrees(&self) -> f64 {
        self.position.dec_degrees
    }
}

/// New position for a named object, as produced by an ephemeris refresh
#[derive(Debug, Clone, PartialEq)]
pub struct EphemerisUpdate {
    pub name: String,
    pub position: Equatorial,
}

impl EphemerisUpdate {
    pub fn new(name: &str, ra_hours: f64, dec_degrees: f64) -> Self {
        Self {
            name: name.to_string(),
            position: Equatorial::new(ra_hours, dec_degrees),
        }
    }
}

/// Immutable catalog snapshot with a case-insensitive name index
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    stars: Vec<CelestialObject>,
    galaxies: Vec<CelestialObject>,
    planets: Vec<CelestialObject>,
    moon: Option<CelestialObject>,
    sun: Option<CelestialObject>,
    last_full_update: Option<DateTime<Utc>>,
    index: HashMap<String, (Category, usize)>,
}

impl Catalog {
    /// Empty catalog, used when no catalog file can be read
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from validated objects
    ///
    /// Objects are grouped by category. A name that repeats an earlier name
    /// (case-insensitively) is dropped with a warning, so lookups are never
    /// ambiguous. Only the first Moon and Sun are kept.
    pub fn from_objects<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = CelestialObject>,
    {
        let mut catalog = Self::default();
        for object in objects {
            let key = object.name.to_lowercase();
            if catalog.index.contains_key(&key) {
                warn!("Duplicate catalog name '{}' ignored", object.name);
                continue;
            }
            let slot = match object.category {
                Category::Star => push_indexed(&mut catalog.stars, object),
                Category::Galaxy => push_indexed(&mut catalog.galaxies, object),
                Category::Planet => push_indexed(&mut catalog.planets, object),
                Category::Moon => set_single(&mut catalog.moon, object),
                Category::Sun => set_single(&mut catalog.sun, object),
            };
            if let Some((category, idx)) = slot {
                catalog.index.insert(key, (category, idx));
            }
        }
        if let Some(moon) = &catalog.moon {
            let moon_key = moon.name.to_lowercase();
            for alias in MOON_ALIASES {
                if alias != moon_key {
                    catalog.index.entry(alias.to_string()).or_insert((Category::Moon, 0));
                }
            }
        }
        catalog
    }

    /// Set the time of the last full ephemeris refresh
    pub fn with_last_full_update(mut self, when: Option<DateTime<Utc>>) -> Self {
        self.last_full_update = when;
        self
    }

    pub fn last_full_update(&self) -> Option<DateTime<Utc>> {
        self.last_full_update
    }

    /// Objects of one category, in catalog order
    pub fn objects(&self, category: Category) -> &[CelestialObject] {
        match category {
            Category::Star => &self.stars,
            Category::Galaxy => &self.galaxies,
            Category::Planet => &self.planets,
            Category::Moon => self.moon.as_ref().map(std::slice::from_ref).unwrap_or(&[]),
            Category::Sun => self.sun.as_ref().map(std::slice::from_ref).unwrap_or(&[]),
        }
    }

    pub fn stars(&self) -> &[CelestialObject] {
        &self.stars
    }

    pub fn galaxies(&self) -> &[CelestialObject] {
        &self.galaxies
    }

    pub fn planets(&self) -> &[CelestialObject] {
        &self.planets
    }

    pub fn moon(&self) -> Option<&CelestialObject> {
        self.moon.as_ref()
    }

    pub fn sun(&self) -> Option<&CelestialObject> {
        self.sun.as_ref()
    }

    /// All objects in detection priority order
    pub fn iter(&self) -> impl Iterator<Item = &CelestialObject> + '_ {
        Category::PRIORITY
            .iter()
            .flat_map(move |category| self.objects(*category).iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive lookup by name; the Moon also answers to "moon" and "luna"
    ///
    /// # Examples
    ///
    /// ```rust
    /// use skytracker::catalogs::{Catalog, Category, CelestialObject};
    ///
    /// let catalog = Catalog::from_objects(vec![
    ///     CelestialObject::new("Sirius", Category::Star, 6.7715556, -16.7474167),
    ///     CelestialObject::new("Luna", Category::Moon, 12.5, -5.0),
    /// ]);
    /// assert_eq!(catalog.lookup("SIRIUS").unwrap().name, "Sirius");
    /// assert_eq!(catalog.lookup("moon").unwrap().name, "Luna");
    /// assert!(catalog.lookup("Vega").is_none());
    /// ```
    pub fn lookup(&self, name: &str) -> Option<&CelestialObject> {
        let (category, idx) = self.index.get(&name.trim().to_lowercase())?;
        self.objects(*category).get(*idx)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Human readable list of trackable names: stars, the Moon, galaxies, planets
    pub fn object_list_text(&self) -> String {
        let names = self
            .stars
            .iter()
            .chain(self.moon.iter())
            .chain(self.galaxies.iter())
            .chain(self.planets.iter())
            .chain(self.sun.iter())
            .map(|object| object.name.as_str())
            .collect::<Vec<_>>();
        names.join(", ")
    }

    /// New snapshot with refreshed planet, Moon and Sun positions
    ///
    /// Updates naming stars or galaxies, or unknown names, are ignored.
    /// Returns the snapshot and the number of objects that changed.
    pub fn with_ephemeris(&self, updates: &[EphemerisUpdate], now: DateTime<Utc>) -> (Self, usize) {
        let mut applied = 0;
        let mut objects: Vec<CelestialObject> = self.iter().cloned().collect();
        for update in updates {
            let key = update.name.to_lowercase();
            let target = objects.iter_mut().find(|object| {
                matches!(
                    object.category,
                    Category::Planet | Category::Moon | Category::Sun
                ) && (object.name.to_lowercase() == key
                    || (object.category == Category::Moon && MOON_ALIASES.contains(&key.as_str())))
            });
            match target {
                Some(object) => {
                    object.position = update.position;
                    object.last_update = Some(now);
                    applied += 1;
                }
                None => warn!("Ephemeris update for unknown body '{}' ignored", update.name),
            }
        }
        let last_full_update = if applied > 0 {
            Some(now)
        } else {
            self.last_full_update
        };
        (
            Self::from_objects(objects).with_last_full_update(last_full_update),
            applied,
        )
    }
}

fn push_indexed(
    list: &mut Vec<CelestialObject>,
    object: CelestialObject,
) -> Option<(Category, usize)> {
    let category = object.category;
    list.push(object);
    Some((category, list.len() - 1))
}

fn set_single(
    slot: &mut Option<CelestialObject>,
    object: CelestialObject,
) -> Option<(Category, usize)> {
    if slot.is_some() {
        warn!("Extra {} record '{}' ignored", object.category, object.name);
        return None;
    }
    let category = object.category;
    *slot = Some(object);
    Some((category, 0))
}
