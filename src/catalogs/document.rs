//! JSON catalog document
//!
//! ```json
//! {
//!   "stars":    [{ "name": "Sirius", "ra_hours": 6.7715556, "dec_degrees": -16.7474167 }],
//!   "galaxies": [{ "name": "LMC", "ra_hours": 5.4, "dec_degrees": -69.756, "size": 10.0 }],
//!   "planets":  [{ "name": "Marte", "ra_hours": 8.5, "dec_degrees": 22.0,
//!                  "last_update": "2025-05-01T00:00:00Z" }],
//!   "moon":     { "name": "Luna", "ra_hours": 12.5, "dec_degrees": -5.0 },
//!   "metadata": { "last_full_update": "2025-05-01T00:00:00Z" }
//! }
//! ```
//!
//! Parsing is lenient per entry: a record that does not deserialize or has an
//! impossible position is skipped with a warning, and the rest of the document
//! still loads. Only a document that is not a JSON object of this shape fails.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Catalog, Category, CelestialObject};
use crate::coordinates::Equatorial;
use crate::Result;

/// Name given to a Moon record that has none
const DEFAULT_MOON_NAME: &str = "Luna";
const DEFAULT_SUN_NAME: &str = "Sol";

/// One catalog entry as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(default)]
    pub name: String,
    pub ra_hours: f64,
    pub dec_degrees: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl ObjectRecord {
    /// Validate the record and turn it into a catalog object
    ///
    /// Right ascension is wrapped into [0, 24). A non-finite coordinate, a
    /// declination outside [-90, 90], a non-positive size or a missing name
    /// (except for the Moon and Sun, which get a default name) is rejected.
    pub fn into_object(self, category: Category) -> std::result::Result<CelestialObject, String> {
        let name = match (self.name.trim(), category) {
            ("", Category::Moon) => DEFAULT_MOON_NAME.to_string(),
            ("", Category::Sun) => DEFAULT_SUN_NAME.to_string(),
            ("", _) => return Err("missing name".to_string()),
            (name, _) => name.to_string(),
        };
        if !self.ra_hours.is_finite() {
            return Err(format!("{}: right ascension is not finite", name));
        }
        let position = Equatorial::new(self.ra_hours, self.dec_degrees);
        if !position.is_valid() {
            return Err(format!(
                "{}: declination {} outside [-90, 90]",
                name, self.dec_degrees
            ));
        }
        let size = self.size.unwrap_or_else(|| category.default_size());
        if !(size.is_finite() && size > 0.0) {
            return Err(format!("{}: invalid size {}", name, size));
        }
        Ok(CelestialObject {
            name,
            category,
            position,
            size,
            color: self.color.unwrap_or_else(|| category.default_color()),
            last_update: self.last_update,
        })
    }

    pub fn from_object(object: &CelestialObject) -> Self {
        Self {
            name: object.name.clone(),
            ra_hours: object.position.ra_hours,
            dec_degrees: object.position.dec_degrees,
            size: Some(object.size),
            color: Some(object.color),
            last_update: object.last_update,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_full_update: Option<DateTime<Utc>>,
}

/// The catalog file as written by [`super::CatalogStore::save`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogDocument {
    pub stars: Vec<ObjectRecord>,
    pub galaxies: Vec<ObjectRecord>,
    pub planets: Vec<ObjectRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moon: Option<ObjectRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sun: Option<ObjectRecord>,
    pub metadata: DocumentMetadata,
}

/// Shape accepted when reading; entries are validated one by one
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    stars: Vec<Value>,
    #[serde(default)]
    galaxies: Vec<Value>,
    #[serde(default)]
    planets: Vec<Value>,
    #[serde(default)]
    moon: Option<Value>,
    #[serde(default)]
    sun: Option<Value>,
    #[serde(default)]
    metadata: Value,
}

impl CatalogDocument {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let records = |category| {
            catalog
                .objects(category)
                .iter()
                .map(ObjectRecord::from_object)
                .collect::<Vec<_>>()
        };
        Self {
            stars: records(Category::Star),
            galaxies: records(Category::Galaxy),
            planets: records(Category::Planet),
            moon: catalog.moon().map(ObjectRecord::from_object),
            sun: catalog.sun().map(ObjectRecord::from_object),
            metadata: DocumentMetadata {
                last_full_update: catalog.last_full_update(),
            },
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a catalog file, skipping invalid entries
    pub fn parse_catalog(text: &str) -> Result<Catalog> {
        let raw: RawDocument = serde_json::from_str(text)?;

        let mut objects = Vec::new();
        let sections = [
            (Category::Star, raw.stars),
            (Category::Galaxy, raw.galaxies),
            (Category::Planet, raw.planets),
            (Category::Moon, raw.moon.into_iter().collect()),
            (Category::Sun, raw.sun.into_iter().collect()),
        ];
        for (category, values) in sections {
            for value in values {
                if value.is_null() {
                    continue;
                }
                match parse_entry(value, category) {
                    Ok(object) => objects.push(object),
                    Err(reason) => warn!("Skipping {} entry: {}", category, reason),
                }
            }
        }

        let last_full_update = raw
            .metadata
            .get("last_full_update")
            .and_then(Value::as_str)
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|when| when.with_timezone(&Utc));

        Ok(Catalog::from_objects(objects).with_last_full_update(last_full_update))
    }
}

fn parse_entry(value: Value, category: Category) -> std::result::Result<CelestialObject, String> {
    let record: ObjectRecord = serde_json::from_value(value).map_err(|e| e.to_string())?;
    record.into_object(category)
}
