//! SkyTracker: real-time sky projection and pointing for a room or dome display
//!
//! This crate converts catalog objects given in equatorial coordinates into
//! viewer-centred 3D scene positions, aims a pointing vector at them, and
//! mirrors that pointing to a physical actuator over a serial link while
//! reporting live state over a small TCP protocol.

use thiserror::Error;

pub mod cache;
pub mod camera;
pub mod catalogs;
pub mod config;
pub mod constants;
pub mod coordinates;
pub mod detection;
pub mod ephemeris;
pub mod pointing;
pub mod projection;
pub mod serial;
pub mod server;
pub mod session;
pub mod time;
pub mod tracker;

// Re-export commonly used types
pub use cache::{CoordinateCache, ProjectedPoint, ProjectedSky};
pub use catalogs::{Catalog, CatalogStore, Category, CelestialObject};
pub use config::{Config, ObservingSite};
pub use coordinates::{Equatorial, Horizontal};
pub use pointing::{angles_to_target, Boundary, PointerVector};
pub use projection::ProjectionMode;
pub use time::SiderealTime;
pub use tracker::ObjectTracker;

/// Main error type for the skytracker library
#[derive(Debug, Error)]
pub enum SkytrackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Serial error: {0}")]
    Serial(#[from] serial::SerialError),

    #[error("Ephemeris error: {0}")]
    Ephemeris(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for skytracker operations
pub type Result<T> = std::result::Result<T, SkytrackerError>;
