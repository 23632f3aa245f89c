//! Shared, reloadable catalog owner

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::RwLock;

use super::document::CatalogDocument;
use super::{Catalog, EphemerisUpdate};
use crate::Result;

/// Owns the current catalog snapshot and its backing file
///
/// Readers take an `Arc<Catalog>` snapshot and keep using it for as long as
/// they like; reloads and ephemeris refreshes build a complete new catalog and
/// swap it in, so no reader ever sees a partially updated catalog.
#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    current: RwLock<Arc<Catalog>>,
}

impl CatalogStore {
    /// Load the catalog at `path`, or start empty if it is missing or unreadable
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let catalog = match read_catalog(&path) {
            Ok(catalog) => {
                info!(
                    "Loaded {} objects from {}",
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            Err(e) => {
                warn!(
                    "Could not load catalog {}: {}; using an empty catalog",
                    path.display(),
                    e
                );
                Catalog::empty()
            }
        };
        Self::with_catalog(catalog, path)
    }

    /// Load the catalog at `path`, failing if it is missing or unreadable
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let catalog = read_catalog(path.as_ref())?;
        Ok(Self::with_catalog(catalog, path))
    }

    /// Wrap an already built catalog; `path` is where [`save`](Self::save) writes
    pub fn with_catalog<P: AsRef<Path>>(catalog: Catalog, path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.current.read())
    }

    /// Re-read the backing file and swap it in
    ///
    /// On failure the current snapshot stays in place and the error is
    /// returned.
    pub fn reload(&self) -> Result<()> {
        let catalog = read_catalog(&self.path)?;
        info!(
            "Reloaded {} objects from {}",
            catalog.len(),
            self.path.display()
        );
        self.replace(catalog);
        Ok(())
    }

    /// Swap in a new snapshot
    pub fn replace(&self, catalog: Catalog) {
        *self.current.write() = Arc::new(catalog);
    }

    /// Write the current snapshot to the backing file
    pub fn save(&self) -> Result<()> {
        let snapshot = self.snapshot();
        let text = CatalogDocument::from_catalog(&snapshot).to_json_string()?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, text)?;
        Ok(())
    }

    /// Apply refreshed positions, swap the snapshot and persist it
    ///
    /// Returns the number of objects updated. Nothing is written when no
    /// update matched.
    pub fn apply_ephemeris(&self, updates: &[EphemerisUpdate], now: DateTime<Utc>) -> Result<usize> {
        let (catalog, applied) = {
            let mut guard = self.current.write();
            let (catalog, applied) = guard.with_ephemeris(updates, now);
            if applied > 0 {
                *guard = Arc::new(catalog.clone());
            }
            (catalog, applied)
        };
        if applied == 0 {
            return Ok(0);
        }
        info!("Ephemeris refresh updated {} objects", applied);
        let text = CatalogDocument::from_catalog(&catalog).to_json_string()?;
        fs::write(&self.path, text)?;
        Ok(applied)
    }
}

fn read_catalog(path: &Path) -> Result<Catalog> {
    let text = fs::read_to_string(path)?;
    CatalogDocument::parse_catalog(&text)
}
