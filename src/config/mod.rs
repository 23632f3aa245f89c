//! Session configuration
//!
//! Every section carries `#[serde(default)]`, so a configuration file only
//! needs the keys it wants to change:
//!
//! ```json
//! { "site": { "latitude_degrees": -34.6 }, "dome": { "enabled": false } }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DOME_GROUND_OFFSET, DOME_PUSH_FACTOR, DOME_RADIUS, FLOOR_Y, LST_UPDATE_THRESHOLD_HOURS,
    SERIAL_BAUD_RATE, SERIAL_MAX_HZ, SERIAL_MIN_HZ, SERVER_PORT, SERVER_UPDATE_INTERVAL_MS, WORLD_MAX, WORLD_MIN,
    WORLD_SCALE,
};
use crate::detection::DetectionThresholds;
use crate::pointing::{Boundary, PointerVector, RoomBounds};
use crate::projection::{DomeGeometry, ProjectionMode};
use crate::{Result, SkytrackerError};

/// Observer location, constant for a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservingSite {
    /// East-positive longitude in degrees
    pub longitude_degrees: f64,
    /// Geodetic latitude in degrees
    pub latitude_degrees: f64,
}

impl Default for ObservingSite {
    fn default() -> Self {
        // Concepción del Uruguay, Entre Ríos
        Self {
            longitude_degrees: -58.229712,
            latitude_degrees: -32.495417,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub min: f64,
    pub max: f64,
    pub scale: f64,
    pub floor: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            min: WORLD_MIN,
            max: WORLD_MAX,
            scale: WORLD_SCALE,
            floor: FLOOR_Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomeConfig {
    /// Project onto the dome instead of the room cube
    pub enabled: bool,
    pub radius: f64,
    pub ground_offset: f64,
    /// Scale applied to pointer hits so they sit inside the dome surface
    pub push_factor: f64,
}

impl Default for DomeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: DOME_RADIUS,
            ground_offset: DOME_GROUND_OFFSET,
            push_factor: DOME_PUSH_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    pub base: [f64; 3],
    pub yaw: f64,
    pub pitch: f64,
    pub length: f64,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            base: [0.0, 0.0, 0.0],
            yaw: 45.0,
            pitch: 45.0,
            length: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f64; 3],
    pub yaw: f64,
    pub pitch: f64,
    /// Movement per key-held frame
    pub speed: f64,
    /// Degrees of rotation per unit of mouse delta
    pub sensitivity: f64,
    /// Mouse deltas smaller than this are ignored
    pub deadzone: f64,
    /// Vertical field of view in degrees
    pub fov: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [3.0, 3.0, 3.0],
            yaw: 45.0,
            pitch: -35.26,
            speed: 0.1,
            sensitivity: 0.2,
            deadzone: 0.5,
            fov: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Sidereal hours the sky must rotate before positions are recomputed
    pub lst_threshold_hours: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lst_threshold_hours: LST_UPDATE_THRESHOLD_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Interval between `DATA`/`SENSOR` reports while tracking
    pub update_interval_ms: u64,
    /// Socket read timeout, bounds how long a handler takes to notice shutdown
    pub read_timeout_ms: u64,
    /// Upper bound on waiting for connection threads at shutdown
    pub join_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: SERVER_PORT,
            update_interval_ms: SERVER_UPDATE_INTERVAL_MS,
            read_timeout_ms: 500,
            join_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Simulate the actuator instead of opening a port
    pub simulate: bool,
    /// Maximum outbound command rate
    pub max_hz: f64,
    /// Fraction of the remaining angle the simulated sensor covers per tick
    pub follow_speed: f64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: SERIAL_BAUD_RATE,
            simulate: true,
            max_hz: SERIAL_MAX_HZ,
            follow_speed: 0.005,
        }
    }
}

/// Complete session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: ObservingSite,
    pub world: WorldConfig,
    pub dome: DomeConfig,
    pub pointer: PointerConfig,
    pub camera: CameraConfig,
    pub detection: DetectionThresholds,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub serial: SerialConfig,
    pub catalog_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: ObservingSite::default(),
            world: WorldConfig::default(),
            dome: DomeConfig::default(),
            pointer: PointerConfig::default(),
            camera: CameraConfig::default(),
            detection: DetectionThresholds::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            serial: SerialConfig::default(),
            catalog_path: PathBuf::from("data/celestial_data.json"),
        }
    }
}

impl Config {
    /// Load a configuration file
    ///
    /// A missing file yields the defaults. A file that exists but does not
    /// parse or fails validation is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load a configuration file, falling back to the defaults on any error
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid config {}: {}; using defaults", path.as_ref().display(), e);
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| SkytrackerError::Config(format!("parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject values that make the geometry or timing meaningless
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.site.latitude_degrees) {
            return Err(SkytrackerError::Config(format!(
                "latitude {} outside [-90, 90]",
                self.site.latitude_degrees
            )));
        }
        if self.world.max <= self.world.min || self.world.floor >= self.world.max {
            return Err(SkytrackerError::Config(
                "world bounds must satisfy min < max and floor < max".to_string(),
            ));
        }
        if self.world.scale <= 0.0 || self.dome.radius <= 0.0 {
            return Err(SkytrackerError::Config(
                "world scale and dome radius must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dome.push_factor) {
            return Err(SkytrackerError::Config(format!(
                "dome push factor {} outside [0, 1]",
                self.dome.push_factor
            )));
        }
        if !(self.serial.max_hz >= SERIAL_MIN_HZ) {
            return Err(SkytrackerError::Config(format!(
                "serial max_hz {} below {} Hz",
                self.serial.max_hz, SERIAL_MIN_HZ
            )));
        }
        if self.server.update_interval_ms == 0 {
            return Err(SkytrackerError::Config(
                "server update interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dome_geometry(&self) -> DomeGeometry {
        DomeGeometry::new(self.dome.radius, self.dome.ground_offset)
    }

    /// Projection selected by `dome.enabled`
    pub fn projection_mode(&self) -> ProjectionMode {
        if self.dome.enabled {
            ProjectionMode::Dome(self.dome_geometry())
        } else {
            ProjectionMode::Flat {
                world_scale: self.world.scale,
            }
        }
    }

    /// Surface the pointer ray is cast against, matching the projection
    pub fn boundary(&self) -> Boundary {
        if self.dome.enabled {
            Boundary::Dome {
                geometry: self.dome_geometry(),
                push_factor: self.dome.push_factor,
            }
        } else {
            Boundary::Room(RoomBounds {
                min: self.world.min,
                max: self.world.max,
                floor: self.world.floor,
            })
        }
    }

    /// Initial pointer
    pub fn pointer(&self) -> PointerVector {
        let [x, y, z] = self.pointer.base;
        PointerVector::new(
            Point3::new(x, y, z),
            self.pointer.yaw,
            self.pointer.pitch,
            self.pointer.length,
        )
    }
}
