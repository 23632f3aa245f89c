//! Serial link to the pointing actuator
//!
//! Line protocol, one ASCII message per `\n`-terminated line:
//!
//! - outbound `CMD:<yaw>,<pitch>` with two decimals, e.g. `CMD:123.45,-10.00`
//! - inbound `SENS:<yaw>,<pitch>` with the measured angles
//! - inbound `STAT:...`, `ERR:...` and anything else are passed through
//!   unparsed
//!
//! Commands are throttled to a maximum rate and only sent when the formatted
//! command differs from the last one sent. Sending is best effort: a failed
//! write is logged and that single update is dropped.

pub mod transport;

pub use transport::{LineBuffer, PortTransport, SerialTransport, SimulatedTransport};

use std::time::{Duration, Instant};

use log::{info, warn};
use thiserror::Error;

use crate::config::SerialConfig;
use crate::constants::SERIAL_MAX_HZ;

/// Errors raised by the serial link
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("malformed line '{line}': {reason}")]
    Malformed { line: String, reason: String },

    #[error("no serial port configured")]
    NotConfigured,

    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed inbound line
#[derive(Debug, Clone, PartialEq)]
pub enum SerialMessage {
    /// Measured pointer angles in degrees
    Sensor { yaw: f64, pitch: f64 },
    /// Any other message, e.g. `STAT:` or `ERR:` lines
    Other(String),
}

const COMMAND_PREFIX: &str = "CMD:";
const SENSOR_PREFIX: &str = "SENS:";

/// Format an outbound command line, newline included
pub fn format_command(yaw: f64, pitch: f64) -> String {
    format!("{}{:.2},{:.2}\n", COMMAND_PREFIX, yaw, pitch)
}

/// Parse an inbound line
///
/// # Examples
///
/// ```rust
/// use skytracker::serial::{parse_line, SerialMessage};
///
/// assert_eq!(
///     parse_line("SENS:12.50,-3.25\n").unwrap(),
///     SerialMessage::Sensor { yaw: 12.5, pitch: -3.25 }
/// );
/// assert!(parse_line("SENS:12.5").is_err());
/// ```
pub fn parse_line(line: &str) -> Result<SerialMessage, SerialError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix(SENSOR_PREFIX) else {
        return Ok(SerialMessage::Other(line.to_string()));
    };

    let malformed = |reason: &str| SerialError::Malformed {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let mut fields = payload.split(',');
    let (Some(yaw), Some(pitch), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(malformed("expected two comma-separated values"));
    };
    let yaw: f64 = yaw
        .trim()
        .parse()
        .map_err(|_| malformed("yaw is not a number"))?;
    let pitch: f64 = pitch
        .trim()
        .parse()
        .map_err(|_| malformed("pitch is not a number"))?;
    if !yaw.is_finite() || !pitch.is_finite() {
        return Err(malformed("non-finite angle"));
    }
    Ok(SerialMessage::Sensor { yaw, pitch })
}

/// Rate limit plus change detection for outbound commands
#[derive(Debug, Clone)]
pub struct CommandThrottle {
    min_interval: Duration,
    last_sent_at: Option<Instant>,
    last_command: Option<String>,
}

impl CommandThrottle {
    /// Throttle allowing at most `max_hz` commands per second
    ///
    /// A rate with no representable interval falls back to the default rate.
    pub fn new(max_hz: f64) -> Self {
        let min_interval = Duration::try_from_secs_f64(1.0 / max_hz).unwrap_or_else(|_| {
            warn!("Unusable serial rate {} Hz, using {} Hz", max_hz, SERIAL_MAX_HZ);
            Duration::from_secs_f64(1.0 / SERIAL_MAX_HZ)
        });
        Self {
            min_interval,
            last_sent_at: None,
            last_command: None,
        }
    }

    /// The command line to send at `now`, if any
    ///
    /// A returned command is recorded as sent.
    pub fn admit(&mut self, yaw: f64, pitch: f64, now: Instant) -> Option<String> {
        if let Some(last) = self.last_sent_at {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }
        let command = format_command(yaw, pitch);
        if self.last_command.as_deref() == Some(command.as_str()) {
            return None;
        }
        self.last_sent_at = Some(now);
        self.last_command = Some(command.clone());
        Some(command)
    }
}

/// Actuator link over a serial port or a simulation
pub struct SerialLink {
    transport: Box<dyn SerialTransport>,
    throttle: CommandThrottle,
    simulated: bool,
}

impl SerialLink {
    /// Open the link described by `config`
    ///
    /// In simulation mode this never fails. Otherwise a missing port path or a
    /// port that cannot be opened is an error.
    pub fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        if config.simulate {
            info!("Serial link in simulation mode");
            return Ok(Self::simulated(config.max_hz));
        }
        let path = config.port.as_deref().ok_or(SerialError::NotConfigured)?;
        let transport = PortTransport::open(path, config.baud_rate)?;
        Ok(Self::with_transport(Box::new(transport), config.max_hz, false))
    }

    pub fn simulated(max_hz: f64) -> Self {
        Self::with_transport(Box::new(SimulatedTransport::new()), max_hz, true)
    }

    pub fn with_transport(transport: Box<dyn SerialTransport>, max_hz: f64, simulated: bool) -> Self {
        Self {
            transport,
            throttle: CommandThrottle::new(max_hz),
            simulated,
        }
    }

    /// Whether feedback must be simulated rather than read from the actuator
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    /// Send the commanded angles if the throttle allows it
    ///
    /// Returns whether a command was written.
    pub fn send_angles(&mut self, yaw: f64, pitch: f64) -> bool {
        self.send_angles_at(yaw, pitch, Instant::now())
    }

    pub fn send_angles_at(&mut self, yaw: f64, pitch: f64, now: Instant) -> bool {
        let Some(command) = self.throttle.admit(yaw, pitch, now) else {
            return false;
        };
        match self.transport.write_line(&command) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping command {}: {}", command.trim_end(), e);
                false
            }
        }
    }

    /// Read one inbound message without blocking
    pub fn poll(&mut self) -> Result<Option<SerialMessage>, SerialError> {
        match self.transport.read_line()? {
            Some(line) => parse_line(&line).map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("transport", &self.transport.describe())
            .field("simulated", &self.simulated)
            .finish()
    }
}
