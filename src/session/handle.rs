//! Thread-safe access to a running session
//!
//! Other threads never touch the session's tracking or pointer state. They
//! send [`TrackingRequest`]s through a channel that the session drains at the
//! start of every tick, and read pointer angles from a [`TelemetrySnapshot`]
//! the session republishes at the end of every tick.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;

use crate::{Result, SkytrackerError};

/// Outcome of a start request: the canonical name, or the name that was not found
pub type StartReply = std::result::Result<String, String>;

/// Request to the owner of the tracking state
#[derive(Debug)]
pub enum TrackingRequest {
    Start {
        name: String,
        reply: Sender<StartReply>,
    },
    Stop,
}

/// Pointer state published once per tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub commanded_yaw: f64,
    pub commanded_pitch: f64,
    pub sensor_yaw: f64,
    pub sensor_pitch: f64,
    /// Name of the tracked object, if any
    pub target: Option<String>,
    pub lst_hours: f64,
}

impl TelemetrySnapshot {
    /// `DATA:` report line for the commanded pointer
    pub fn data_line(&self) -> String {
        format!("DATA:{:.1},{:.1}\n", self.commanded_yaw, self.commanded_pitch)
    }

    /// `SENSOR:` report line for the feedback pointer
    pub fn sensor_line(&self) -> String {
        format!("SENSOR:{:.1},{:.1}\n", self.sensor_yaw, self.sensor_pitch)
    }
}

/// Cloneable handle for talking to a session from other threads
#[derive(Debug, Clone)]
pub struct SessionHandle {
    requests: Sender<TrackingRequest>,
    telemetry: Arc<RwLock<TelemetrySnapshot>>,
}

impl SessionHandle {
    pub(crate) fn new(
        requests: Sender<TrackingRequest>,
        telemetry: Arc<RwLock<TelemetrySnapshot>>,
    ) -> Self {
        Self {
            requests,
            telemetry,
        }
    }

    /// Ask the session to track `name` and wait up to `timeout` for the answer
    ///
    /// Returns the canonical object name. An unknown name gives
    /// [`SkytrackerError::ObjectNotFound`]; a session that has stopped or does
    /// not answer in time gives [`SkytrackerError::DataError`].
    pub fn start_tracking(&self, name: &str, timeout: Duration) -> Result<String> {
        let (reply, answer) = bounded(1);
        self.requests
            .send(TrackingRequest::Start {
                name: name.to_string(),
                reply,
            })
            .map_err(|_| SkytrackerError::DataError("session has stopped".to_string()))?;
        match answer.recv_timeout(timeout) {
            Ok(Ok(canonical)) => Ok(canonical),
            Ok(Err(missing)) => Err(SkytrackerError::ObjectNotFound(missing)),
            Err(_) => Err(SkytrackerError::DataError(
                "session did not answer the tracking request".to_string(),
            )),
        }
    }

    /// Ask the session to stop tracking; does not wait
    pub fn stop_tracking(&self) {
        // A stopped session has nothing left to track
        let _ = self.requests.send(TrackingRequest::Stop);
    }

    /// Latest published pointer state
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;

    #[test]
    fn test_report_lines() {
        let snapshot = TelemetrySnapshot {
            commanded_yaw: 123.456,
            commanded_pitch: -10.04,
            sensor_yaw: 0.0,
            sensor_pitch: 89.0,
            target: None,
            lst_hours: 0.0,
        };
        assert_eq!(snapshot.data_line(), "DATA:123.5,-10.0\n");
        assert_eq!(snapshot.sensor_line(), "SENSOR:0.0,89.0\n");
    }

    #[test]
    fn test_start_round_trip() {
        let (tx, rx) = unbounded();
        let handle = SessionHandle::new(tx, Arc::new(RwLock::new(TelemetrySnapshot::default())));

        let owner = thread::spawn(move || {
            for _ in 0..2 {
                if let Ok(TrackingRequest::Start { name, reply }) = rx.recv() {
                    let answer = if name.eq_ignore_ascii_case("vega") {
                        Ok("Vega".to_string())
                    } else {
                        Err(name)
                    };
                    reply.send(answer).unwrap();
                }
            }
        });

        assert_eq!(handle.start_tracking("VEGA", Duration::from_secs(1)).unwrap(), "Vega");
        assert!(matches!(
            handle.start_tracking("nope", Duration::from_secs(1)),
            Err(SkytrackerError::ObjectNotFound(ref n)) if n == "nope"
        ));
        owner.join().unwrap();
    }

    #[test]
    fn test_start_without_session_fails() {
        let (tx, rx) = unbounded();
        drop(rx);
        let handle = SessionHandle::new(tx, Arc::new(RwLock::new(TelemetrySnapshot::default())));
        assert!(matches!(
            handle.start_tracking("Vega", Duration::from_millis(10)),
            Err(SkytrackerError::DataError(_))
        ));
        handle.stop_tracking();
    }

    #[test]
    fn test_unanswered_request_times_out() {
        let (tx, _rx) = unbounded();
        let handle = SessionHandle::new(tx, Arc::new(RwLock::new(TelemetrySnapshot::default())));
        assert!(handle.start_tracking("Vega", Duration::from_millis(20)).is_err());
    }
}
