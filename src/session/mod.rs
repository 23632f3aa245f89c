//! Per-frame orchestration of the sky, the pointer and the actuator
//!
//! A [`SkySession`] owns all mutable tracking state and is advanced by calling
//! [`SkySession::tick`] once per frame from a single thread. Each tick:
//!
//! 1. picks up a reloaded catalog, if any, and invalidates the cache
//! 2. answers queued [`TrackingRequest`]s
//! 3. computes the local sidereal time and refreshes the projected sky
//! 4. applies camera and manual pointer input
//! 5. re-aims the pointer at the tracked object
//! 6. sends the commanded angles to the actuator and reads its feedback
//! 7. resolves what the pointer and the camera are aimed at
//! 8. publishes a [`TelemetrySnapshot`] for other threads

mod handle;

pub use handle::{SessionHandle, StartReply, TelemetrySnapshot, TrackingRequest};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use log::{debug, info, warn};
use nalgebra::Point3;
use parking_lot::RwLock;

use crate::cache::{CoordinateCache, ProjectedSky};
use crate::camera::Camera;
use crate::catalogs::{generate_background_stars, Catalog, CatalogStore};
use crate::config::{Config, ObservingSite};
use crate::constants::{
    BACKGROUND_STAR_COUNT, BACKGROUND_STAR_SEED, POINTER_FINE_STEP_DEG, POINTER_STEP_DEG,
    SENSOR_LINES_PER_FRAME, ZOOM_RATE_DEG_PER_S,
};
use crate::detection::{detect_by_direction, detect_by_point};
use crate::pointing::{Boundary, PointerVector};
use crate::projection::ProjectionMode;
use crate::serial::{SerialLink, SerialMessage};
use crate::time::{local_sidereal_time, SiderealTime};
use crate::tracker::ObjectTracker;

/// Initial feedback angles, before the actuator reports anything
const SENSOR_START_YAW: f64 = 90.0;
const SENSOR_START_PITCH: f64 = 90.0;

/// Receives every freshly projected sky
///
/// A renderer registers one of these to rebuild its scene geometry only when
/// the positions actually changed.
pub trait ProjectionSink: Send {
    fn on_projection(&mut self, sky: &Arc<ProjectedSky>);
}

impl<F> ProjectionSink for F
where
    F: FnMut(&Arc<ProjectedSky>) + Send,
{
    fn on_projection(&mut self, sky: &Arc<ProjectedSky>) {
        self(sky)
    }
}

/// Input sampled for one frame
///
/// Axis values are -1, 0 or 1 for key-driven controls.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Pointer yaw axis, positive turns right
    pub pointer_yaw: f64,
    /// Pointer pitch axis, positive raises
    pub pointer_pitch: f64,
    /// Mouse movement in screen units
    pub mouse_dx: f64,
    pub mouse_dy: f64,
    /// Zoom axis, positive widens the field of view
    pub zoom: f64,
    /// Fine-control modifier, slows the camera and the pointer
    pub slow: bool,
    /// Camera movement axes
    pub forward: f64,
    pub right: f64,
    pub up: f64,
}

/// What one frame produced
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub lst: SiderealTime,
    /// Tip of the drawn pointer
    pub end_point: Point3<f64>,
    /// Where the pointer ray meets the room or dome
    pub hit: Option<Point3<f64>>,
    /// Object under the pointer hit
    pub pointed: Option<String>,
    /// Object in the centre of the camera view
    pub looked: Option<String>,
    pub tracking: Option<String>,
    /// Whether the projected sky was recomputed this frame
    pub sky_refreshed: bool,
}

pub struct SkySession {
    site: ObservingSite,
    mode: ProjectionMode,
    boundary: Boundary,
    config: Config,
    catalogs: Arc<CatalogStore>,
    catalog: Arc<Catalog>,
    cache: CoordinateCache,
    tracker: ObjectTracker,
    pointer: PointerVector,
    sensor: PointerVector,
    camera: Camera,
    background: Vec<Point3<f64>>,
    serial: Option<SerialLink>,
    requests: Receiver<TrackingRequest>,
    handle: SessionHandle,
    telemetry: Arc<RwLock<TelemetrySnapshot>>,
    sinks: Vec<Box<dyn ProjectionSink>>,
}

impl SkySession {
    /// Build a session; `serial` is `None` when no actuator is attached
    pub fn new(config: Config, catalogs: Arc<CatalogStore>, serial: Option<SerialLink>) -> Self {
        let mode = config.projection_mode();
        let pointer = config.pointer();
        let sensor = PointerVector::new(
            pointer.base(),
            SENSOR_START_YAW,
            SENSOR_START_PITCH,
            pointer.length(),
        );
        let (tx, rx) = unbounded();
        let telemetry = Arc::new(RwLock::new(TelemetrySnapshot::default()));
        let catalog = catalogs.snapshot();
        info!(
            "Session ready: {} objects, {} projection, actuator {}",
            catalog.len(),
            if mode.is_dome() { "dome" } else { "room" },
            serial
                .as_ref()
                .map(|link| link.describe())
                .unwrap_or_else(|| "none".to_string())
        );

        Self {
            site: config.site,
            boundary: config.boundary(),
            cache: CoordinateCache::new(config.cache.lst_threshold_hours),
            camera: Camera::new(&config.camera),
            background: generate_background_stars(BACKGROUND_STAR_COUNT, &mode, BACKGROUND_STAR_SEED),
            mode,
            config,
            catalogs,
            catalog,
            tracker: ObjectTracker::new(),
            pointer,
            sensor,
            serial,
            handle: SessionHandle::new(tx, Arc::clone(&telemetry)),
            requests: rx,
            telemetry,
            sinks: Vec::new(),
        }
    }

    /// Handle for other threads; clone freely
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn add_sink(&mut self, sink: Box<dyn ProjectionSink>) {
        self.sinks.push(sink);
    }

    pub fn pointer(&self) -> &PointerVector {
        &self.pointer
    }

    /// Pointer as reported by the actuator, or simulated
    pub fn sensor(&self) -> &PointerVector {
        &self.sensor
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn tracker(&self) -> &ObjectTracker {
        &self.tracker
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn sky(&self) -> Arc<ProjectedSky> {
        self.cache.sky()
    }

    pub fn background_stars(&self) -> &[Point3<f64>] {
        &self.background
    }

    pub fn projection_mode(&self) -> &ProjectionMode {
        &self.mode
    }

    pub fn serial(&self) -> Option<&SerialLink> {
        self.serial.as_ref()
    }

    /// Advance one frame; `dt_seconds` is the wall time since the last frame
    pub fn tick(&mut self, now: DateTime<Utc>, dt_seconds: f64, input: &FrameInput) -> FrameOutput {
        self.sync_catalog();
        self.drain_requests();

        let lst = local_sidereal_time(&now, self.site.longitude_degrees);
        let refreshed = self
            .cache
            .refresh(lst.hours, &self.catalog, &self.site, &self.mode);
        let sky_refreshed = refreshed.is_some();
        if let Some(sky) = refreshed {
            for sink in &mut self.sinks {
                sink.on_projection(&sky);
            }
        }

        self.apply_camera_input(input, dt_seconds);

        if self.tracker.is_tracking() {
            self.tracker.update(
                &self.catalog,
                &self.site,
                &self.mode,
                &now,
                &mut self.pointer,
            );
        } else {
            let step = if input.slow {
                POINTER_FINE_STEP_DEG
            } else {
                POINTER_STEP_DEG
            };
            if input.pointer_yaw != 0.0 || input.pointer_pitch != 0.0 {
                self.pointer
                    .rotate(input.pointer_yaw * step, input.pointer_pitch * step);
            }
        }

        if let Some(link) = self.serial.as_mut() {
            link.send_angles(self.pointer.yaw(), self.pointer.pitch());
        }
        self.update_sensor();

        let sky = self.cache.sky();
        let hit = self.pointer.intersect(&self.boundary);
        let pointed = hit
            .as_ref()
            .and_then(|hit| detect_by_point(hit, &sky, &self.config.detection))
            .map(str::to_string);
        let looked = detect_by_direction(
            &self.camera.position,
            &self.camera.direction(),
            &sky,
            &self.config.detection,
        )
        .map(str::to_string);

        self.publish(lst.hours);

        FrameOutput {
            lst,
            end_point: self.pointer.end_point(),
            hit,
            pointed,
            looked,
            tracking: self.tracker.target().map(str::to_string),
            sky_refreshed,
        }
    }

    fn sync_catalog(&mut self) {
        let latest = self.catalogs.snapshot();
        if !Arc::ptr_eq(&latest, &self.catalog) {
            debug!("Catalog changed, {} objects", latest.len());
            self.catalog = latest;
            self.cache.invalidate();
        }
    }

    fn drain_requests(&mut self) {
        loop {
            match self.requests.try_recv() {
                Ok(TrackingRequest::Start { name, reply }) => {
                    let answer = match self.tracker.start(&self.catalog, &name) {
                        Ok(canonical) => Ok(canonical.to_string()),
                        Err(e) => {
                            info!("Tracking request rejected: {}", e);
                            Err(name.trim().to_string())
                        }
                    };
                    // The requester may have given up waiting
                    let _ = reply.send(answer);
                }
                Ok(TrackingRequest::Stop) => self.tracker.stop(),
                // The session keeps its own handle, so the channel never disconnects
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply_camera_input(&mut self, input: &FrameInput, dt_seconds: f64) {
        self.camera.set_slow(input.slow);
        self.camera.rotate(input.mouse_dx, input.mouse_dy);
        let speed = self.camera.speed();
        if input.forward != 0.0 {
            self.camera.move_forward(input.forward * speed);
        }
        if input.right != 0.0 {
            self.camera.move_right(input.right * speed);
        }
        if input.up != 0.0 {
            self.camera.move_up(input.up * speed);
        }
        if input.zoom != 0.0 {
            self.camera
                .adjust_zoom(input.zoom * ZOOM_RATE_DEG_PER_S * dt_seconds);
        }
    }

    fn update_sensor(&mut self) {
        let simulated = self.serial.as_ref().map_or(true, SerialLink::is_simulated);
        if simulated {
            self.sensor = follow(
                &self.sensor,
                &self.pointer,
                self.config.serial.follow_speed,
            );
            return;
        }
        let Some(link) = self.serial.as_mut() else {
            return;
        };
        for _ in 0..SENSOR_LINES_PER_FRAME {
            match link.poll() {
                Ok(Some(SerialMessage::Sensor { yaw, pitch })) => {
                    self.sensor.set_angles(yaw, pitch);
                }
                Ok(Some(SerialMessage::Other(line))) => debug!("Actuator: {}", line),
                Ok(None) => break,
                Err(e) => warn!("Ignoring actuator line: {}", e),
            }
        }
    }

    fn publish(&self, lst_hours: f64) {
        let mut telemetry = self.telemetry.write();
        telemetry.commanded_yaw = self.pointer.yaw();
        telemetry.commanded_pitch = self.pointer.pitch();
        telemetry.sensor_yaw = self.sensor.yaw();
        telemetry.sensor_pitch = self.sensor.pitch();
        telemetry.target = self.tracker.target().map(str::to_string);
        telemetry.lst_hours = lst_hours;
    }
}

impl std::fmt::Debug for SkySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkySession")
            .field("mode", &self.mode)
            .field("objects", &self.catalog.len())
            .field("tracking", &self.tracker.target())
            .field("pointer", &self.pointer)
            .field("serial", &self.serial)
            .finish()
    }
}

/// Move `current` a fraction of the way toward `target`, yaw along the short arc
fn follow(current: &PointerVector, target: &PointerVector, fraction: f64) -> PointerVector {
    let dyaw = (target.yaw() - current.yaw() + 540.0).rem_euclid(360.0) - 180.0;
    let dpitch = target.pitch() - current.pitch();
    let mut next = *current;
    next.set_angles(
        current.yaw() + dyaw * fraction,
        current.pitch() + dpitch * fraction,
    );
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogs::{Category, CelestialObject};
    use crate::pointing::angles_to_target;
    use crate::serial::SimulatedTransport;
    use crate::time::wrap_degrees;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn catalog() -> Catalog {
        Catalog::from_objects(vec![
            CelestialObject::new("Sirius", Category::Star, 6.7715556, -16.7474167),
            CelestialObject::new("Canopus", Category::Star, 6.399194, -52.695667),
            CelestialObject::new("Luna", Category::Moon, 12.5, -5.0),
        ])
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap()
    }

    fn session(config: Config) -> (SkySession, Arc<CatalogStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(CatalogStore::with_catalog(
            catalog(),
            dir.path().join("catalog.json"),
        ));
        let link = SerialLink::simulated(config.serial.max_hz);
        (SkySession::new(config, Arc::clone(&store), Some(link)), store, dir)
    }

    #[test]
    fn test_idle_frame_publishes_pointer() {
        let (mut session, _store, _dir) = session(Config::default());
        let out = session.tick(epoch(), 0.016, &FrameInput::default());

        assert!(out.sky_refreshed);
        assert_eq!(out.tracking, None);
        assert_eq!(session.sky().len(), 3);
        assert_abs_diff_eq!(out.end_point, session.pointer().end_point(), epsilon = 1e-12);

        let telemetry = session.handle().telemetry();
        assert_eq!(telemetry.commanded_yaw, 45.0);
        assert_eq!(telemetry.commanded_pitch, 45.0);
        assert_abs_diff_eq!(telemetry.lst_hours, out.lst.hours, epsilon = 1e-12);
    }

    #[test]
    fn test_tracking_request_from_other_thread() {
        let (mut session, _store, _dir) = session(Config::default());
        let handle = session.handle();
        let requester = thread::spawn(move || handle.start_tracking("SIRIUS", Duration::from_secs(5)));

        let mut now = epoch();
        while !requester.is_finished() {
            session.tick(now, 0.01, &FrameInput::default());
            now += ChronoDuration::milliseconds(10);
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(requester.join().unwrap().unwrap(), "Sirius");

        let out = session.tick(now, 0.01, &FrameInput::default());
        assert_eq!(out.tracking.as_deref(), Some("Sirius"));

        let lst = local_sidereal_time(&now, session.site.longitude_degrees);
        let sirius = session.catalog().lookup("Sirius").unwrap().position;
        let target = session
            .projection_mode()
            .project(&sirius, lst.hours, session.site.latitude_degrees);
        let (yaw, pitch) = angles_to_target(&target, &session.pointer().base());
        // Pointer yaw is kept in [0, 360), atan2 gives (-180, 180]
        assert_abs_diff_eq!(session.pointer().yaw(), wrap_degrees(yaw), epsilon = 1e-9);
        assert_abs_diff_eq!(session.pointer().pitch(), pitch.clamp(-89.0, 89.0), epsilon = 1e-9);

        session.handle().stop_tracking();
        let out = session.tick(now, 0.01, &FrameInput::default());
        assert_eq!(out.tracking, None);
        assert_eq!(session.handle().telemetry().target, None);
    }

    #[test]
    fn test_unknown_tracking_request_is_answered() {
        let (mut session, _store, _dir) = session(Config::default());
        let handle = session.handle();
        let requester = thread::spawn(move || handle.start_tracking(" Vega ", Duration::from_secs(5)));
        while !requester.is_finished() {
            session.tick(epoch(), 0.01, &FrameInput::default());
            thread::sleep(Duration::from_millis(1));
        }
        let result = requester.join().unwrap();
        assert!(matches!(result, Err(crate::SkytrackerError::ObjectNotFound(ref n)) if n == "Vega"));
        assert!(!session.tracker().is_tracking());
    }

    #[test]
    fn test_manual_rotation_only_when_idle() {
        let (mut session, _store, _dir) = session(Config::default());
        let turn = FrameInput {
            pointer_yaw: 1.0,
            pointer_pitch: -1.0,
            ..FrameInput::default()
        };
        session.tick(epoch(), 0.01, &turn);
        assert_abs_diff_eq!(session.pointer().yaw(), 46.0, epsilon = 1e-12);
        assert_abs_diff_eq!(session.pointer().pitch(), 44.0, epsilon = 1e-12);

        let fine = FrameInput {
            slow: true,
            ..turn
        };
        session.tick(epoch(), 0.01, &fine);
        assert_abs_diff_eq!(session.pointer().yaw(), 46.1, epsilon = 1e-12);

        session.tracker.start(&catalog(), "Canopus").unwrap();
        session.tick(epoch(), 0.01, &turn);
        let tracked_yaw = session.pointer().yaw();
        session.tick(epoch(), 0.01, &turn);
        assert_abs_diff_eq!(session.pointer().yaw(), tracked_yaw, epsilon = 1e-12);
    }

    #[test]
    fn test_simulated_sensor_follows_pointer() {
        let (mut session, _store, _dir) = session(Config::default());
        assert_eq!(session.sensor().yaw(), 90.0);
        assert_eq!(session.sensor().pitch(), 89.0);

        session.tick(epoch(), 0.01, &FrameInput::default());
        assert_abs_diff_eq!(session.sensor().yaw(), 90.0 - 45.0 * 0.005, epsilon = 1e-12);
        assert_abs_diff_eq!(session.sensor().pitch(), 89.0 - 44.0 * 0.005, epsilon = 1e-12);

        for _ in 0..5000 {
            session.tick(epoch(), 0.01, &FrameInput::default());
        }
        assert_abs_diff_eq!(session.sensor().yaw(), 45.0, epsilon = 1e-3);
        assert_abs_diff_eq!(session.sensor().pitch(), 45.0, epsilon = 1e-3);
    }

    #[test]
    fn test_follow_takes_short_arc() {
        let current = PointerVector::new(Point3::origin(), 350.0, 0.0, 1.0);
        let target = PointerVector::new(Point3::origin(), 10.0, 0.0, 1.0);
        let next = follow(&current, &target, 0.5);
        assert_abs_diff_eq!(next.yaw(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hardware_feedback_sets_sensor() {
        let transport = SimulatedTransport::new();
        transport.push_inbound("STAT:ready");
        transport.push_inbound("SENS:12.50,30.00");
        transport.push_inbound("SENS:garbage");
        let link = SerialLink::with_transport(Box::new(transport.clone()), 50.0, false);
        let dir = tempdir().unwrap();
        let store = Arc::new(CatalogStore::with_catalog(catalog(), dir.path().join("c.json")));
        let mut session = SkySession::new(Config::default(), store, Some(link));

        session.tick(epoch(), 0.01, &FrameInput::default());
        assert_eq!(session.sensor().yaw(), 12.5);
        assert_eq!(session.sensor().pitch(), 30.0);
        assert_eq!(transport.sent(), vec!["CMD:45.00,45.00\n"]);
        assert_eq!(session.handle().telemetry().sensor_line(), "SENSOR:12.5,30.0\n");
    }

    #[test]
    fn test_sink_called_once_per_refresh() {
        let (mut session, _store, _dir) = session(Config::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        session.add_sink(Box::new(move |sky: &Arc<ProjectedSky>| {
            assert!(!sky.is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let t0 = epoch();
        assert!(session.tick(t0, 0.01, &FrameInput::default()).sky_refreshed);
        assert!(!session.tick(t0 + ChronoDuration::seconds(1), 0.01, &FrameInput::default()).sky_refreshed);
        assert!(session.tick(t0 + ChronoDuration::seconds(60), 0.01, &FrameInput::default()).sky_refreshed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_catalog_replace_invalidates_cache() {
        let (mut session, store, _dir) = session(Config::default());
        session.tick(epoch(), 0.01, &FrameInput::default());
        assert!(!session.tick(epoch(), 0.01, &FrameInput::default()).sky_refreshed);

        store.replace(Catalog::from_objects(vec![CelestialObject::new(
            "Vega",
            Category::Star,
            18.6156,
            38.7837,
        )]));
        let out = session.tick(epoch(), 0.01, &FrameInput::default());
        assert!(out.sky_refreshed);
        assert_eq!(session.sky().len(), 1);
        assert!(session.sky().position_of("vega").is_some());
    }

    #[test]
    fn test_pointer_hit_detects_object() {
        let (mut session, _store, _dir) = session(Config::default());
        session.tracker.start(&catalog(), "Sirius").unwrap();
        // Sirius is close to the meridian at this instant, well above the horizon
        let out = session.tick(epoch(), 0.01, &FrameInput::default());
        let hit = out.hit.unwrap();
        let sirius = session.sky().position_of("Sirius").unwrap();
        assert!((hit - sirius).norm() < 1.0);
        assert_eq!(out.pointed.as_deref(), Some("Sirius"));
    }

    #[test]
    fn test_camera_input() {
        let (mut session, _store, _dir) = session(Config::default());
        let start = session.camera().position;
        let input = FrameInput {
            up: 1.0,
            zoom: 1.0,
            ..FrameInput::default()
        };
        session.tick(epoch(), 0.01, &input);
        assert_abs_diff_eq!(session.camera().position.y, start.y + 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(session.camera().fov(), 82.0, epsilon = 1e-9);
        assert_eq!(session.background_stars().len(), BACKGROUND_STAR_COUNT);
    }
}
