//! End-to-end tracking protocol over a loopback socket

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use skytracker::catalogs::{Catalog, CatalogStore, Category, CelestialObject};
use skytracker::config::{Config, ServerConfig};
use skytracker::server::Server;
use skytracker::session::{FrameInput, SessionHandle, SkySession};
use tempfile::TempDir;

struct Harness {
    server: Server,
    handle: SessionHandle,
    alive: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
    _dir: TempDir,
}

impl Harness {
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CatalogStore::with_catalog(
            Catalog::from_objects(vec![
                CelestialObject::new("Sirius", Category::Star, 6.7715556, -16.7474167),
                CelestialObject::new("Vega", Category::Star, 18.630056, 38.811306),
                CelestialObject::new("Luna", Category::Moon, 12.5, -5.0),
            ]),
            dir.path().join("catalog.json"),
        ));
        let mut session = SkySession::new(Config::default(), store, None);
        let handle = session.handle();

        let alive = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&alive);
        let ticker = thread::spawn(move || {
            while flag.load(Ordering::SeqCst) {
                session.tick(Utc::now(), 0.01, &FrameInput::default());
                thread::sleep(Duration::from_millis(5));
            }
        });

        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            update_interval_ms: 25,
            read_timeout_ms: 50,
            join_timeout_ms: 1000,
        };
        let server = Server::start(&config, handle.clone()).unwrap();
        Self {
            server,
            handle,
            alive,
            ticker: Some(ticker),
            _dir: dir,
        }
    }

    fn connect(&self) -> (TcpStream, BufReader<TcpStream>) {
        let stream = TcpStream::connect(self.server.local_addr()).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        (stream, reader)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.server.stop();
        self.alive.store(false, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
    }
}

fn read_line(reader: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    line
}

fn parse_pair(payload: &str) -> (f64, f64) {
    let (yaw, pitch) = payload.trim_end().split_once(',').unwrap();
    (yaw.parse().unwrap(), pitch.parse().unwrap())
}

#[test]
fn test_track_then_stream_then_stop() {
    let harness = Harness::start();
    let (mut stream, mut reader) = harness.connect();

    stream.write_all(b"sIrIuS\n").unwrap();
    assert_eq!(read_line(&mut reader), "OK\n");

    for _ in 0..3 {
        let data = read_line(&mut reader);
        let sensor = read_line(&mut reader);
        let (yaw, pitch) = parse_pair(data.strip_prefix("DATA:").unwrap());
        let (sensor_yaw, sensor_pitch) = parse_pair(sensor.strip_prefix("SENSOR:").unwrap());
        assert!((0.0..360.0).contains(&yaw));
        assert!((-89.0..=89.0).contains(&pitch));
        assert!((0.0..360.0).contains(&sensor_yaw));
        assert!((-89.0..=89.0).contains(&sensor_pitch));
        // One decimal place on the wire
        assert_eq!(data.trim_end().split(',').nth(1).unwrap().split('.').nth(1).unwrap().len(), 1);
    }
    assert_eq!(harness.handle.telemetry().target.as_deref(), Some("Sirius"));

    stream.write_all(b"stop\n").unwrap();
    // Reports already in flight may precede the reply
    let mut rest = String::new();
    reader.read_to_string(&mut rest).unwrap();
    assert!(rest.ends_with("STOPPED\n"));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(harness.handle.telemetry().target, None);
}

#[test]
fn test_unknown_object_reply() {
    let harness = Harness::start();
    let (mut stream, mut reader) = harness.connect();

    stream.write_all(b"  Andromeda Nebula \n").unwrap();
    assert_eq!(
        read_line(&mut reader),
        "ERROR: Objeto 'andromeda nebula' no encontrado\n"
    );
    assert_eq!(harness.handle.telemetry().target, None);

    // The connection stays usable after an error
    stream.write_all(b"LUNA\n").unwrap();
    assert_eq!(read_line(&mut reader), "OK\n");
    assert!(read_line(&mut reader).starts_with("DATA:"));
}

#[test]
fn test_two_clients_share_the_tracker() {
    let harness = Harness::start();
    let (mut first, mut first_reader) = harness.connect();
    let (mut second, mut second_reader) = harness.connect();

    first.write_all(b"vega\n").unwrap();
    assert_eq!(read_line(&mut first_reader), "OK\n");
    second.write_all(b"sirius\n").unwrap();
    assert_eq!(read_line(&mut second_reader), "OK\n");

    // The last request wins for everyone
    thread::sleep(Duration::from_millis(50));
    assert_eq!(harness.handle.telemetry().target.as_deref(), Some("Sirius"));
}

#[test]
fn test_shutdown_with_streaming_client() {
    let mut harness = Harness::start();
    let (mut stream, mut reader) = harness.connect();
    stream.write_all(b"vega\n").unwrap();
    assert_eq!(read_line(&mut reader), "OK\n");

    let started = std::time::Instant::now();
    harness.server.stop();
    assert!(started.elapsed() < Duration::from_secs(2));

    // Drain whatever was in flight; the server side is gone
    let mut rest = Vec::new();
    let _ = reader.read_to_end(&mut rest);
    assert!(!harness.server.is_running());
}
