//! Headless sky tracker console
//!
//! Runs the tracking session at a fixed frame rate together with the TCP
//! tracking server and the actuator link, and shows a status screen. Type an
//! object name and Enter to track it; an empty line or `stop` stops tracking;
//! `reload` re-reads the catalog; `quit` exits.
//!
//! Usage:
//!   cargo run --bin skytracker -- [--config skytracker.json] [--serial /dev/ttyUSB0] [--room]

use std::io::{self, BufRead, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::{ArgAction, Parser};
use log::{error, info, warn};

use skytracker::server::{discover_local_ip, Server};
use skytracker::session::{FrameInput, SessionHandle, SkySession, TelemetrySnapshot};
use skytracker::time::SiderealTime;
use skytracker::{CatalogStore, Config};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const FRAME_INTERVAL: Duration = Duration::from_millis(50);
const STATUS_INTERVAL: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Sky tracker console
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Tracks catalog objects with a pointer, mirrors it to an actuator and serves it over TCP",
    long_about = None
)]
struct Args {
    /// Configuration file; missing means defaults
    #[arg(short, long, default_value = "skytracker.json")]
    config: PathBuf,

    /// Catalog file, overrides the configuration
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// TCP port of the tracking server
    #[arg(short, long)]
    port: Option<u16>,

    /// Serial device of the actuator; implies hardware mode
    #[arg(short, long)]
    serial: Option<String>,

    /// Simulate the actuator even if a serial device is configured
    #[arg(long, action = ArgAction::SetTrue)]
    simulate: bool,

    /// Project onto the room cube instead of the dome
    #[arg(long, action = ArgAction::SetTrue)]
    room: bool,

    /// Do not draw the status screen
    #[arg(long, action = ArgAction::SetTrue)]
    no_status: bool,

    /// Debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring {}: {}", args.config.display(), e);
            Config::default()
        }
    };
    if let Some(catalog) = &args.catalog {
        config.catalog_path = catalog.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(serial) = &args.serial {
        config.serial.port = Some(serial.clone());
        config.serial.simulate = false;
    }
    if args.simulate {
        config.serial.simulate = true;
    }
    if args.room {
        config.dome.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

enum ConsoleCommand {
    Track(String),
    Stop,
    Reload,
    Quit,
}

fn parse_command(line: &str) -> ConsoleCommand {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("stop") {
        ConsoleCommand::Stop
    } else if line.eq_ignore_ascii_case("reload") {
        ConsoleCommand::Reload
    } else if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
        ConsoleCommand::Quit
    } else {
        ConsoleCommand::Track(line.to_string())
    }
}

/// Reads commands from stdin until `quit` or end of input
fn spawn_input_thread(
    handle: SessionHandle,
    catalogs: Arc<CatalogStore>,
    running: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match parse_command(&line) {
                    ConsoleCommand::Stop => handle.stop_tracking(),
                    ConsoleCommand::Reload => match catalogs.reload() {
                        Ok(()) => println!("Catalog reloaded"),
                        Err(e) => println!("Catalog reload failed: {}", e),
                    },
                    ConsoleCommand::Quit => {
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                    ConsoleCommand::Track(name) => {
                        match handle.start_tracking(&name, REQUEST_TIMEOUT) {
                            Ok(canonical) => println!("Tracking {}", canonical),
                            Err(e) => println!("Could not track '{}': {}", name, e),
                        }
                    }
                }
            }
        })
}

/// Status screen text; `server` is the address clients should connect to
fn status_text(
    telemetry: &TelemetrySnapshot,
    server: Option<SocketAddr>,
    actuator: &str,
    objects: &str,
) -> String {
    let lst = SiderealTime::from_hours(telemetry.lst_hours);
    let server = match server {
        Some(addr) => format!("TCP server: {}", addr),
        None => "TCP server: not running".to_string(),
    };
    format!(
        "POINTER  - Yaw: {:.1}° Pitch: {:.1}°\n\
         FEEDBACK - Yaw: {:.1}° Pitch: {:.1}°\n\
         LST: {}\n\
         Tracking: {}\n\
         Actuator: {}\n\n\
         {}\n\n\
         Available objects:\n\
         {}\n\n\
         Object to track (empty line stops, 'quit' exits) >>> ",
        telemetry.commanded_yaw,
        telemetry.commanded_pitch,
        telemetry.sensor_yaw,
        telemetry.sensor_pitch,
        lst,
        telemetry.target.as_deref().unwrap_or("none"),
        actuator,
        server,
        objects,
    )
}

fn draw_status(text: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    write!(out, "\x1b[2J\x1b[H{}", text)?;
    out.flush()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = load_config(&args)?;
    let catalogs = Arc::new(CatalogStore::open(&config.catalog_path));

    // The actuator is the point of hardware mode, so failing to reach it is fatal
    let serial = match skytracker::serial::SerialLink::open(&config.serial) {
        Ok(link) => link,
        Err(e) => {
            error!("Could not open the actuator link: {}", e);
            process::exit(1);
        }
    };
    let actuator = serial.describe();

    let mut session = SkySession::new(config.clone(), Arc::clone(&catalogs), Some(serial));
    let handle = session.handle();

    let mut server = match Server::start(&config.server, handle.clone()) {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("Tracking server unavailable: {}", e);
            None
        }
    };
    // Resolved once, not on every status redraw
    let server_addr = server
        .as_ref()
        .map(|server| SocketAddr::new(discover_local_ip(), server.local_addr().port()));

    let running = Arc::new(AtomicBool::new(true));
    spawn_input_thread(handle.clone(), Arc::clone(&catalogs), Arc::clone(&running))?;

    let show_status = !args.no_status && io::stdout().is_terminal();
    let mut last_frame = Instant::now();
    let mut last_status: Option<Instant> = None;
    info!("Running; type 'quit' to exit");

    while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();
        let dt = frame_start.duration_since(last_frame).as_secs_f64();
        last_frame = frame_start;

        session.tick(Utc::now(), dt, &FrameInput::default());

        if show_status && last_status.map_or(true, |t| t.elapsed() >= STATUS_INTERVAL) {
            let objects = session.catalog().object_list_text();
            let text = status_text(&handle.telemetry(), server_addr, &actuator, &objects);
            if let Err(e) = draw_status(&text) {
                warn!("Status screen: {}", e);
            }
            last_status = Some(Instant::now());
        }

        if let Some(remaining) = FRAME_INTERVAL.checked_sub(frame_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    if let Some(server) = server.as_mut() {
        server.stop();
    }
    info!("Bye");
    Ok(())
}
