//! Line-oriented TCP tracking server
//!
//! Protocol, one UTF-8 line per message:
//!
//! | Client sends | Server replies |
//! |---|---|
//! | object name, any case | `OK`, then `DATA:<yaw>,<pitch>` and `SENSOR:<yaw>,<pitch>` every update interval |
//! | unknown name | `ERROR: Objeto '<name>' no encontrado` |
//! | `stop` | `STOPPED`, then the connection is closed |
//! | empty line | the connection is closed |
//!
//! Every connection runs on its own thread. Handlers never touch tracking
//! state directly: they go through a [`SessionHandle`], which forwards
//! requests to the session thread and reads its published telemetry.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::session::SessionHandle;
use crate::{Result, SkytrackerError};

/// How often the accept loop checks the running flag
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// How long a handler waits for the session to answer a tracking request
const START_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest request line accepted, newline excluded; longer lines close the connection
const MAX_LINE_BYTES: usize = 1024;

/// Grace period for handlers to exit after their socket was hard-closed
const CLOSE_GRACE: Duration = Duration::from_millis(200);

/// Interface address other machines can reach this host on
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick the
/// outbound interface. Falls back to loopback when there is no route.
pub fn discover_local_ip() -> IpAddr {
    let probe = || -> io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

struct Connection {
    peer: SocketAddr,
    stream: TcpStream,
    thread: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    update_interval: Duration,
    read_timeout: Duration,
}

/// A running server; stopped on [`stop`](Server::stop) or drop
pub struct Server {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    connections: Arc<Mutex<Vec<Connection>>>,
    join_timeout: Duration,
}

impl Server {
    /// Bind `config.address()` and start accepting connections
    pub fn start(config: &ServerConfig, session: SessionHandle) -> Result<Self> {
        let listener = TcpListener::bind(config.address())?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let connections = Arc::new(Mutex::new(Vec::new()));
        let timing = Timing {
            update_interval: Duration::from_millis(config.update_interval_ms),
            read_timeout: Duration::from_millis(config.read_timeout_ms.max(1)),
        };

        let accept_thread = {
            let running = Arc::clone(&running);
            let connections = Arc::clone(&connections);
            thread::Builder::new()
                .name("tracking-server".to_string())
                .spawn(move || accept_loop(listener, session, running, connections, timing))?
        };

        info!(
            "Tracking server listening on {} (reachable at {}:{}, updates every {} ms)",
            local_addr,
            discover_local_ip(),
            local_addr.port(),
            config.update_interval_ms
        );

        Ok(Self {
            local_addr,
            running,
            accept_thread: Some(accept_thread),
            connections,
            join_timeout: Duration::from_millis(config.join_timeout_ms),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of connections whose handler is still running
    pub fn connection_count(&self) -> usize {
        self.connections
            .lock()
            .iter()
            .filter(|c| !c.thread.is_finished())
            .count()
    }

    /// Stop accepting, wait a bounded time for handlers, then hard-close the rest
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(accept) = self.accept_thread.take() {
            if accept.join().is_err() {
                warn!("Accept thread panicked");
            }
        }

        let connections: Vec<Connection> = self.connections.lock().drain(..).collect();
        let deadline = Instant::now() + self.join_timeout;
        for connection in connections {
            if !wait_finished(&connection.thread, deadline) {
                warn!("Closing unresponsive connection {}", connection.peer);
                let _ = connection.stream.shutdown(Shutdown::Both);
                if !wait_finished(&connection.thread, Instant::now() + CLOSE_GRACE) {
                    warn!("Abandoning handler for {}", connection.peer);
                    continue;
                }
            }
            if connection.thread.join().is_err() {
                warn!("Handler for {} panicked", connection.peer);
            }
        }
        info!("Tracking server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .finish()
    }
}

fn wait_finished(thread: &JoinHandle<()>, deadline: Instant) -> bool {
    while !thread.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    true
}

fn accept_loop(
    listener: TcpListener,
    session: SessionHandle,
    running: Arc<AtomicBool>,
    connections: Arc<Mutex<Vec<Connection>>>,
    timing: Timing,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!("New connection from {}", peer);
                match spawn_handler(stream, peer, session.clone(), Arc::clone(&running), timing) {
                    Ok(connection) => {
                        let mut connections = connections.lock();
                        connections.retain(|c| !c.thread.is_finished());
                        connections.push(connection);
                    }
                    Err(e) => warn!("Could not set up connection {}: {}", peer, e),
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                warn!("Accept failed: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!("Accept loop finished");
}

fn spawn_handler(
    stream: TcpStream,
    peer: SocketAddr,
    session: SessionHandle,
    running: Arc<AtomicBool>,
    timing: Timing,
) -> io::Result<Connection> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(timing.read_timeout))?;
    let closer = stream.try_clone()?;
    let thread = thread::Builder::new()
        .name(format!("client-{}", peer))
        .spawn(move || {
            let mut client = ClientConnection {
                peer,
                session,
                running,
                timing,
                streaming: false,
                next_report: Instant::now(),
            };
            match client.serve(stream) {
                Ok(()) => info!("Connection {} closed", peer),
                Err(e) => warn!("Connection {} failed: {}", peer, e),
            }
        })?;
    Ok(Connection {
        peer,
        stream: closer,
        thread,
    })
}

/// Per-connection protocol state
struct ClientConnection {
    peer: SocketAddr,
    session: SessionHandle,
    running: Arc<AtomicBool>,
    timing: Timing,
    /// Set once a tracking request succeeded; reports flow from then on
    streaming: bool,
    next_report: Instant,
}

enum Flow {
    Continue,
    Close,
}

impl ClientConnection {
    fn serve(&mut self, stream: TcpStream) -> io::Result<()> {
        let mut writer = stream.try_clone()?;
        let mut reader = BufReader::new(stream);
        let result = self.converse(&mut reader, &mut writer);
        // The server keeps its own clone of the socket, so dropping ours does not close it
        let _ = writer.shutdown(Shutdown::Both);
        result
    }

    fn converse(&mut self, reader: &mut BufReader<TcpStream>, writer: &mut TcpStream) -> io::Result<()> {
        // Bytes of a line still being received survive read timeouts here
        let mut pending = Vec::new();

        while self.running.load(Ordering::SeqCst) {
            if self.streaming {
                self.report_if_due(writer)?;
                let wait = self
                    .next_report
                    .saturating_duration_since(Instant::now())
                    .clamp(Duration::from_millis(1), self.timing.read_timeout);
                reader.get_ref().set_read_timeout(Some(wait))?;
            }

            // Read at most one byte past the cap
            let budget = (MAX_LINE_BYTES + 1 - pending.len()) as u64;
            match reader.by_ref().take(budget).read_until(b'\n', &mut pending) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    let complete = pending.last() == Some(&b'\n');
                    if !complete && pending.len() > MAX_LINE_BYTES {
                        warn!("{}: request line over {} bytes, closing", self.peer, MAX_LINE_BYTES);
                        return Ok(());
                    }
                    let line = String::from_utf8_lossy(&pending).trim().to_string();
                    pending.clear();
                    if let Flow::Close = self.handle_line(&line, writer)? {
                        return Ok(());
                    }
                    if !complete {
                        // Peer closed mid-line
                        return Ok(());
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str, writer: &mut TcpStream) -> io::Result<Flow> {
        if line.is_empty() {
            return Ok(Flow::Close);
        }
        if line.eq_ignore_ascii_case("stop") {
            info!("{}: stop", self.peer);
            self.session.stop_tracking();
            writer.write_all(b"STOPPED\n")?;
            return Ok(Flow::Close);
        }

        let requested = line.to_lowercase();
        info!("{}: tracking '{}'", self.peer, requested);
        match self.session.start_tracking(line, START_TIMEOUT) {
            Ok(canonical) => {
                debug!("{}: tracking {}", self.peer, canonical);
                writer.write_all(b"OK\n")?;
                if !self.streaming {
                    self.streaming = true;
                    self.next_report = Instant::now();
                }
            }
            Err(SkytrackerError::ObjectNotFound(_)) => {
                writer.write_all(format!("ERROR: Objeto '{}' no encontrado\n", requested).as_bytes())?;
            }
            Err(e) => {
                warn!("{}: tracking request failed: {}", self.peer, e);
                writer.write_all(b"ERROR: No se pudo iniciar rastreo\n")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn report_if_due(&mut self, writer: &mut TcpStream) -> io::Result<()> {
        let now = Instant::now();
        if now < self.next_report {
            return Ok(());
        }
        let telemetry = self.session.telemetry();
        let mut lines = telemetry.data_line();
        lines.push_str(&telemetry.sensor_line());
        writer.write_all(lines.as_bytes())?;
        self.next_report += self.timing.update_interval;
        if self.next_report < now {
            // Fell behind, e.g. after a slow start request; do not burst
            self.next_report = now + self.timing.update_interval;
        }
        Ok(())
    }
}
