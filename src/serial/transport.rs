//! Byte transports behind the serial link

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serialport::SerialPort;

use super::SerialError;

/// Port timeout; reads only happen when bytes are waiting, writes run on the writer thread
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Boards that reset when the port opens need this long before they listen
const RESET_SETTLE: Duration = Duration::from_secs(2);

/// Lines waiting for the writer thread before new ones are dropped
const WRITE_QUEUE_DEPTH: usize = 8;

/// Lines the simulated actuator remembers
pub const SIMULATED_HISTORY: usize = 256;

/// Line-oriented, non-blocking transport
pub trait SerialTransport: Send {
    /// Write one complete line, newline included
    fn write_line(&mut self, line: &str) -> Result<(), SerialError>;

    /// Next complete inbound line without its terminator, if one is available
    ///
    /// Must not block waiting for data.
    fn read_line(&mut self) -> Result<Option<String>, SerialError>;

    /// Human readable description for logs and status output
    fn describe(&self) -> String;
}

/// Accumulates raw bytes and splits them into lines
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next non-empty line, trimmed; incomplete trailing data stays buffered
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }
}

/// Hands outbound lines to a dedicated writer thread
///
/// `send` never waits on the device. When the queue is full the line is
/// dropped and reported as an error.
#[derive(Debug)]
pub struct QueuedWriter {
    lines: Sender<String>,
}

impl QueuedWriter {
    /// Start a writer thread draining into `sink`; it exits when `self` drops
    pub fn spawn<W: Write + Send + 'static>(name: &str, mut sink: W) -> io::Result<Self> {
        let (lines, queue) = crossbeam_channel::bounded::<String>(WRITE_QUEUE_DEPTH);
        let device = name.to_string();
        thread::Builder::new()
            .name(format!("serial-writer {}", name))
            .spawn(move || {
                for line in queue {
                    if let Err(e) = sink.write_all(line.as_bytes()).and_then(|()| sink.flush()) {
                        warn!("Write to {} failed: {}", device, e);
                    }
                }
                debug!("Serial writer for {} stopped", device);
            })?;
        Ok(Self { lines })
    }

    pub fn send(&self, line: &str) -> Result<(), SerialError> {
        match self.lines.try_send(line.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SerialError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                "write queue full",
            ))),
            Err(TrySendError::Disconnected(_)) => Err(SerialError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "serial writer stopped",
            ))),
        }
    }
}

/// Hardware serial port
///
/// Reads happen on the caller's thread and only when bytes are waiting;
/// writes go through a [`QueuedWriter`] on a clone of the port.
pub struct PortTransport {
    name: String,
    port: Box<dyn SerialPort>,
    writer: QueuedWriter,
    buffer: LineBuffer,
}

impl PortTransport {
    /// Open `path` at `baud_rate` and wait for the board to come out of reset
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SerialError> {
        info!("Opening serial port: {} at {} bps", path, baud_rate);
        let port = serialport::new(path, baud_rate)
            .timeout(PORT_TIMEOUT)
            .open()?;
        thread::sleep(RESET_SETTLE);
        let writer = QueuedWriter::spawn(path, port.try_clone()?)?;
        info!("Serial port {} ready", path);
        Ok(Self {
            name: path.to_string(),
            port,
            writer,
            buffer: LineBuffer::new(),
        })
    }
}

impl SerialTransport for PortTransport {
    fn write_line(&mut self, line: &str) -> Result<(), SerialError> {
        self.writer.send(line)
    }

    fn read_line(&mut self) -> Result<Option<String>, SerialError> {
        if let Some(line) = self.buffer.next_line() {
            return Ok(Some(line));
        }
        let waiting = self.port.bytes_to_read()? as usize;
        if waiting > 0 {
            let mut chunk = vec![0u8; waiting];
            let read = self.port.read(&mut chunk)?;
            self.buffer.extend(&chunk[..read]);
        }
        Ok(self.buffer.next_line())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    sent: VecDeque<String>,
    inbound: VecDeque<String>,
}

/// In-memory stand-in for the actuator
///
/// Clones share state, so a test can keep a handle to inspect what was sent
/// after boxing the transport into a link.
#[derive(Debug, Default, Clone)]
pub struct SimulatedTransport {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line as if the actuator had sent it
    pub fn push_inbound(&self, line: &str) {
        self.state.lock().inbound.push_back(line.to_string());
    }

    /// The last [`SIMULATED_HISTORY`] lines written, oldest first
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.iter().cloned().collect()
    }
}

impl SerialTransport for SimulatedTransport {
    fn write_line(&mut self, line: &str) -> Result<(), SerialError> {
        debug!("[simulated actuator] <- {}", line.trim_end());
        let mut state = self.state.lock();
        if state.sent.len() == SIMULATED_HISTORY {
            state.sent.pop_front();
        }
        state.sent.push_back(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, SerialError> {
        Ok(self.state.lock().inbound.pop_front())
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }
}
