//! One serial device connection
//!
//! A [`DeviceConnection`] owns a single endpoint for the lifetime of the
//! process. Writes happen synchronously on the caller's thread; reads happen
//! on one background thread per connection, which forwards every received
//! line into the connection's inbound channel.

use crate::error::{DeviceError, DeviceResult};
use crate::worker::{join_bounded, JOIN_TIMEOUT};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::port::{PortConfig, PortOpener, SerialTransport};

/// How long the read loop blocks before re-checking its stop flag
const READ_POLL: Duration = Duration::from_millis(50);

/// Connection state as shown in the status panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// A line received from a device
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub timestamp: DateTime<Local>,
    /// Device name, e.g. "ESP32-1"
    pub source: String,
    pub data: String,
}

struct ReadLoop {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct DeviceConnection {
    name: String,
    config: PortConfig,
    opener: Arc<dyn PortOpener>,
    writer: Mutex<Option<Box<dyn SerialTransport>>>,
    status: Arc<Mutex<ConnectionStatus>>,
    reader: Mutex<Option<ReadLoop>>,
    inbound_tx: Mutex<Sender<InboundMessage>>,
    inbound_rx: Mutex<Receiver<InboundMessage>>,
}

impl DeviceConnection {
    pub fn new(name: &str, config: PortConfig, opener: Arc<dyn PortOpener>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            name: name.to_string(),
            config,
            opener,
            writer: Mutex::new(None),
            status: Arc::new(Mutex::new(ConnectionStatus::Disconnected)),
            reader: Mutex::new(None),
            inbound_tx: Mutex::new(tx),
            inbound_rx: Mutex::new(rx),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> &str {
        &self.config.port_path
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionStatus {
        *lock(&self.status)
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Open the serial endpoint.
    ///
    /// On failure the status becomes `Error` and the error is logged and
    /// returned. A device that is already connected is left as is.
    pub fn connect(&self) -> DeviceResult<()> {
        if self.is_connected() {
            debug!("{} already connected", self.name);
            return Ok(());
        }

        // Drop whatever is left of a previous session before reopening.
        self.stop_reading();

        match self.opener.open(&self.config) {
            Ok(port) => {
                *lock(&self.writer) = Some(port);
                set_status(&self.status, ConnectionStatus::Connected);
                info!(
                    "{} connected on {} at {} baud",
                    self.name, self.config.port_path, self.config.baud_rate
                );
                Ok(())
            }
            Err(e) => {
                *lock(&self.writer) = None;
                set_status(&self.status, ConnectionStatus::Error);
                error!("Failed to connect {}: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// Start the background read loop.
    ///
    /// Returns false if the device is not connected. A loop that is already
    /// running is kept; no second loop is spawned.
    pub fn start_reading(&self) -> bool {
        if !self.is_connected() {
            return false;
        }

        let mut reader = lock(&self.reader);
        if let Some(ref current) = *reader {
            if !current.handle.is_finished() {
                return true;
            }
        }

        let port = {
            let writer = lock(&self.writer);
            match writer.as_ref().map(|w| w.try_clone_transport()) {
                Some(Ok(port)) => port,
                Some(Err(e)) => {
                    error!("Failed to clone {} for reading: {}", self.name, e);
                    return false;
                }
                None => return false,
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let ctx = ReadContext {
            name: self.name.clone(),
            running: Arc::clone(&running),
            status: Arc::clone(&self.status),
            inbound: lock(&self.inbound_tx).clone(),
        };

        let spawned = thread::Builder::new()
            .name(format!("read-{}", self.name))
            .spawn(move || read_loop(port, ctx));

        match spawned {
            Ok(handle) => {
                *reader = Some(ReadLoop { running, handle });
                debug!("{} read loop started", self.name);
                true
            }
            Err(e) => {
                error!("Failed to spawn read loop for {}: {}", self.name, e);
                false
            }
        }
    }

    /// Whether a read loop thread is currently alive
    pub fn is_reading(&self) -> bool {
        lock(&self.reader)
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    /// Write `data` followed by a newline
    pub fn send_data(&self, data: &str) -> DeviceResult<()> {
        let mut writer = lock(&self.writer);
        let port = match writer.as_mut() {
            Some(port) if self.is_connected() => port,
            _ => return Err(DeviceError::NotConnected(self.name.clone())),
        };

        let result = port
            .write_all(format!("{}\n", data).as_bytes())
            .and_then(|_| port.flush());

        match result {
            Ok(()) => {
                debug!("Sent to {}: {}", self.name, data);
                Ok(())
            }
            Err(source) => {
                error!("Failed to send to {}: {}", self.name, source);
                set_status(&self.status, ConnectionStatus::Error);
                Err(DeviceError::Io {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Stop reading, close the endpoint and mark the device disconnected.
    ///
    /// Safe to call at any time, including when never connected.
    pub fn disconnect(&self) {
        self.stop_reading();

        let was_open = lock(&self.writer).take().is_some();
        set_status(&self.status, ConnectionStatus::Disconnected);
        if was_open {
            info!("{} disconnected", self.name);
        }
    }

    /// Take every queued inbound message, oldest first
    pub fn drain_inbound(&self) -> Vec<InboundMessage> {
        lock(&self.inbound_rx).try_iter().collect()
    }

    fn stop_reading(&self) {
        let current = lock(&self.reader).take();
        if let Some(read_loop) = current {
            read_loop.running.store(false, Ordering::SeqCst);
            join_bounded(read_loop.handle, JOIN_TIMEOUT, &format!("{} read loop", self.name));
        }
    }
}

impl Drop for DeviceConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("name", &self.name)
            .field("port", &self.config.port_path)
            .field("status", &self.status())
            .finish()
    }
}

struct ReadContext {
    name: String,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<ConnectionStatus>>,
    inbound: Sender<InboundMessage>,
}

impl ReadContext {
    fn fail(&self, what: &str, err: &dyn fmt::Display) {
        // A stop request racing with a dying port is not an error.
        if self.running.load(Ordering::SeqCst) {
            error!("Error reading from {} ({}): {}", self.name, what, err);
            set_status(&self.status, ConnectionStatus::Error);
        }
    }
}

/// Read newline-terminated lines until stopped or the port fails
fn read_loop(mut port: Box<dyn SerialTransport>, ctx: ReadContext) {
    if let Err(e) = port.set_read_timeout(READ_POLL) {
        warn!("{}: could not shorten read timeout: {}", ctx.name, e);
    }

    let mut pending: Vec<u8> = Vec::new();
    let mut buffer = [0u8; 256];

    while ctx.running.load(Ordering::SeqCst) {
        match port.read(&mut buffer) {
            Ok(0) => thread::sleep(READ_POLL),
            Ok(n) => {
                pending.extend_from_slice(&buffer[..n]);
                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = pending.drain(..=pos).collect();
                    let line = match String::from_utf8(raw) {
                        Ok(line) => line,
                        Err(e) => {
                            // The port itself is fine; writes keep working.
                            error!("Undecodable line from {}: {}", ctx.name, e);
                            return;
                        }
                    };

                    let data = line.trim();
                    if data.is_empty() {
                        continue;
                    }

                    let message = InboundMessage {
                        timestamp: Local::now(),
                        source: ctx.name.clone(),
                        data: data.to_string(),
                    };
                    if ctx.inbound.send(message).is_err() {
                        // Connection dropped; nobody is listening any more.
                        return;
                    }
                }
            }
            Err(ref e) if is_idle(e) => {}
            Err(e) => {
                ctx.fail("io", &e);
                return;
            }
        }
    }
}

fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_status(status: &Mutex<ConnectionStatus>, value: ConnectionStatus) {
    *lock(status) = value;
}
