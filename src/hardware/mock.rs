//! In-memory serial endpoints for tests

use super::port::{PortConfig, PortOpener, SerialTransport};
use crate::error::{DeviceError, DeviceResult};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Both ends of a fake serial line; clones share the same buffers
#[derive(Clone, Default)]
pub struct MockLine {
    inbound: Arc<Mutex<VecDeque<u8>>>,
    written: Arc<Mutex<Vec<u8>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MockLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes the device "sends" to the host
    pub fn push_inbound(&self, data: &[u8]) {
        self.inbound.lock().unwrap().extend(data.iter().copied());
    }

    /// Lines the host wrote, without terminators
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn written_raw(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn transport(&self) -> MockTransport {
        MockTransport {
            line: self.clone(),
            timeout: Duration::from_millis(5),
        }
    }
}

struct MockTransport {
    line: MockLine,
    timeout: Duration,
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.line.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }

        let n = {
            let mut inbound = self.line.inbound.lock().unwrap();
            let n = buf.len().min(inbound.len());
            for (slot, byte) in buf.iter_mut().zip(inbound.drain(..n)) {
                *slot = byte;
            }
            n
        };

        if n == 0 {
            thread::sleep(self.timeout);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        Ok(n)
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.line.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.line.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialTransport for MockTransport {
    fn try_clone_transport(&self) -> io::Result<Box<dyn SerialTransport>> {
        Ok(Box::new(self.line.transport()))
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout.min(Duration::from_millis(20));
        Ok(())
    }
}

/// Opener where only explicitly attached ports exist
#[derive(Default)]
pub struct MockOpener {
    lines: Mutex<HashMap<String, MockLine>>,
    opens: AtomicUsize,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `port` openable and return its line
    pub fn attach(&self, port: &str) -> MockLine {
        let line = MockLine::new();
        self.lines.lock().unwrap().insert(port.to_string(), line.clone());
        line
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl PortOpener for MockOpener {
    fn open(&self, config: &PortConfig) -> DeviceResult<Box<dyn SerialTransport>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.lines.lock().unwrap().get(&config.port_path) {
            Some(line) => Ok(Box::new(line.transport())),
            None => Err(DeviceError::Open {
                port: config.port_path.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}
