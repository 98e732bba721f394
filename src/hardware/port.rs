//! Serial port configuration, transports and port discovery
//!
//! Device connections talk to a [`SerialTransport`] obtained from a
//! [`PortOpener`]. The production opener wraps the `serialport` crate and is
//! only functional with the `serial` feature; without it every open fails
//! with [`DeviceError::Unsupported`] and the kiosk runs without hardware.

use crate::error::{DeviceError, DeviceResult};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Default baud rate of the booth controllers
pub const DEFAULT_BAUD: u32 = 115200;

/// Configuration for one serial endpoint (always 8N1, no flow control)
#[derive(Debug, Clone, PartialEq)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate (default: 115200)
    pub baud_rate: u32,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default line settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open serial endpoint
pub trait SerialTransport: Read + Write + Send {
    /// Independent handle to the same endpoint, used by the read loop
    fn try_clone_transport(&self) -> io::Result<Box<dyn SerialTransport>>;

    /// Change how long a read blocks when no data arrives
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Opens serial endpoints
pub trait PortOpener: Send + Sync {
    fn open(&self, config: &PortConfig) -> DeviceResult<Box<dyn SerialTransport>>;
}

/// Opener backed by the operating system's serial ports
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

#[cfg(feature = "serial")]
mod native {
    use super::*;
    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

    pub(super) struct NativePort(pub(super) Box<dyn SerialPort>);

    impl Read for NativePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for NativePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.0.flush()
        }
    }

    impl SerialTransport for NativePort {
        fn try_clone_transport(&self) -> io::Result<Box<dyn SerialTransport>> {
            let port = self.0.try_clone().map_err(io::Error::from)?;
            Ok(Box::new(NativePort(port)))
        }

        fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
            self.0.set_timeout(timeout).map_err(io::Error::from)
        }
    }

    pub(super) fn open(config: &PortConfig) -> DeviceResult<Box<dyn SerialTransport>> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|e| DeviceError::Open {
                port: config.port_path.clone(),
                source: io::Error::from(e),
            })?;

        Ok(Box::new(NativePort(port)))
    }
}

impl PortOpener for SystemPortOpener {
    #[cfg(feature = "serial")]
    fn open(&self, config: &PortConfig) -> DeviceResult<Box<dyn SerialTransport>> {
        native::open(config)
    }

    #[cfg(not(feature = "serial"))]
    fn open(&self, config: &PortConfig) -> DeviceResult<Box<dyn SerialTransport>> {
        Err(DeviceError::Unsupported(config.port_path.clone()))
    }
}

/// USB vendor IDs of the bridges found on the booth's controller boards
static CONTROLLER_BRIDGES: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(0x303a, "Espressif native USB");
    m.insert(0x10c4, "Silicon Labs CP210x");
    m.insert(0x1a86, "WCH CH340");
    m.insert(0x0403, "FTDI");
    m.insert(0x2341, "Arduino");
    m
});

/// Name of the USB bridge for a vendor ID, if it is one the booth uses
pub fn bridge_name(vid: u16) -> Option<&'static str> {
    CONTROLLER_BRIDGES.get(&vid).copied()
}

/// Information about a detected serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl PortInfo {
    /// Whether this looks like an ESP32 or Arduino controller
    pub fn is_controller(&self) -> bool {
        if self.port_type != PortType::UsbSerial {
            return false;
        }

        if self.vid.and_then(bridge_name).is_some() {
            return true;
        }

        // Fallback: check product name for common keywords
        if let Some(ref prod) = self.product {
            let prod_lower = prod.to_lowercase();
            return prod_lower.contains("esp32")
                || prod_lower.contains("arduino")
                || prod_lower.contains("giga")
                || prod_lower.contains("uart")
                || prod_lower.contains("ch340");
        }

        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// List all available serial ports
#[cfg(feature = "serial")]
pub fn list_ports() -> anyhow::Result<Vec<PortInfo>> {
    use anyhow::Context;

    let ports = serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;

    let port_infos: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    PortType::UsbSerial,
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::PciPort => {
                    (PortType::PciSerial, None, None, None, None, None)
                }
                serialport::SerialPortType::BluetoothPort => {
                    (PortType::Bluetooth, None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    (PortType::Unknown, None, None, None, None, None)
                }
            };

            PortInfo {
                path: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect();

    Ok(port_infos)
}

/// Ports that look like booth controllers
#[cfg(feature = "serial")]
pub fn detect_controller_ports() -> anyhow::Result<Vec<PortInfo>> {
    Ok(list_ports()?.into_iter().filter(PortInfo::is_controller).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(vid: u16, product: Option<&str>) -> PortInfo {
        PortInfo {
            path: "/dev/ttyUSB0".to_string(),
            port_type: PortType::UsbSerial,
            manufacturer: None,
            product: product.map(str::to_string),
            serial_number: None,
            vid: Some(vid),
            pid: Some(0x7523),
        }
    }

    #[test]
    fn test_default_config() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.port_path, "/dev/ttyUSB0");
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_config_builder() {
        let config = PortConfig::new("/dev/ttyACM0")
            .with_baud_rate(9600)
            .with_timeout(Duration::from_millis(250));

        assert_eq!(config.port_path, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_controller_detection() {
        assert!(usb(0x1a86, None).is_controller());
        assert!(usb(0x2341, Some("GIGA R1 WiFi")).is_controller());
        assert!(usb(0xdead, Some("ESP32-S3 DevKit")).is_controller());
        assert!(!usb(0xdead, Some("Keyboard")).is_controller());

        let mut bt = usb(0x1a86, None);
        bt.port_type = PortType::Bluetooth;
        assert!(!bt.is_controller());
    }

    #[test]
    fn test_bridge_names() {
        assert_eq!(bridge_name(0x10c4), Some("Silicon Labs CP210x"));
        assert_eq!(bridge_name(0x0001), None);
    }

    #[cfg(not(feature = "serial"))]
    #[test]
    fn test_system_opener_without_serial_support() {
        let result = SystemPortOpener.open(&PortConfig::new("/dev/ttyUSB0"));
        assert!(matches!(result, Err(DeviceError::Unsupported(p)) if p == "/dev/ttyUSB0"));
    }
}
