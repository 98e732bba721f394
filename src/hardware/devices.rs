//! Device roles
//!
//! The booth has a fixed set of controllers: up to three ESP32 peripheral
//! controllers driving LEDs and motion props, and one Arduino GIGA that can
//! additionally relay signals to a networked target over UDP.

use crate::error::DeviceResult;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::connection::DeviceConnection;
use super::port::{PortConfig, PortOpener};
use super::protocol::Command;

/// Role of a registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    PeripheralController,
    Dispatcher,
}

impl DeviceKind {
    /// Registry key for this role
    pub fn key(&self, instance: u8) -> String {
        match self {
            DeviceKind::PeripheralController => format!("esp32_{}", instance),
            DeviceKind::Dispatcher => "dispatcher".to_string(),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::PeripheralController => write!(f, "peripheral controller"),
            DeviceKind::Dispatcher => write!(f, "dispatcher board"),
        }
    }
}

/// ESP32 peripheral controller
#[derive(Debug)]
pub struct PeripheralController {
    connection: DeviceConnection,
    instance: u8,
}

impl PeripheralController {
    pub fn new(config: PortConfig, instance: u8, opener: Arc<dyn PortOpener>) -> Self {
        Self {
            connection: DeviceConnection::new(&format!("ESP32-{}", instance), config, opener),
            instance,
        }
    }

    pub fn instance(&self) -> u8 {
        self.instance
    }

    /// Send `SIGNAL:<signal_id>:<value>`
    pub fn send_signal(&self, signal_id: &str, value: i32) -> DeviceResult<()> {
        self.connection
            .send_data(&Command::signal(signal_id, value).to_string())
    }
}

impl Deref for PeripheralController {
    type Target = DeviceConnection;

    fn deref(&self) -> &DeviceConnection {
        &self.connection
    }
}

/// Arduino GIGA dispatcher board
#[derive(Debug)]
pub struct DispatcherBoard {
    connection: DeviceConnection,
    relay_enabled: AtomicBool,
}

impl DispatcherBoard {
    pub fn new(config: PortConfig, opener: Arc<dyn PortOpener>) -> Self {
        Self {
            connection: DeviceConnection::new("Arduino GIGA", config, opener),
            relay_enabled: AtomicBool::new(false),
        }
    }

    /// Switch the board into UDP sender mode
    pub fn enable_relay(&self) -> DeviceResult<()> {
        self.connection.send_data(&Command::UdpEnable.to_string())?;
        self.relay_enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn disable_relay(&self) -> DeviceResult<()> {
        self.connection.send_data(&Command::UdpDisable.to_string())?;
        self.relay_enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Last relay mode acknowledged by a successful write
    pub fn relay_enabled(&self) -> bool {
        self.relay_enabled.load(Ordering::SeqCst)
    }

    /// Relay a signal to `target_ip` via `UDP_SEND`
    pub fn forward_signal(&self, target_ip: &str, signal_id: &str, value: i32) -> DeviceResult<()> {
        self.connection
            .send_data(&Command::udp_send(target_ip, signal_id, value).to_string())
    }
}

impl Deref for DispatcherBoard {
    type Target = DeviceConnection;

    fn deref(&self) -> &DeviceConnection {
        &self.connection
    }
}

/// Any registered device
#[derive(Debug)]
pub enum Device {
    Peripheral(PeripheralController),
    Dispatcher(DispatcherBoard),
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Peripheral(_) => DeviceKind::PeripheralController,
            Device::Dispatcher(_) => DeviceKind::Dispatcher,
        }
    }

    pub fn connection(&self) -> &DeviceConnection {
        match self {
            Device::Peripheral(p) => &p.connection,
            Device::Dispatcher(d) => &d.connection,
        }
    }

    pub fn as_peripheral(&self) -> Option<&PeripheralController> {
        match self {
            Device::Peripheral(p) => Some(p),
            Device::Dispatcher(_) => None,
        }
    }

    pub fn as_dispatcher(&self) -> Option<&DispatcherBoard> {
        match self {
            Device::Dispatcher(d) => Some(d),
            Device::Peripheral(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockOpener;

    #[test]
    fn test_keys() {
        assert_eq!(DeviceKind::PeripheralController.key(2), "esp32_2");
        assert_eq!(DeviceKind::Dispatcher.key(1), "dispatcher");
    }

    #[test]
    fn test_peripheral_signal_command() {
        let opener = Arc::new(MockOpener::new());
        let line = opener.attach("/dev/ttyUSB1");
        let esp = PeripheralController::new(PortConfig::new("/dev/ttyUSB1"), 2, opener);

        assert_eq!(esp.name(), "ESP32-2");
        esp.connect().unwrap();
        esp.send_signal("page_4", 1).unwrap();
        assert_eq!(line.written_lines(), vec!["SIGNAL:page_4:1"]);
    }

    #[test]
    fn test_dispatcher_commands() {
        let opener = Arc::new(MockOpener::new());
        let line = opener.attach("/dev/ttyACM0");
        let giga = DispatcherBoard::new(PortConfig::new("/dev/ttyACM0"), opener);

        assert!(giga.enable_relay().is_err());
        assert!(!giga.relay_enabled());

        giga.connect().unwrap();
        giga.enable_relay().unwrap();
        assert!(giga.relay_enabled());
        giga.forward_signal("10.0.0.5", "page_1", 1).unwrap();
        giga.disable_relay().unwrap();
        assert!(!giga.relay_enabled());

        assert_eq!(
            line.written_lines(),
            vec!["UDP_ENABLE", "UDP_SEND:10.0.0.5:page_1:1", "UDP_DISABLE"]
        );
    }

    #[test]
    fn test_device_accessors() {
        let opener: Arc<dyn PortOpener> = Arc::new(MockOpener::new());
        let device = Device::Dispatcher(DispatcherBoard::new(PortConfig::new("/dev/ttyACM0"), opener));
        assert_eq!(device.kind(), DeviceKind::Dispatcher);
        assert!(device.as_peripheral().is_none());
        assert_eq!(device.connection().name(), "Arduino GIGA");
    }
}
