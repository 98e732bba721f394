//! Device registry
//!
//! Owns every device of the booth under a fixed key (`esp32_1`..`esp32_3`,
//! `dispatcher`) and fans slide signals out to all of them. Devices are added
//! while the registry is still being assembled; after that it is shared
//! read-only behind an `Arc` and every operation takes `&self`.

use crate::config::HardwareConfig;
use crate::error::{DeviceError, DeviceResult};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::connection::{ConnectionStatus, DeviceConnection, InboundMessage};
use super::devices::{Device, DeviceKind, DispatcherBoard, PeripheralController};
use super::port::{PortConfig, PortOpener, DEFAULT_BAUD};

/// Outcome of one signal fan-out, by device key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
    /// Devices that were offline and not attempted
    pub skipped: Vec<String>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

pub struct DeviceRegistry {
    devices: Vec<(String, Device)>,
    opener: Arc<dyn PortOpener>,
    baud_rate: u32,
    timeout: Duration,
}

impl DeviceRegistry {
    /// Empty registry whose devices will be opened through `opener`
    pub fn new(opener: Arc<dyn PortOpener>) -> Self {
        Self {
            devices: Vec::new(),
            opener,
            baud_rate: DEFAULT_BAUD,
            timeout: Duration::from_secs(1),
        }
    }

    /// Line settings applied to devices added afterwards
    pub fn with_line_settings(mut self, baud_rate: u32, timeout: Duration) -> Self {
        self.baud_rate = baud_rate;
        self.timeout = timeout;
        self
    }

    /// Registry holding the booth's standard set: three peripheral
    /// controllers and the dispatcher board
    pub fn from_config(config: &HardwareConfig, opener: Arc<dyn PortOpener>) -> Self {
        let mut registry = Self::new(opener).with_line_settings(config.baud_rate, config.timeout());
        for (index, port) in config.peripheral_ports().iter().enumerate() {
            registry.add(DeviceKind::PeripheralController, port, index as u8 + 1);
        }
        registry.add(DeviceKind::Dispatcher, &config.dispatcher_port, 1);
        registry
    }

    /// Register a device without connecting it. Returns its key.
    ///
    /// A device already registered under the same key is replaced.
    pub fn add(&mut self, kind: DeviceKind, port: &str, instance: u8) -> String {
        let config = PortConfig::new(port)
            .with_baud_rate(self.baud_rate)
            .with_timeout(self.timeout);
        let opener = Arc::clone(&self.opener);

        let device = match kind {
            DeviceKind::PeripheralController => {
                Device::Peripheral(PeripheralController::new(config, instance, opener))
            }
            DeviceKind::Dispatcher => Device::Dispatcher(DispatcherBoard::new(config, opener)),
        };

        let key = kind.key(instance);
        match self.devices.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => {
                warn!("Replacing device {} with {} on {}", key, kind, port);
                slot.1 = device;
            }
            None => self.devices.push((key.clone(), device)),
        }
        key
    }

    pub fn get(&self, key: &str) -> Option<&Device> {
        self.devices.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }

    /// Keys in registration order
    pub fn keys(&self) -> Vec<String> {
        self.devices.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn any_connected(&self) -> bool {
        self.connections().any(|(_, c)| c.is_connected())
    }

    /// Try to connect every device and start its read loop.
    ///
    /// Devices that fail to open are logged and reported as `false`; they
    /// never prevent the others from connecting.
    pub fn connect_all(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for (key, conn) in self.connections() {
            let ok = match conn.connect() {
                Ok(()) => conn.start_reading(),
                Err(_) => false,
            };
            results.insert(key.to_string(), ok);
        }

        let connected = results.values().filter(|ok| **ok).count();
        if connected == results.len() {
            info!("All {} devices connected", connected);
        } else {
            warn!("{} of {} devices connected", connected, results.len());
        }
        results
    }

    /// Disconnect every device, including ones that never connected
    pub fn disconnect_all(&self) {
        for (_, conn) in self.connections() {
            conn.disconnect();
        }
        info!("All devices disconnected");
    }

    /// Current status per key; never touches the ports
    pub fn get_status_summary(&self) -> BTreeMap<String, ConnectionStatus> {
        self.connections()
            .map(|(key, conn)| (key.to_string(), conn.status()))
            .collect()
    }

    /// Take all queued inbound messages from every device
    pub fn drain_inbound(&self) -> Vec<InboundMessage> {
        self.connections()
            .flat_map(|(_, conn)| conn.drain_inbound())
            .collect()
    }

    /// Send `SIGNAL:<signal_id>:<value>` to every connected peripheral
    /// controller and, when a relay target is given, ask the dispatcher to
    /// forward it there. Offline devices are skipped.
    pub fn dispatch_signal(
        &self,
        signal_id: &str,
        value: i32,
        relay_target: Option<&str>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (key, device) in &self.devices {
            if !device.connection().is_connected() {
                report.skipped.push(key.clone());
                continue;
            }

            let result = match device {
                Device::Peripheral(esp) => esp.send_signal(signal_id, value),
                Device::Dispatcher(giga) => match relay_target {
                    Some(target) => giga.forward_signal(target, signal_id, value),
                    None => continue,
                },
            };

            match result {
                Ok(()) => report.delivered.push(key.clone()),
                Err(e) => {
                    warn!("Signal {} not delivered to {}: {}", signal_id, key, e);
                    report.failed.push(key.clone());
                }
            }
        }

        report
    }

    /// Send one verbatim command line to a device
    pub fn send_raw(&self, key: &str, line: &str) -> DeviceResult<()> {
        let device = self
            .get(key)
            .ok_or_else(|| DeviceError::UnknownDevice(key.to_string()))?;
        device.connection().send_data(line)
    }

    fn connections(&self) -> impl Iterator<Item = (&str, &DeviceConnection)> {
        self.devices.iter().map(|(k, d)| (k.as_str(), d.connection()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{MockLine, MockOpener};

    struct Rig {
        registry: DeviceRegistry,
        esp1: MockLine,
        giga: MockLine,
    }

    /// Standard registry where only esp32_1 and the dispatcher are plugged in
    fn rig() -> Rig {
        let opener = Arc::new(MockOpener::new());
        let esp1 = opener.attach("/dev/ttyUSB0");
        let giga = opener.attach("/dev/ttyACM0");
        let registry = DeviceRegistry::from_config(&HardwareConfig::default(), opener);
        Rig { registry, esp1, giga }
    }

    #[test]
    fn test_from_config_registers_standard_set() {
        let rig = rig();
        assert_eq!(rig.registry.keys(), vec!["esp32_1", "esp32_2", "esp32_3", "dispatcher"]);
        assert_eq!(rig.registry.get("esp32_3").unwrap().connection().name(), "ESP32-3");
        assert_eq!(rig.registry.get("esp32_3").unwrap().connection().port(), "/dev/ttyUSB2");
        assert!(rig.registry.get("dispatcher").unwrap().as_dispatcher().is_some());
        assert!(!rig.registry.any_connected());
    }

    #[test]
    fn test_connect_all_partial_failure() {
        let opener = Arc::new(MockOpener::new());
        opener.attach("/dev/ttyUSB0");
        let mut registry = DeviceRegistry::new(opener);
        registry.add(DeviceKind::PeripheralController, "/dev/ttyUSB0", 1);
        registry.add(DeviceKind::PeripheralController, "/dev/ttyUSB1", 2);
        registry.add(DeviceKind::PeripheralController, "/dev/ttyUSB2", 3);

        let results = registry.connect_all();
        let expected: BTreeMap<String, bool> = [
            ("esp32_1".to_string(), true),
            ("esp32_2".to_string(), false),
            ("esp32_3".to_string(), false),
        ]
        .into_iter()
        .collect();
        assert_eq!(results, expected);

        let summary = registry.get_status_summary();
        assert_eq!(summary["esp32_1"], ConnectionStatus::Connected);
        assert_eq!(summary["esp32_2"], ConnectionStatus::Error);
        assert!(registry.any_connected());

        registry.disconnect_all();
        assert!(registry
            .get_status_summary()
            .values()
            .all(|s| *s == ConnectionStatus::Disconnected));
    }

    #[test]
    fn test_dispatch_skips_offline_devices() {
        let rig = rig();
        rig.registry.connect_all();

        let report = rig.registry.dispatch_signal("page_3", 1, Some("192.168.1.100"));
        assert_eq!(report.delivered, vec!["esp32_1", "dispatcher"]);
        assert_eq!(report.skipped, vec!["esp32_2", "esp32_3"]);
        assert!(report.failed.is_empty());
        assert!(!report.all_delivered());

        assert_eq!(rig.esp1.written_lines(), vec!["SIGNAL:page_3:1"]);
        assert_eq!(rig.giga.written_lines(), vec!["UDP_SEND:192.168.1.100:page_3:1"]);
    }

    #[test]
    fn test_dispatch_without_relay_leaves_dispatcher_alone() {
        let rig = rig();
        rig.registry.connect_all();

        let report = rig.registry.dispatch_signal("page_1", 1, None);
        assert_eq!(report.delivered, vec!["esp32_1"]);
        assert!(rig.giga.written_lines().is_empty());
    }

    #[test]
    fn test_dispatch_failure_does_not_abort_fan_out() {
        let opener = Arc::new(MockOpener::new());
        let first = opener.attach("/dev/ttyUSB0");
        let second = opener.attach("/dev/ttyUSB1");
        let mut registry = DeviceRegistry::new(opener);
        registry.add(DeviceKind::PeripheralController, "/dev/ttyUSB0", 1);
        registry.add(DeviceKind::PeripheralController, "/dev/ttyUSB1", 2);
        registry.connect_all();

        first.fail_writes(true);
        let report = registry.dispatch_signal("page_2", 1, None);
        assert_eq!(report.failed, vec!["esp32_1"]);
        assert_eq!(report.delivered, vec!["esp32_2"]);
        assert_eq!(second.written_lines(), vec!["SIGNAL:page_2:1"]);
    }

    #[test]
    fn test_drain_inbound_collects_all_devices() {
        let rig = rig();
        rig.registry.connect_all();

        rig.esp1.push_inbound(b"BUTTON:1\n");
        rig.giga.push_inbound(b"UDP_OK\n");

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut received = Vec::new();
        while received.len() < 2 && std::time::Instant::now() < deadline {
            received.extend(rig.registry.drain_inbound());
            std::thread::sleep(Duration::from_millis(5));
        }

        let mut sources: Vec<&str> = received.iter().map(|m| m.source.as_str()).collect();
        sources.sort();
        assert_eq!(sources, vec!["Arduino GIGA", "ESP32-1"]);
        assert!(rig.registry.drain_inbound().is_empty());
    }

    #[test]
    fn test_send_raw() {
        let rig = rig();
        assert!(matches!(
            rig.registry.send_raw("esp32_9", "PING"),
            Err(DeviceError::UnknownDevice(_))
        ));
        assert!(matches!(
            rig.registry.send_raw("esp32_1", "PING"),
            Err(DeviceError::NotConnected(_))
        ));

        rig.registry.connect_all();
        rig.registry.send_raw("esp32_1", "PING").unwrap();
        assert_eq!(rig.esp1.written_lines(), vec!["PING"]);
    }

    #[test]
    fn test_add_replaces_existing_key() {
        let opener = Arc::new(MockOpener::new());
        let mut registry = DeviceRegistry::new(opener);
        registry.add(DeviceKind::PeripheralController, "/dev/ttyUSB0", 1);
        let key = registry.add(DeviceKind::PeripheralController, "/dev/ttyUSB5", 1);

        assert_eq!(key, "esp32_1");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("esp32_1").unwrap().connection().port(), "/dev/ttyUSB5");
    }
}
