//! Show hardware: serial controllers and the registry that drives them

pub mod connection;
pub mod devices;
pub mod port;
pub mod protocol;
pub mod registry;

#[cfg(test)]
pub mod mock;

pub use connection::{ConnectionStatus, DeviceConnection, InboundMessage};
pub use devices::{Device, DeviceKind, DispatcherBoard, PeripheralController};
pub use port::{PortConfig, PortInfo, PortOpener, PortType, SerialTransport, SystemPortOpener};
pub use protocol::{slide_signal_id, Command};
pub use registry::{DeviceRegistry, DispatchReport};
