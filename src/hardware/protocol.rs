//! Line protocol spoken by the booth controllers
//!
//! Every command is one ASCII line; the connection appends the terminator.
//!
//! | Command | Receiver |
//! |---------|----------|
//! | `SIGNAL:<signal_id>:<value>` | peripheral controllers |
//! | `UDP_ENABLE` / `UDP_DISABLE` | dispatcher board |
//! | `UDP_SEND:<target_ip>:<signal_id>:<value>` | dispatcher board |

use crate::content::SlideId;
use std::fmt;

/// Default value carried by slide signals
pub const SIGNAL_ON: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Signal { signal_id: String, value: i32 },
    UdpEnable,
    UdpDisable,
    UdpSend { target_ip: String, signal_id: String, value: i32 },
    /// Operator-typed line, sent verbatim
    Raw(String),
}

impl Command {
    pub fn signal(signal_id: &str, value: i32) -> Self {
        Self::Signal {
            signal_id: signal_id.to_string(),
            value,
        }
    }

    pub fn udp_send(target_ip: &str, signal_id: &str, value: i32) -> Self {
        Self::UdpSend {
            target_ip: target_ip.to_string(),
            signal_id: signal_id.to_string(),
            value,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Signal { signal_id, value } => write!(f, "SIGNAL:{}:{}", signal_id, value),
            Command::UdpEnable => write!(f, "UDP_ENABLE"),
            Command::UdpDisable => write!(f, "UDP_DISABLE"),
            Command::UdpSend {
                target_ip,
                signal_id,
                value,
            } => write!(f, "UDP_SEND:{}:{}:{}", target_ip, signal_id, value),
            Command::Raw(line) => write!(f, "{}", line),
        }
    }
}

/// Signal id announcing that `slide` is now shown
pub fn slide_signal_id(slide: SlideId) -> String {
    format!("page_{}", slide)
}
