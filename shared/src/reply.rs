//! Outbound acknowledgement and announcement payloads
//!
//! All outbound traffic is human-readable ASCII on the command topic.

use bytes::Bytes;
use std::fmt;

/// A message published by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Resulting logical LED state after a command
    Led { on: bool },
    /// Answer to a status query
    Status {
        device_type: String,
        address: String,
        hardware_id: String,
    },
    /// Rejection of an unrecognized command
    UnknownCommand { text: String },
    /// Published once per successful session connect
    Online { hardware_id: String },
}

impl Reply {
    /// Create an acknowledgement for the resulting actuator state
    pub fn led(on: bool) -> Self {
        Reply::Led { on }
    }

    /// Create an error reply echoing the rejected text
    pub fn unknown(text: impl Into<String>) -> Self {
        Reply::UnknownCommand { text: text.into() }
    }

    /// Create the online announcement
    pub fn online(hardware_id: impl Into<String>) -> Self {
        Reply::Online {
            hardware_id: hardware_id.into(),
        }
    }

    /// Render the wire payload
    pub fn to_payload(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Led { on: true } => write!(f, "LED: ON"),
            Reply::Led { on: false } => write!(f, "LED: OFF"),
            Reply::Status {
                device_type,
                address,
                hardware_id,
            } => write!(
                f,
                "Device: {}, IP: {}, MAC: {}",
                device_type, address, hardware_id
            ),
            Reply::UnknownCommand { text } => write!(f, "Error: Unknown command: {}", text),
            Reply::Online { hardware_id } => write!(f, "Device online - MAC: {}", hardware_id),
        }
    }
}
