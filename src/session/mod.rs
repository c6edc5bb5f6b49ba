//! Publish/subscribe session with the broker
//!
//! This module handles:
//! - Connecting with a fresh client identity on every attempt
//! - Online announcement and topic subscription after connect
//! - Pumping inbound messages to the registered handler
//! - Publishing acknowledgements and detecting session loss

mod identity;
mod manager;
mod mqtt;
mod traits;

pub use identity::ClientIdentity;
pub use manager::{SessionManager, SessionState};
pub use mqtt::MqttSession;
pub use traits::{InboundMessage, MessageHandler, SessionClient, SessionError};
