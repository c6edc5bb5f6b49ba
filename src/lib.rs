//! led-node
//!
//! Keeps a link and an MQTT session alive and turns single-word commands on
//! one topic into LED state changes, acknowledging each on the same topic.

pub mod actuator;
pub mod config;
pub mod link;
pub mod session;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;
