//! Link layer management beneath the broker session
//!
//! This module handles:
//! - Association lifecycle (Disconnected -> Connecting -> Connected)
//! - Bounded exponential backoff between failed attempts
//! - Loss detection from the supervisor's per-cycle check
//! - The device's local address and stable hardware identity

mod host;
mod manager;
mod traits;

pub use host::HostLink;
pub use manager::{DeviceInfo, LinkManager, LinkState};
pub use traits::{LinkDriver, LinkError};
