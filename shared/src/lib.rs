//! led-node Shared Protocol Types
//!
//! This crate provides the wire protocol (command decoding and reply
//! formatting), the supervisor state machine and the retry backoff shared by
//! the device binary and its tests.

pub mod backoff;
pub mod command;
pub mod reply;
pub mod state_machine;

pub use backoff::Backoff;
pub use command::{decode, Command};
pub use reply::Reply;
pub use state_machine::{SupervisorEvent, SupervisorState, SupervisorStateMachine, TransitionResult};

/// Wire protocol limits
pub mod limits {
    /// Maximum accepted inbound payload length; longer payloads are truncated
    pub const MAX_MSG_LEN: usize = 128;

    /// Upper bound of the random client identity suffix (exclusive)
    pub const CLIENT_ID_SUFFIX_MAX: u32 = 0xffff;

    /// Default prefix of the per-attempt client identity
    pub const DEFAULT_CLIENT_ID_PREFIX: &str = "ESP8266-";
}

/// Timing parameters for the control loop and reconnection
pub mod timing {
    /// Fixed end-of-cycle sleep of the supervisor loop
    pub const CYCLE_INTERVAL_MS: u64 = 500;

    /// Delay between link association attempts
    pub const LINK_RETRY_MS: u64 = 250;

    /// Delay between session connect attempts
    pub const SESSION_RETRY_MS: u64 = 2500;

    /// Ceiling for exponential reconnect backoff
    pub const MAX_RETRY_MS: u64 = 30_000;

    /// Session keep-alive interval announced to the broker
    pub const KEEP_ALIVE_SECS: u64 = 15;
}
