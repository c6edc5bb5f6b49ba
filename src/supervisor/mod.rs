//! Control loop tying link, session and actuator together
//!
//! This module handles:
//! - Converging the link, then the session, every cycle
//! - Regressing to re-drive whichever layer dropped
//! - Dispatching decoded commands to the actuator with one acknowledgement each

mod dispatch;
mod runner;

pub use dispatch::CommandDispatcher;
pub use runner::Supervisor;
