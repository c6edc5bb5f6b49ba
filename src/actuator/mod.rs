//! Binary actuator (the LED)
//!
//! This module handles:
//! - Logical On/Off state, the single source of truth
//! - Polarity translation to the physical line level
//! - Pin backends (simulated and Linux sysfs GPIO)

mod driver;
mod pin;

pub use driver::{ActuatorDriver, Polarity};
pub use pin::{LogPin, OutputPin, PinError, SysfsPin};
