//! Actuator driver - logical LED state over a polarity-normalized pin

use super::pin::OutputPin;
use tracing::{error, info};

/// Physical level that lights the LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// High = on
    ActiveHigh,
    /// Low = on (onboard LEDs wired to VCC)
    #[default]
    ActiveLow,
}

impl Polarity {
    /// Translate a logical state into the line level
    pub fn level(self, on: bool) -> bool {
        match self {
            Polarity::ActiveHigh => on,
            Polarity::ActiveLow => !on,
        }
    }
}

/// Owns the logical actuator state and performs the physical write
///
/// Logical state is authoritative: it is never read back from hardware, and a
/// failed write is logged without rolling the state back. Every `set` or
/// `toggle` performs exactly one write, even when the state does not change.
pub struct ActuatorDriver {
    pin: Box<dyn OutputPin>,
    polarity: Polarity,
    state: bool,
}

impl ActuatorDriver {
    /// Create a driver and drive the line to the logical Off level
    pub fn new(pin: Box<dyn OutputPin>, polarity: Polarity) -> Self {
        let mut driver = Self {
            pin,
            polarity,
            state: false,
        };
        driver.apply();
        driver
    }

    /// Set the logical state
    pub fn set(&mut self, on: bool) {
        self.state = on;
        self.apply();
        info!("LED turned {}", if on { "ON" } else { "OFF" });
    }

    /// Get the logical state
    pub fn get(&self) -> bool {
        self.state
    }

    /// Flip the logical state, apply it and return the new state
    pub fn toggle(&mut self) -> bool {
        self.set(!self.state);
        self.state
    }

    fn apply(&mut self) {
        let level = self.polarity.level(self.state);
        if let Err(e) = self.pin.write(level) {
            error!("Actuator write via {} failed: {}", self.pin.name(), e);
        }
    }
}
