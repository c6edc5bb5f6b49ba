//! Output pin abstraction for pluggable GPIO backends

use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PinError {
    #[error("GPIO {pin} write failed: {source}")]
    Write {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("GPIO {pin} export failed: {source}")]
    Export {
        pin: u32,
        #[source]
        source: io::Error,
    },
}

/// A single write-only binary output line
pub trait OutputPin: Send {
    /// Drive the line to the given physical level (`true` = high)
    fn write(&mut self, high: bool) -> Result<(), PinError>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}

/// Simulated pin that only logs the physical level
pub struct LogPin {
    pin: u32,
}

impl LogPin {
    pub fn new(pin: u32) -> Self {
        Self { pin }
    }
}

impl OutputPin for LogPin {
    fn write(&mut self, high: bool) -> Result<(), PinError> {
        info!(
            "GPIO{} <- {}",
            self.pin,
            if high { "HIGH" } else { "LOW" }
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Linux sysfs GPIO line (`/sys/class/gpio/gpioN/value`)
pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export the line if needed and configure it as an output
    pub fn open(pin: u32) -> Result<Self, PinError> {
        Self::open_at(PathBuf::from("/sys/class/gpio"), pin)
    }

    fn open_at(root: PathBuf, pin: u32) -> Result<Self, PinError> {
        let line_dir = root.join(format!("gpio{}", pin));
        if !line_dir.exists() {
            debug!("Exporting GPIO{}", pin);
            fs::write(root.join("export"), pin.to_string())
                .map_err(|source| PinError::Export { pin, source })?;
        }
        fs::write(line_dir.join("direction"), "out")
            .map_err(|source| PinError::Export { pin, source })?;

        Ok(Self {
            pin,
            value_path: line_dir.join("value"),
        })
    }
}

impl OutputPin for SysfsPin {
    fn write(&mut self, high: bool) -> Result<(), PinError> {
        fs::write(&self.value_path, if high { "1" } else { "0" })
            .map_err(|source| PinError::Write {
                pin: self.pin,
                source,
            })
    }

    fn name(&self) -> &'static str {
        "sysfs"
    }
}
