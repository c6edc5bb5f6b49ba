//! Command dispatcher - decodes deliveries and drives the actuator

use crate::actuator::ActuatorDriver;
use crate::link::DeviceInfo;
use crate::session::{InboundMessage, MessageHandler};
use led_shared::{decode, Command, Reply};
use tracing::{info, warn};

/// Maps each decoded command to at most one actuator call and exactly one reply
///
/// The reply reflects the resulting logical state, not the requested one.
pub struct CommandDispatcher {
    actuator: ActuatorDriver,
}

impl CommandDispatcher {
    pub fn new(actuator: ActuatorDriver) -> Self {
        Self { actuator }
    }

    /// Execute a command and return the acknowledgement to publish
    pub fn dispatch(&mut self, command: Command, device: &DeviceInfo) -> Reply {
        match command {
            Command::TurnOn => {
                self.actuator.set(true);
                Reply::led(self.actuator.get())
            }
            Command::TurnOff => {
                self.actuator.set(false);
                Reply::led(self.actuator.get())
            }
            Command::Toggle => Reply::led(self.actuator.toggle()),
            Command::QueryStatus => Reply::Status {
                device_type: device.device_type.clone(),
                address: device.address.clone(),
                hardware_id: device.hardware_id.clone(),
            },
            Command::Unknown(text) => {
                warn!("Unknown command: {}", text);
                Reply::unknown(text)
            }
        }
    }
}

impl MessageHandler for CommandDispatcher {
    fn on_message(&mut self, message: InboundMessage, device: &DeviceInfo) -> Reply {
        let command = decode(&message.payload);
        let reply = self.dispatch(command, device);
        info!("Replying: {}", reply);
        reply
    }
}
