//! Node configuration.
//!
//! Configuration is loaded once at startup from environment variables
//! prefixed with `LED_NODE_` and is immutable afterwards. The Wi-Fi password
//! is redacted in Debug output.

use led_shared::{limits, timing};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Prefix shared by every configuration variable
pub const ENV_PREFIX: &str = "LED_NODE_";

/// Default broker host (free public broker)
pub const DEFAULT_BROKER_HOST: &str = "broker.hivemq.com";

/// Default broker port
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Default command/acknowledgement topic
pub const DEFAULT_TOPIC: &str = "esp8266/led";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Topic must not be empty")]
    EmptyTopic,
}

/// Network credentials for the link layer
#[derive(Clone)]
pub struct LinkCredentials {
    pub ssid: String,
    pub password: String,
}

impl fmt::Debug for LinkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Link layer configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub credentials: LinkCredentials,
    /// Network interface whose hardware address identifies the device
    pub interface: String,
    /// Overrides the interface hardware address when set
    pub hardware_id: Option<String>,
    /// Delay after the first failed association attempt
    pub retry_delay: Duration,
    /// Ceiling of the association backoff
    pub max_retry_delay: Duration,
    /// Bound for the blocking `start` barrier; `None` waits forever
    pub start_timeout: Option<Duration>,
}

/// Broker session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub broker_host: String,
    pub broker_port: u16,
    /// Single topic for commands and acknowledgements
    pub topic: String,
    pub client_id_prefix: String,
    pub keep_alive: Duration,
    /// Delay after the first failed connect attempt
    pub retry_delay: Duration,
    /// Ceiling of the connect backoff
    pub max_retry_delay: Duration,
    /// Deliveries handled per pump before yielding to the next cycle
    pub max_deliveries_per_pump: usize,
}

/// Which output backend drives the LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioBackend {
    /// Log the physical level only (host simulation)
    Log,
    /// Linux sysfs GPIO
    Sysfs,
}

impl FromStr for GpioBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(GpioBackend::Log),
            "sysfs" => Ok(GpioBackend::Sysfs),
            _ => Err(()),
        }
    }
}

/// Actuator configuration
#[derive(Debug, Clone)]
pub struct ActuatorConfig {
    pub pin: u32,
    /// Onboard LEDs are commonly lit by driving the line low
    pub active_low: bool,
    pub backend: GpioBackend,
}

/// Full node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Device type reported in status replies
    pub device_type: String,
    pub link: LinkConfig,
    pub session: SessionConfig,
    pub actuator: ActuatorConfig,
    /// End-of-cycle sleep of the supervisor loop
    pub cycle_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_type: "ESP8266".into(),
            link: LinkConfig {
                credentials: LinkCredentials {
                    ssid: "YOUR_WIFI_SSID".into(),
                    password: "YOUR_WIFI_PASSWORD".into(),
                },
                interface: "eth0".into(),
                hardware_id: None,
                retry_delay: Duration::from_millis(timing::LINK_RETRY_MS),
                max_retry_delay: Duration::from_millis(timing::MAX_RETRY_MS),
                start_timeout: None,
            },
            session: SessionConfig {
                broker_host: DEFAULT_BROKER_HOST.into(),
                broker_port: DEFAULT_BROKER_PORT,
                topic: DEFAULT_TOPIC.into(),
                client_id_prefix: limits::DEFAULT_CLIENT_ID_PREFIX.into(),
                keep_alive: Duration::from_secs(timing::KEEP_ALIVE_SECS),
                retry_delay: Duration::from_millis(timing::SESSION_RETRY_MS),
                max_retry_delay: Duration::from_millis(timing::MAX_RETRY_MS),
                max_deliveries_per_pump: 16,
            },
            actuator: ActuatorConfig {
                pin: 2,
                active_low: true,
                backend: GpioBackend::Log,
            },
            cycle_interval: Duration::from_millis(timing::CYCLE_INTERVAL_MS),
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(&format!("{}{}", ENV_PREFIX, key));
        let mut config = Self::default();

        if let Some(ssid) = get("WIFI_SSID") {
            config.link.credentials.ssid = ssid.clone();
        }
        if let Some(password) = get("WIFI_PASSWORD") {
            config.link.credentials.password = password.clone();
        }
        if let Some(interface) = get("INTERFACE") {
            config.link.interface = interface.clone();
        }
        config.link.hardware_id = get("HARDWARE_ID").cloned();
        if let Some(ms) = parse_var::<u64>(vars, "LINK_RETRY_MS")? {
            config.link.retry_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(vars, "START_TIMEOUT_SECS")? {
            config.link.start_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(host) = get("BROKER_HOST") {
            config.session.broker_host = host.clone();
        }
        if let Some(port) = parse_var::<u16>(vars, "BROKER_PORT")? {
            config.session.broker_port = port;
        }
        if let Some(topic) = get("TOPIC") {
            if topic.is_empty() {
                return Err(ConfigError::EmptyTopic);
            }
            config.session.topic = topic.clone();
        }
        if let Some(prefix) = get("CLIENT_ID_PREFIX") {
            config.session.client_id_prefix = prefix.clone();
        }
        if let Some(secs) = parse_var::<u64>(vars, "KEEP_ALIVE_SECS")? {
            config.session.keep_alive = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(vars, "SESSION_RETRY_MS")? {
            config.session.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(vars, "MAX_RETRY_MS")? {
            config.link.max_retry_delay = Duration::from_millis(ms);
            config.session.max_retry_delay = Duration::from_millis(ms);
        }

        if let Some(device_type) = get("DEVICE_TYPE") {
            config.device_type = device_type.clone();
        }
        if let Some(pin) = parse_var::<u32>(vars, "LED_PIN")? {
            config.actuator.pin = pin;
        }
        if let Some(active_low) = parse_var::<bool>(vars, "LED_ACTIVE_LOW")? {
            config.actuator.active_low = active_low;
        }
        if let Some(backend) = parse_var::<GpioBackend>(vars, "GPIO_BACKEND")? {
            config.actuator.backend = backend;
        }
        if let Some(ms) = parse_var::<u64>(vars, "CYCLE_INTERVAL_MS")? {
            config.cycle_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

/// Parse an optional prefixed variable
fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let full_key = format!("{}{}", ENV_PREFIX, key);
    match vars.get(&full_key) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: full_key,
                value: value.clone(),
            }),
    }
}
