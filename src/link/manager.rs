//! Link manager with non-blocking polling and bounded reconnection backoff

use super::traits::{LinkDriver, LinkError};
use crate::config::LinkConfig;
use led_shared::Backoff;
use std::fmt;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Association state, owned exclusively by the link manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting before association attempt `attempt + 1`
    Backoff { attempt: u32 },
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Connected => write!(f, "connected"),
            LinkState::Backoff { attempt } => write!(f, "backoff (attempt {})", attempt),
        }
    }
}

/// Identity of this device as seen on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: String,
    pub address: String,
    pub hardware_id: String,
}

/// Owns the association lifecycle beneath the session
pub struct LinkManager {
    driver: Box<dyn LinkDriver>,
    config: LinkConfig,
    state: LinkState,
    backoff: Backoff,
    retry_at: Option<Instant>,
}

impl LinkManager {
    pub fn new(driver: Box<dyn LinkDriver>, config: LinkConfig) -> Self {
        let backoff = Backoff::new(config.retry_delay, config.max_retry_delay);
        Self {
            driver,
            config,
            state: LinkState::Disconnected,
            backoff,
            retry_at: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Re-verify a connected link; Connected -> Disconnected on loss
    pub async fn check(&mut self) -> LinkState {
        if self.state == LinkState::Connected && !self.driver.is_up().await {
            warn!("Link via {} lost", self.driver.name());
            self.state = LinkState::Disconnected;
            self.retry_at = None;
        }
        self.state
    }

    /// Advance the association by at most one attempt without waiting
    ///
    /// In `Backoff` this returns immediately until the retry time is reached.
    pub async fn poll(&mut self) -> LinkState {
        match self.state {
            LinkState::Connected => return self.state,
            LinkState::Backoff { .. } => {
                if matches!(self.retry_at, Some(at) if Instant::now() < at) {
                    return self.state;
                }
            }
            LinkState::Disconnected | LinkState::Connecting => {}
        }

        self.state = LinkState::Connecting;
        info!(
            "Connecting link via {} (ssid: {})",
            self.driver.name(),
            self.config.credentials.ssid
        );

        match self.driver.associate(&self.config.credentials).await {
            Ok(()) => {
                self.state = LinkState::Connected;
                self.backoff.reset();
                self.retry_at = None;
                info!(
                    "Link connected! address: {} hardware id: {}",
                    self.local_address(),
                    self.hardware_identity()
                );
            }
            Err(e) => {
                let delay = self.backoff.next_delay();
                self.retry_at = Some(Instant::now() + delay);
                self.state = LinkState::Backoff {
                    attempt: self.backoff.attempt(),
                };
                debug!("Link association failed: {}, retrying in {:?}", e, delay);
            }
        }

        self.state
    }

    /// Block until the link is connected
    ///
    /// Without a configured `start_timeout` this retries forever and only
    /// returns on success.
    pub async fn start(&mut self) -> Result<(), LinkError> {
        let deadline = self.config.start_timeout.map(|t| Instant::now() + t);

        loop {
            if self.poll().await == LinkState::Connected {
                return Ok(());
            }

            let wake = self.retry_at.unwrap_or_else(Instant::now);
            match (deadline, self.config.start_timeout) {
                (Some(deadline), Some(timeout)) if wake >= deadline => {
                    sleep_until(deadline).await;
                    warn!("Link not connected after {:?}", timeout);
                    return Err(LinkError::Timeout(timeout));
                }
                _ => sleep_until(wake).await,
            }
        }
    }

    /// Local address, or the unspecified address when not associated
    pub fn local_address(&self) -> String {
        self.driver
            .local_address()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "0.0.0.0".into())
    }

    pub fn hardware_identity(&self) -> String {
        self.driver.hardware_identity()
    }

    /// Snapshot used for announcements and status replies
    pub fn device_info(&self, device_type: &str) -> DeviceInfo {
        DeviceInfo {
            device_type: device_type.to_string(),
            address: self.local_address(),
            hardware_id: self.hardware_identity(),
        }
    }
}
