//! Session manager - connect/announce/subscribe, message pumping and loss detection

use super::identity::ClientIdentity;
use super::traits::{MessageHandler, SessionClient, SessionError};
use crate::config::SessionConfig;
use crate::link::DeviceInfo;
use bytes::Bytes;
use led_shared::{Backoff, Reply};
use std::collections::VecDeque;
use std::fmt;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Own publishes remembered for echo suppression
const MAX_PENDING_ECHOES: usize = 16;

/// Session state, only meaningful while the link is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    /// Waiting before connect attempt `attempt + 1`
    Backoff { attempt: u32 },
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Backoff { attempt } => write!(f, "backoff (attempt {})", attempt),
        }
    }
}

/// Owns the publish/subscribe session on the configured topic
pub struct SessionManager {
    client: Box<dyn SessionClient>,
    config: SessionConfig,
    state: SessionState,
    backoff: Backoff,
    retry_at: Option<Instant>,
    identity: Option<ClientIdentity>,
    device: Option<DeviceInfo>,
    handler: Option<Box<dyn MessageHandler>>,
    /// Payloads we published that the broker will echo back on our own topic
    pending_echoes: VecDeque<Bytes>,
}

impl SessionManager {
    pub fn new(client: Box<dyn SessionClient>, config: SessionConfig) -> Self {
        let backoff = Backoff::new(config.retry_delay, config.max_retry_delay);
        Self {
            client,
            config,
            state: SessionState::Disconnected,
            backoff,
            retry_at: None,
            identity: None,
            device: None,
            handler: None,
            pending_echoes: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identity used by the current (or last attempted) connection
    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.client.is_connected()
    }

    /// Register the delivery handler; the last registration wins
    pub fn on_message(&mut self, handler: impl MessageHandler + 'static) {
        if self.handler.replace(Box::new(handler)).is_some() {
            debug!("Replaced session message handler");
        }
    }

    /// Make at most one connect attempt without waiting
    ///
    /// Refuses to connect (and drops any session) while the link is down.
    pub async fn poll_connect(&mut self, device: &DeviceInfo, link_up: bool) -> SessionState {
        if !link_up {
            if self.state != SessionState::Disconnected {
                self.reset().await;
            }
            return self.state;
        }

        if self.is_connected() {
            return self.state;
        }
        if let SessionState::Backoff { .. } = self.state {
            if matches!(self.retry_at, Some(at) if Instant::now() < at) {
                return self.state;
            }
        }

        let identity = ClientIdentity::generate(&self.config.client_id_prefix);
        info!(
            "Session connecting to {}:{} as client {}...",
            self.config.broker_host, self.config.broker_port, identity
        );

        let result = match self.client.connect(identity.as_str()).await {
            Ok(()) => self.handshake(device).await,
            Err(e) => Err(e),
        };
        self.identity = Some(identity);

        match result {
            Ok(()) => {
                self.state = SessionState::Connected;
                self.backoff.reset();
                self.retry_at = None;
                self.device = Some(device.clone());
                info!("Session connected, subscribed to topic: {}", self.config.topic);
            }
            Err(e) => {
                self.client.disconnect().await;
                let delay = self.backoff.next_delay();
                self.retry_at = Some(Instant::now() + delay);
                self.state = SessionState::Backoff {
                    attempt: self.backoff.attempt(),
                };
                warn!("Session connection failed: {}, retrying in {:?}", e, delay);
            }
        }

        self.state
    }

    /// Announce presence, then subscribe to the command topic
    ///
    /// The announcement goes out before the subscription exists, so the broker
    /// does not echo it back to us.
    async fn handshake(&mut self, device: &DeviceInfo) -> Result<(), SessionError> {
        self.pending_echoes.clear();
        let announcement = Reply::online(&device.hardware_id).to_payload();
        self.client.publish(&self.config.topic, announcement).await?;
        self.client.subscribe(&self.config.topic).await
    }

    /// Block until connected, announced and subscribed
    pub async fn ensure_connected(&mut self, device: &DeviceInfo) {
        loop {
            if self.poll_connect(device, true).await == SessionState::Connected {
                return;
            }
            sleep_until(self.retry_at.unwrap_or_else(Instant::now)).await;
        }
    }

    /// Fire-and-forget publish on the session topic
    pub async fn publish(&mut self, payload: Bytes) {
        debug!("Publishing to {}: {:?}", self.config.topic, payload);
        match self.client.publish(&self.config.topic, payload.clone()).await {
            Ok(()) => self.remember_echo(payload),
            Err(e) => error!("Failed to publish to {}: {}", self.config.topic, e),
        }
    }

    fn remember_echo(&mut self, payload: Bytes) {
        if self.pending_echoes.len() == MAX_PENDING_ECHOES {
            self.pending_echoes.pop_front();
        }
        self.pending_echoes.push_back(payload);
    }

    /// Consume the echo of one of our own publishes, if this is one
    fn take_echo(&mut self, payload: &Bytes) -> bool {
        match self.pending_echoes.iter().position(|p| p == payload) {
            Some(pos) => {
                self.pending_echoes.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Service keep-alive and deliver pending messages to the handler
    ///
    /// Messages are handled one at a time in delivery order, and each reply is
    /// published before the next message is handled. Returns the number of
    /// messages handed to the handler. A transport failure marks the session
    /// disconnected.
    pub async fn pump(&mut self) -> usize {
        if self.state != SessionState::Connected {
            return 0;
        }

        let messages = match self.client.poll(self.config.max_deliveries_per_pump).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Session lost: {}", e);
                self.state = SessionState::Disconnected;
                self.retry_at = None;
                return 0;
            }
        };

        let mut delivered = 0;
        for message in messages {
            if self.take_echo(&message.payload) {
                debug!("Ignoring echo of own publish on {}", message.topic);
                continue;
            }

            info!(
                "Message received on topic '{}': {}",
                message.topic,
                String::from_utf8_lossy(&message.payload)
            );
            if message.was_truncated() {
                debug!(
                    "Payload truncated from {} to {} bytes",
                    message.length,
                    message.payload.len()
                );
            }

            let (Some(handler), Some(device)) = (self.handler.as_mut(), self.device.as_ref())
            else {
                warn!("No message handler registered, dropping message");
                continue;
            };
            let reply = handler.on_message(message, device);
            delivered += 1;
            self.publish(reply.to_payload()).await;
        }

        delivered
    }

    /// Drop the session (used when the link goes down)
    pub async fn reset(&mut self) {
        if self.state == SessionState::Connected {
            info!("Dropping session on {}", self.client.name());
        }
        self.client.disconnect().await;
        self.state = SessionState::Disconnected;
        self.retry_at = None;
        self.pending_echoes.clear();
    }
}
