//! Session client trait abstraction for pluggable broker transports

use crate::link::DeviceInfo;
use async_trait::async_trait;
use bytes::Bytes;
use led_shared::{command, Reply};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session not connected")]
    NotConnected,
}

/// A message delivered on the subscribed topic
///
/// The payload is an owned per-delivery buffer already cut to the accepted
/// length; `length` is the size the broker delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub length: usize,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let mut payload: Bytes = payload.into();
        let length = payload.len();
        let accepted = command::truncate(&payload).len();
        payload.truncate(accepted);
        Self {
            topic: topic.into(),
            payload,
            length,
        }
    }

    /// Whether the delivered payload exceeded the accepted length
    pub fn was_truncated(&self) -> bool {
        self.length > self.payload.len()
    }
}

/// Receives inbound messages from the [`SessionManager`](super::SessionManager)
///
/// The returned reply is published on the session topic.
pub trait MessageHandler: Send {
    fn on_message(&mut self, message: InboundMessage, device: &DeviceInfo) -> Reply;
}

impl<F> MessageHandler for F
where
    F: FnMut(InboundMessage, &DeviceInfo) -> Reply + Send,
{
    fn on_message(&mut self, message: InboundMessage, device: &DeviceInfo) -> Reply {
        self(message, device)
    }
}

/// Broker session capability consumed by the session manager
#[async_trait]
pub trait SessionClient: Send {
    /// Open a new session under the given client identity
    async fn connect(&mut self, client_id: &str) -> Result<(), SessionError>;

    /// Queue a publish (fire-and-forget)
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), SessionError>;

    /// Queue a subscription
    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError>;

    /// Service keep-alive, flush queued requests and return at most `max`
    /// messages delivered since the last call, in delivery order
    async fn poll(&mut self, max: usize) -> Result<Vec<InboundMessage>, SessionError>;

    /// Whether the transport believes the session is alive
    fn is_connected(&self) -> bool;

    /// Drop the session
    async fn disconnect(&mut self);

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
