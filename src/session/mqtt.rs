//! MQTT session client over rumqttc

use super::traits::{InboundMessage, SessionClient, SessionError};
use crate::config::SessionConfig;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Capacity of the client -> event loop request queue
const REQUEST_CAPACITY: usize = 32;

/// How long a pump waits for the event loop before treating it as idle
///
/// Expiring the window cancels rumqttc's in-progress socket write if one is
/// blocked, and the event loop would then rewrite the whole buffer. Queued
/// packets are a few hundred bytes at most and fit the socket send buffer, so
/// the write completes without suspending and the window only ever expires
/// while the loop is waiting for new input.
const POLL_WINDOW: Duration = Duration::from_millis(10);

/// Bound on the CONNECT/CONNACK handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on flushing the DISCONNECT packet when closing a session
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// A live session: request handle plus the event loop that drives the socket
struct Connection {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// MQTT 3.1.1 session with QoS 1 publishes and subscriptions
///
/// Outgoing requests are queued on `publish`/`subscribe` and written to the
/// socket the next time the event loop is polled, which is also when
/// keep-alive pings are sent.
pub struct MqttSession {
    host: String,
    port: u16,
    keep_alive: Duration,
    connection: Option<Connection>,
}

impl MqttSession {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            host: config.broker_host.clone(),
            port: config.broker_port,
            keep_alive: config.keep_alive,
            connection: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient, SessionError> {
        self.connection
            .as_ref()
            .map(|c| &c.client)
            .ok_or(SessionError::NotConnected)
    }
}

/// Drive the event loop until the broker accepts or refuses the connection
async fn await_connack(eventloop: &mut EventLoop) -> Result<(), SessionError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(SessionError::ConnectFailed(format!(
                        "broker refused: {:?}",
                        ack.code
                    )))
                };
            }
            Ok(_) => {}
            Err(e) => return Err(SessionError::ConnectFailed(e.to_string())),
        }
    }
}

/// Drive the event loop until the queued DISCONNECT has been written
///
/// Requests queued before the DISCONNECT are flushed ahead of it.
async fn flush_disconnect(eventloop: &mut EventLoop) -> Result<(), SessionError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(SessionError::Transport(e.to_string())),
        }
    }
}

#[async_trait]
impl SessionClient for MqttSession {
    async fn connect(&mut self, client_id: &str) -> Result<(), SessionError> {
        self.disconnect().await;

        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        timeout(CONNECT_TIMEOUT, await_connack(&mut eventloop))
            .await
            .map_err(|_| SessionError::ConnectFailed("timed out waiting for CONNACK".into()))??;

        self.connection = Some(Connection { client, eventloop });
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), SessionError> {
        self.client()?
            .try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        self.client()?
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn poll(&mut self, max: usize) -> Result<Vec<InboundMessage>, SessionError> {
        let connection = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        let mut delivered = Vec::new();

        let failure = loop {
            if delivered.len() >= max {
                break None;
            }
            match timeout(POLL_WINDOW, connection.eventloop.poll()).await {
                // Idle: nothing more to read or write right now
                Err(_) => break None,
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    delivered.push(InboundMessage::new(publish.topic, publish.payload));
                }
                Ok(Ok(event)) => debug!("MQTT event: {:?}", event),
                // Includes a broker DISCONNECT, which rumqttc reports as a state error
                Ok(Err(e)) => break Some(SessionError::Transport(e.to_string())),
            }
        };

        match failure {
            Some(e) => {
                self.connection = None;
                Err(e)
            }
            None => Ok(delivered),
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn disconnect(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        if let Err(e) = connection.client.try_disconnect() {
            warn!("Failed to queue DISCONNECT: {}", e);
            return;
        }
        match timeout(DISCONNECT_TIMEOUT, flush_disconnect(&mut connection.eventloop)).await {
            Ok(Ok(())) => debug!("Sent DISCONNECT"),
            Ok(Err(e)) => debug!("Session already closed: {}", e),
            Err(_) => warn!("Timed out sending DISCONNECT"),
        }
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}
