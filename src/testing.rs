//! In-memory link, broker and pin fakes shared by unit tests

use crate::actuator::{OutputPin, PinError};
use crate::config::{LinkConfig, LinkCredentials, SessionConfig};
use crate::link::{DeviceInfo, LinkDriver, LinkError};
use crate::session::{InboundMessage, SessionClient, SessionError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOPIC: &str = "esp8266/led";

pub fn link_config() -> LinkConfig {
    LinkConfig {
        credentials: LinkCredentials {
            ssid: "lab".into(),
            password: "secret".into(),
        },
        interface: "eth0".into(),
        hardware_id: None,
        retry_delay: Duration::from_millis(250),
        max_retry_delay: Duration::from_secs(1),
        start_timeout: None,
    }
}

/// Flat 2.5 s retry, like the unhardened firmware
pub fn session_config() -> SessionConfig {
    SessionConfig {
        broker_host: "127.0.0.1".into(),
        broker_port: 1883,
        topic: TOPIC.into(),
        client_id_prefix: "ESP8266-".into(),
        keep_alive: Duration::from_secs(15),
        retry_delay: Duration::from_millis(2500),
        max_retry_delay: Duration::from_millis(2500),
        max_deliveries_per_pump: 16,
    }
}

pub fn device_info() -> DeviceInfo {
    DeviceInfo {
        device_type: "ESP8266".into(),
        address: "192.168.4.2".into(),
        hardware_id: "AA:BB:CC:DD:EE:FF".into(),
    }
}

// ----------------------------------------------------------------------------
// Pin
// ----------------------------------------------------------------------------

#[derive(Default)]
struct PinLog {
    levels: Vec<bool>,
    attempts: usize,
    failing: bool,
}

/// Records every physical level written
#[derive(Clone, Default)]
pub struct RecordingPin {
    log: Arc<Mutex<PinLog>>,
}

impl RecordingPin {
    /// A pin whose every write fails
    pub fn failing() -> Self {
        let pin = Self::default();
        pin.log.lock().unwrap().failing = true;
        pin
    }

    pub fn levels(&self) -> Vec<bool> {
        self.log.lock().unwrap().levels.clone()
    }

    pub fn attempts(&self) -> usize {
        self.log.lock().unwrap().attempts
    }

    pub fn clear(&self) {
        let mut log = self.log.lock().unwrap();
        log.levels.clear();
        log.attempts = 0;
    }
}

impl OutputPin for RecordingPin {
    fn write(&mut self, high: bool) -> Result<(), PinError> {
        let mut log = self.log.lock().unwrap();
        log.attempts += 1;
        if log.failing {
            return Err(PinError::Write {
                pin: 0,
                source: io::Error::new(io::ErrorKind::Other, "scripted failure"),
            });
        }
        log.levels.push(high);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// ----------------------------------------------------------------------------
// Link
// ----------------------------------------------------------------------------

#[derive(Default)]
struct LinkScript {
    up: bool,
    fail_next: u32,
    attempts: u32,
}

/// Link driver whose association outcomes are scripted
#[derive(Clone, Default)]
pub struct ScriptedLink {
    script: Arc<Mutex<LinkScript>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` association attempts
    pub fn fail_next(&self, n: u32) {
        self.script.lock().unwrap().fail_next = n;
    }

    /// Simulate loss of the association
    pub fn drop_link(&self) {
        self.script.lock().unwrap().up = false;
    }

    pub fn attempts(&self) -> u32 {
        self.script.lock().unwrap().attempts
    }
}

#[async_trait]
impl LinkDriver for ScriptedLink {
    async fn associate(&mut self, _credentials: &LinkCredentials) -> Result<(), LinkError> {
        let mut script = self.script.lock().unwrap();
        script.attempts += 1;
        if script.fail_next > 0 {
            script.fail_next -= 1;
            return Err(LinkError::AssociationFailed("scripted failure".into()));
        }
        script.up = true;
        Ok(())
    }

    async fn is_up(&mut self) -> bool {
        self.script.lock().unwrap().up
    }

    fn local_address(&self) -> Option<IpAddr> {
        Some(IpAddr::from([192, 168, 4, 2]))
    }

    fn hardware_identity(&self) -> String {
        "AA:BB:CC:DD:EE:FF".into()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// ----------------------------------------------------------------------------
// Broker
// ----------------------------------------------------------------------------

#[derive(Default)]
struct BrokerState {
    connected: bool,
    subscribed: bool,
    echo: bool,
    refuse_next: u32,
    client_ids: Vec<String>,
    published: Vec<String>,
    subscriptions: Vec<String>,
    operations: Vec<&'static str>,
    inbound: VecDeque<InboundMessage>,
}

/// In-memory broker observing everything the session does
#[derive(Clone, Default)]
pub struct FakeBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route our own publishes back to us once subscribed, like a real broker
    pub fn with_echo(self) -> Self {
        self.state.lock().unwrap().echo = true;
        self
    }

    pub fn client(&self) -> FakeSessionClient {
        FakeSessionClient {
            state: self.state.clone(),
        }
    }

    /// Refuse the next `n` connect attempts
    pub fn refuse_next(&self, n: u32) {
        self.state.lock().unwrap().refuse_next = n;
    }

    /// Queue an inbound message on the command topic
    pub fn deliver(&self, payload: &'static str) {
        self.state
            .lock()
            .unwrap()
            .inbound
            .push_back(InboundMessage::new(TOPIC, payload.as_bytes()));
    }

    /// Drop the session from the broker side
    pub fn kill_session(&self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.subscribed = false;
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().client_ids.clone()
    }

    pub fn published(&self) -> Vec<String> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn clear_published(&self) {
        self.state.lock().unwrap().published.clear();
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().operations.clone()
    }
}

pub struct FakeSessionClient {
    state: Arc<Mutex<BrokerState>>,
}

#[async_trait]
impl SessionClient for FakeSessionClient {
    async fn connect(&mut self, client_id: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        state.operations.push("connect");
        state.client_ids.push(client_id.to_string());
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(SessionError::ConnectFailed("scripted refusal".into()));
        }
        state.connected = true;
        state.subscribed = false;
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(SessionError::NotConnected);
        }
        state.operations.push("publish");
        state
            .published
            .push(String::from_utf8_lossy(&payload).into_owned());
        if state.echo && state.subscribed {
            state.inbound.push_back(InboundMessage::new(topic, payload));
        }
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(SessionError::NotConnected);
        }
        state.operations.push("subscribe");
        state.subscriptions.push(topic.to_string());
        state.subscribed = true;
        Ok(())
    }

    async fn poll(&mut self, max: usize) -> Result<Vec<InboundMessage>, SessionError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(SessionError::Transport("connection reset".into()));
        }
        let count = state.inbound.len().min(max);
        Ok(state.inbound.drain(..count).collect())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn disconnect(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.subscribed = false;
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
