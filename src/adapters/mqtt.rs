//! Publish/subscribe adapter.
//!
//! Implements [`MqttPort`].
//!
//! On ESP-IDF the client is an `EspMqttClient` whose connection events are
//! pumped on a dedicated thread.  That thread never touches domain state:
//! it flips `SESSION_UP`, counts sessions in `SESSIONS` and pushes
//! received messages into the bounded
//! [`INBOUND`] channel, which [`MqttPort::poll_inbound`] drains from the
//! control loop.
//!
//! ```text
//! ┌───────────────┐ InboundMessage ┌──────────────┐
//! │ MQTT event    │───────────────▶│  Main Loop   │
//! │ thread        │   (bounded)    │ poll_inbound │
//! └───────────────┘                └──────────────┘
//! ```
//!
//! The host build is an in-memory broker for tests.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::ports::{InboundMessage, MqttPort, SessionOptions};
use crate::error::TransportError;

const INBOUND_QUEUE_CAP: usize = 8;

/// Messages received by the event thread, oldest first.  A full queue
/// drops new messages.
pub static INBOUND: Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_QUEUE_CAP> =
    Channel::new();

#[cfg(target_os = "espidf")]
static SESSION_UP: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

/// Bumped on every `Connected` event, including automatic reconnects.
#[cfg(target_os = "espidf")]
static SESSIONS: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

/// Copy a received message into the inbound queue.  Oversized topics or
/// payloads are dropped.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn enqueue(topic: &str, payload: &[u8]) -> bool {
    let mut t = heapless::String::new();
    if t.push_str(topic).is_err() {
        log::warn!("MQTT: topic too long, message dropped");
        return false;
    }
    let Ok(p) = heapless::Vec::from_slice(payload) else {
        log::warn!("MQTT: payload of {} bytes too large, message dropped", payload.len());
        return false;
    };
    if INBOUND.try_send(InboundMessage { topic: t, payload: p }).is_err() {
        log::warn!("MQTT: inbound queue full, message dropped");
        return false;
    }
    true
}

pub struct MqttAdapter {
    #[cfg(target_os = "espidf")]
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,

    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    pub fn new() -> Self {
        Self { client: None }
    }
}

#[cfg(target_os = "espidf")]
fn pump_events(mut connection: esp_idf_svc::mqtt::client::EspMqttConnection) {
    use core::sync::atomic::Ordering;
    use esp_idf_svc::mqtt::client::EventPayload;

    while let Ok(event) = connection.next() {
        match event.payload() {
            EventPayload::Connected(_) => {
                let n = SESSIONS.fetch_add(1, Ordering::AcqRel) + 1;
                log::info!("MQTT(espidf): session {} connected", n);
                SESSION_UP.store(true, Ordering::Release);
            }
            EventPayload::Disconnected => {
                log::warn!("MQTT(espidf): session disconnected");
                SESSION_UP.store(false, Ordering::Release);
            }
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => {
                enqueue(topic, data);
            }
            EventPayload::Error(e) => log::warn!("MQTT(espidf): {:?}", e),
            _ => {}
        }
    }
    SESSION_UP.store(false, Ordering::Release);
    log::info!("MQTT(espidf): event thread exiting");
}

#[cfg(target_os = "espidf")]
impl MqttPort for MqttAdapter {
    /// Creates the client on first use.  The ESP-IDF client then keeps
    /// the session alive itself; later calls only report success.
    fn connect(&mut self, options: &SessionOptions<'_>) -> Result<(), TransportError> {
        use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration};

        if self.client.is_some() {
            return Ok(());
        }
        let conf = MqttClientConfiguration {
            client_id: Some(options.client_id),
            username: options.username,
            password: options.password,
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let (client, connection) =
            EspMqttClient::new(options.url, &conf).map_err(|_| TransportError::Unreachable)?;
        std::thread::Builder::new()
            .name("mqtt-events".into())
            .stack_size(6 * 1024)
            .spawn(move || pump_events(connection))
            .map_err(|_| TransportError::Io)?;
        self.client = Some(client);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        SESSION_UP.load(core::sync::atomic::Ordering::Acquire)
    }

    fn session_id(&self) -> u32 {
        SESSIONS.load(core::sync::atomic::Ordering::Acquire)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        use esp_idf_svc::mqtt::client::QoS;
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .map(|_| ())
            .map_err(|_| TransportError::Io)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        use esp_idf_svc::mqtt::client::QoS;
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .map(|_| ())
            .map_err(|_| TransportError::Io)
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        INBOUND.try_receive().ok()
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimBroker {
    reachable: bool,
    connected: bool,
    sessions: u32,
    connect_attempts: u32,
    client_id: String,
    subscriptions: Vec<String>,
    published: Vec<(String, Vec<u8>, bool)>,
    inbox: std::collections::VecDeque<InboundMessage>,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// An in-memory broker that accepts connections.
    pub fn new() -> Self {
        Self {
            sim: SimBroker {
                reachable: true,
                ..Default::default()
            },
        }
    }

    pub fn sim_set_reachable(&mut self, reachable: bool) {
        self.sim.reachable = reachable;
    }

    /// Drop the current session.  Subscriptions are lost with it.
    pub fn sim_drop_session(&mut self) {
        self.sim.connected = false;
        self.sim.subscriptions.clear();
    }

    /// The session drops and the client re-establishes it before the
    /// control loop looks again.  Subscriptions are lost with the old one.
    pub fn sim_reconnect_silently(&mut self) {
        self.sim.subscriptions.clear();
        self.sim.sessions += 1;
        self.sim.connected = true;
    }

    /// Deliver a message as the broker would.  Only subscribed topics
    /// reach the client.
    pub fn sim_deliver(&mut self, topic: &str, payload: &[u8]) {
        if !self.sim.subscriptions.iter().any(|s| s == topic) {
            return;
        }
        let (Ok(t), Ok(p)) = (
            heapless::String::try_from(topic),
            heapless::Vec::from_slice(payload),
        ) else {
            return;
        };
        self.sim.inbox.push_back(InboundMessage { topic: t, payload: p });
    }

    pub fn sim_connect_attempts(&self) -> u32 {
        self.sim.connect_attempts
    }

    pub fn sim_client_id(&self) -> &str {
        &self.sim.client_id
    }

    pub fn sim_subscriptions(&self) -> &[String] {
        &self.sim.subscriptions
    }

    /// `(topic, payload, retain)` for every publish, in order.
    pub fn sim_published(&self) -> &[(String, Vec<u8>, bool)] {
        &self.sim.published
    }
}

#[cfg(not(target_os = "espidf"))]
impl MqttPort for MqttAdapter {
    fn connect(&mut self, options: &SessionOptions<'_>) -> Result<(), TransportError> {
        self.sim.connect_attempts += 1;
        if !self.sim.reachable {
            return Err(TransportError::Unreachable);
        }
        self.sim.client_id = options.client_id.to_string();
        if !self.sim.connected {
            self.sim.connected = true;
            self.sim.sessions += 1;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.sim.connected
    }

    fn session_id(&self) -> u32 {
        self.sim.sessions
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.sim.connected {
            return Err(TransportError::NotConnected);
        }
        if !self.sim.subscriptions.iter().any(|s| s == topic) {
            self.sim.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        if !self.sim.connected {
            return Err(TransportError::NotConnected);
        }
        self.sim
            .published
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.sim.inbox.pop_front()
    }
}
