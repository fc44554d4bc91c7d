//! Remote control channel.
//!
//! Keeps one publish/subscribe session to the broker per operational
//! period: subscribes to the device's control topic, hands validated
//! valve commands back to the caller and publishes a retained `online`
//! heartbeat.
//!
//! Reconnects never block.  While the session is down, [`ControlChannel::service`]
//! makes at most one connect attempt per backoff interval and returns
//! immediately otherwise.  Subscriptions are tied to the port's session
//! counter: any session the channel has not subscribed on yet, including
//! one the client re-established by itself, is subscribed on the next call.

pub mod message;

use log::{info, warn};

use crate::app::ports::{MqttPort, SessionOptions};
use crate::config::ControllerConfig;
use message::{ControlMessage, Topics};

const HEARTBEAT_PAYLOAD: &[u8] = b"online";

/// What [`ControlChannel::service`] observed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not started, or waiting out the backoff.
    Down,
    /// Subscribed on a new session during this call.
    CameUp,
    Up,
}

pub struct ControlChannel {
    broker_url: heapless::String<128>,
    username: heapless::String<64>,
    password: heapless::String<64>,
    topic_base: heapless::String<32>,
    backoff_ms: u64,
    client_id: heapless::String<64>,
    topics: Option<Topics>,
    last_attempt_ms: Option<u64>,
    /// Session the control topic is subscribed on.
    subscribed_session: Option<u32>,
    subscribe_failed_ms: Option<u64>,
}

impl ControlChannel {
    pub fn new(cfg: &ControllerConfig) -> Self {
        Self {
            broker_url: cfg.broker_url.clone(),
            username: cfg.broker_username.clone(),
            password: cfg.broker_password.clone(),
            topic_base: cfg.topic_base.clone(),
            backoff_ms: u64::from(cfg.broker_backoff_ms),
            client_id: heapless::String::new(),
            topics: None,
            last_attempt_ms: None,
            subscribed_session: None,
            subscribe_failed_ms: None,
        }
    }

    /// Bind the channel to a device identity.  Returns `false` if the
    /// identifiers do not fit a topic.
    pub fn start(&mut self, account_id: &str, device_id: &str) -> bool {
        let Some(topics) = Topics::new(&self.topic_base, account_id, device_id) else {
            warn!("Control: identifiers too long for a topic, channel disabled");
            return false;
        };
        self.client_id.clear();
        if self.client_id.push_str(device_id).is_err() {
            warn!("Control: device id too long for a client id");
            return false;
        }
        info!("Control: control topic '{}'", topics.control);
        self.topics = Some(topics);
        self.last_attempt_ms = None;
        self.subscribed_session = None;
        self.subscribe_failed_ms = None;
        true
    }

    pub fn stop(&mut self) {
        self.topics = None;
        self.subscribed_session = None;
        self.subscribe_failed_ms = None;
    }

    pub fn is_started(&self) -> bool {
        self.topics.is_some()
    }

    pub fn topics(&self) -> Option<&Topics> {
        self.topics.as_ref()
    }

    /// Keep the session alive.  Call once per loop tick.
    pub fn service(&mut self, mqtt: &mut impl MqttPort, now_ms: u64) -> SessionStatus {
        if self.topics.is_none() {
            return SessionStatus::Down;
        }

        if !mqtt.is_connected() {
            self.subscribed_session = None;
            if !Self::elapsed(self.last_attempt_ms, now_ms, self.backoff_ms) {
                return SessionStatus::Down;
            }
            self.last_attempt_ms = Some(now_ms);

            let options = SessionOptions {
                url: &self.broker_url,
                client_id: &self.client_id,
                username: (!self.username.is_empty()).then_some(self.username.as_str()),
                password: (!self.password.is_empty()).then_some(self.password.as_str()),
            };
            if let Err(e) = mqtt.connect(&options) {
                warn!("Control: broker connect failed ({}), retry in {} ms", e, self.backoff_ms);
                return SessionStatus::Down;
            }
            if !mqtt.is_connected() {
                // The client reports the session asynchronously.
                return SessionStatus::Down;
            }
        }

        let session = mqtt.session_id();
        if self.subscribed_session == Some(session) {
            return SessionStatus::Up;
        }
        self.subscribe(mqtt, session, now_ms)
    }

    fn subscribe(&mut self, mqtt: &mut impl MqttPort, session: u32, now_ms: u64) -> SessionStatus {
        if !Self::elapsed(self.subscribe_failed_ms, now_ms, self.backoff_ms) {
            return SessionStatus::Down;
        }
        let Some(topics) = &self.topics else {
            return SessionStatus::Down;
        };
        if let Err(e) = mqtt.subscribe(&topics.control) {
            warn!("Control: subscribe failed ({}), retry in {} ms", e, self.backoff_ms);
            self.subscribe_failed_ms = Some(now_ms);
            return SessionStatus::Down;
        }
        self.subscribe_failed_ms = None;
        self.subscribed_session = Some(session);
        info!("Control: session {} up as '{}'", session, self.client_id);
        SessionStatus::CameUp
    }

    fn elapsed(since: Option<u64>, now_ms: u64, period_ms: u64) -> bool {
        since.is_none_or(|t| now_ms.saturating_sub(t) >= period_ms)
    }

    /// Next valid command waiting on the control topic.  Messages on other
    /// topics are skipped; invalid ones are dropped with a warning.
    pub fn next_command(&mut self, mqtt: &mut impl MqttPort) -> Option<ControlMessage> {
        let topics = self.topics.as_ref()?;
        while let Some(msg) = mqtt.poll_inbound() {
            if msg.topic != topics.control {
                continue;
            }
            match ControlMessage::parse(&msg.payload) {
                Ok(cmd) => return Some(cmd),
                Err(e) => warn!("Control: dropped message: {}", e),
            }
        }
        None
    }

    /// Publish the retained heartbeat.  Returns whether it was sent.
    pub fn publish_heartbeat(&mut self, mqtt: &mut impl MqttPort) -> bool {
        let Some(topics) = &self.topics else {
            return false;
        };
        if !mqtt.is_connected() {
            return false;
        }
        match mqtt.publish(&topics.heartbeat, HEARTBEAT_PAYLOAD, true) {
            Ok(()) => {
                log::debug!("Control: heartbeat published");
                true
            }
            Err(e) => {
                warn!("Control: heartbeat failed: {}", e);
                false
            }
        }
    }
}
