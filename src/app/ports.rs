//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (GPIO, NVS, radio, HTTP, MQTT, clock) implement these
//! traits.  The [`AppService`](super::service::AppService) consumes them via
//! the [`Platform`] bundle, so the domain core never touches hardware
//! directly and every path is testable with mocks.
//!
//! ## Contract notes
//!
//! - **StoragePort** writes MUST be atomic per key (ESP-IDF NVS commits are).
//! - **HttpPort** returns the status code of any completed exchange; only a
//!   transport failure is an `Err`.  Interpreting the code is the caller's job.
//! - **MqttPort** never blocks: `connect` makes one attempt, `poll_inbound`
//!   returns what has already arrived.

use crate::config::AccessPointConfig;
use crate::error::{ConnectivityError, GpioError, StorageError, TransportError};

// ───────────────────────────────────────────────────────────────
// GPIO port (driven adapter: domain ↔ pins / ADC)
// ───────────────────────────────────────────────────────────────

pub trait GpioPort {
    /// Configure `pin` as a push-pull output.
    fn configure_output(&mut self, pin: i32) -> Result<(), GpioError>;

    /// Configure `pin` as a digital input, optionally with the internal pull-up.
    fn configure_input(&mut self, pin: i32, pull_up: bool) -> Result<(), GpioError>;

    /// Drive `pin` to `high` (true) or low (false).
    fn write(&mut self, pin: i32, high: bool) -> Result<(), GpioError>;

    /// Sample the current logic level of `pin`.
    fn read(&mut self, pin: i32) -> bool;

    /// One raw ADC conversion on `pin` (0 – 4095).
    fn read_analog(&mut self, pin: i32) -> Result<u16, GpioError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Block the calling task for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Wall-clock seconds since the Unix epoch, if the clock has been synced.
    fn unix_time_secs(&self) -> Option<u64>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage, namespaced per subsystem.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;

    /// Remove every key in `namespace`.
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Wireless port
// ───────────────────────────────────────────────────────────────

pub trait WifiPort {
    /// Start a client-mode join.  Returns once the request is issued; the
    /// outcome is observed by polling [`is_link_up`](Self::is_link_up).
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), ConnectivityError>;

    /// Whether the station link is currently associated with an IP.
    fn is_link_up(&mut self) -> bool;

    /// Drop the station link.
    fn disconnect(&mut self);

    /// Host the local setup access point.
    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError>;

    /// Signal strength of the current link in dBm.
    fn rssi(&self) -> Option<i8>;

    /// Station IPv4 address, once assigned.
    fn ip_address(&self) -> Option<[u8; 4]> {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// HTTP client port
// ───────────────────────────────────────────────────────────────

pub trait HttpPort {
    /// POST `body` as `application/json`.  Returns the response status.
    fn post_json(&mut self, url: &str, body: &[u8], timeout_ms: u32) -> Result<u16, TransportError>;

    /// GET `url`, discarding the body.  Returns the response status.
    fn get(&mut self, url: &str, timeout_ms: u32) -> Result<u16, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Publish / subscribe port
// ───────────────────────────────────────────────────────────────

/// Parameters for one broker connect attempt.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions<'a> {
    pub url: &'a str,
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<128>,
    pub payload: heapless::Vec<u8, 256>,
}

pub trait MqttPort {
    /// Make one connect attempt.  Must not retry internally.
    fn connect(&mut self, options: &SessionOptions<'_>) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Number of sessions established so far.  Bumped on every
    /// (re)connect, including ones the client performs on its own, so a
    /// changed value means subscriptions must be renewed.
    fn session_id(&self) -> u32;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError>;

    /// Next message already received, if any.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;
}

// ───────────────────────────────────────────────────────────────
// System port
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Reboot the device.  On hardware this does not return.
    fn restart(&mut self);

    /// Free heap in bytes.
    fn free_heap(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / indicator)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Names the concrete adapter for every port so [`AppService`] needs a
/// single type parameter.
///
/// [`AppService`]: super::service::AppService
pub trait Platform {
    type Gpio: GpioPort;
    type Clock: ClockPort;
    type Storage: StoragePort;
    type Wifi: WifiPort;
    type Http: HttpPort;
    type Mqtt: MqttPort;
    type System: SystemPort;
}

/// The adapter instances handed to [`AppService::new`](super::service::AppService::new).
pub struct PortSet<P: Platform> {
    pub gpio: P::Gpio,
    pub clock: P::Clock,
    pub storage: P::Storage,
    pub wifi: P::Wifi,
    pub http: P::Http,
    pub mqtt: P::Mqtt,
    pub system: P::System,
}
