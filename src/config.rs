//! Controller configuration parameters.
//!
//! Every tunable constant of the Green Mesh controller lives in
//! [`ControllerConfig`].  Defaults are compiled in; a validated override can
//! be persisted in the `settings` NVS namespace (see
//! [`crate::storage::settings`]).

use serde::{Deserialize, Serialize};

/// Maximum number of valve channels wired on the board.
pub const MAX_VALVES: usize = 4;

/// Maximum number of flow-sensor channels wired on the board.
pub const MAX_FLOW_SENSORS: usize = 4;

/// Local access-point settings used in setup mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointConfig {
    pub ssid: heapless::String<32>,
    pub passphrase: heapless::String<64>,
    /// AP address (also the gateway handed out by DHCP).
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    pub netmask: [u8; 4],
    pub channel: u8,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: heapless_str("Green Mesh"),
            passphrase: heapless_str("Admin@123456"),
            ip: [192, 168, 4, 1],
            gateway: [192, 168, 4, 1],
            netmask: [255, 255, 255, 0],
            channel: 1,
        }
    }
}

impl AccessPointConfig {
    /// Prefix length of [`Self::netmask`] (255.255.255.0 → 24).
    pub fn prefix_len(&self) -> u8 {
        self.netmask.iter().map(|b| b.count_ones() as u8).sum()
    }
}

/// Core controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- Backend ---
    /// Onboarding validation endpoint.
    pub onboard_url: heapless::String<128>,
    /// Periodic status update endpoint.
    pub status_url: heapless::String<128>,
    /// Hardware health report endpoint.
    pub health_url: heapless::String<128>,
    /// Flow / temperature telemetry endpoint.
    pub telemetry_url: heapless::String<128>,
    /// Reachability probe endpoint.
    pub probe_url: heapless::String<128>,
    /// Status code the probe endpoint must return.
    pub probe_expected_status: u16,
    /// Per-request timeout (milliseconds).
    pub http_timeout_ms: u32,

    // --- Broker ---
    /// Broker URL, `mqtts://host:port`.
    pub broker_url: heapless::String<128>,
    pub broker_username: heapless::String<64>,
    pub broker_password: heapless::String<64>,
    /// First topic segment: `<base>/<account>/<device>/...`.
    pub topic_base: heapless::String<32>,
    /// Wait between broker connect attempts (milliseconds).
    pub broker_backoff_ms: u32,

    // --- Wireless ---
    /// Join status poll interval (milliseconds).
    pub join_poll_interval_ms: u32,
    /// Number of polls before a join is declared failed.
    pub join_retry_count: u32,
    /// Wait before re-joining after a lost link (milliseconds).
    pub rejoin_backoff_ms: u32,
    pub access_point: AccessPointConfig,

    // --- Operational cadence ---
    /// Heartbeat publish interval (milliseconds).
    pub heartbeat_interval_ms: u32,
    /// Flow / temperature sampling window while a valve is open (milliseconds).
    pub telemetry_interval_ms: u32,
    /// Periodic status update interval (milliseconds).
    pub status_interval_ms: u32,
    /// Delay between a credential submission and the restart (milliseconds).
    pub restart_delay_ms: u32,
    /// Reset button settle window (milliseconds).
    pub reset_debounce_ms: u32,

    // --- Sensors ---
    /// Flow sensor pulses-per-litre constant.
    pub flow_calibration_factor: f32,
    /// ADC reference voltage (millivolts).
    pub adc_vref_mv: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            onboard_url: heapless_str("http://192.168.31.156:8000/api/device/onboard"),
            status_url: heapless_str("http://192.168.31.156:8000/api/device/update"),
            health_url: heapless_str("http://192.168.31.156:8000/api/device/health"),
            telemetry_url: heapless_str("http://192.168.31.156:8000/api/device/data"),
            probe_url: heapless_str("http://clients3.google.com/generate_204"),
            probe_expected_status: 204,
            http_timeout_ms: 10_000,

            broker_url: heapless_str("mqtts://broker.hivemq.com:8883"),
            broker_username: heapless::String::new(),
            broker_password: heapless::String::new(),
            topic_base: heapless_str("greenmesh"),
            broker_backoff_ms: 5_000,

            join_poll_interval_ms: 500,
            join_retry_count: 20,
            rejoin_backoff_ms: 10_000,
            access_point: AccessPointConfig::default(),

            heartbeat_interval_ms: 30_000,
            telemetry_interval_ms: 2_000,
            status_interval_ms: 300_000,
            restart_delay_ms: 3_000,
            reset_debounce_ms: 50,

            flow_calibration_factor: 7.5,
            adc_vref_mv: 3_300,
        }
    }
}

/// Build a fixed-capacity string from a literal, truncating on overflow.
pub(crate) fn heapless_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
