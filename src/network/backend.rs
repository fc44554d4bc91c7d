//! Remote validation and telemetry client.
//!
//! Four JSON POST endpoints on the backend.  Every call is a single
//! attempt bounded by the configured timeout; callers decide what a
//! failure means (validation failure sends the device back to setup,
//! telemetry failures are simply superseded by the next report).

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::HttpPort;
use crate::config::{ControllerConfig, MAX_FLOW_SENSORS, MAX_VALVES};
use crate::error::TransportError;
use crate::sensors::{HardwareStatus, SensorConfig};

// ───────────────────────────────────────────────────────────────
// Request bodies
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct OnboardRequest<'a> {
    pub uid: &'a str,
    pub device_number: &'a str,
    pub ssid: &'a str,
    pub wifi_password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdate<'a> {
    pub uid: &'a str,
    pub device_number: &'a str,
    pub valve_connected: u8,
    pub valve_active: u8,
    pub flow_sensor_connected: u8,
    pub flow_sensor_active: u8,
    pub temp_sensor_connected: bool,
    /// `null` when no temperature sensor is connected.
    pub temp_sensor: Option<f32>,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthReport<'a> {
    pub device_number: &'a str,
    pub valves: [bool; MAX_VALVES],
    pub flow_sensors: [bool; MAX_FLOW_SENSORS],
    pub temperature_sensor: bool,
}

#[derive(Debug, Serialize)]
pub struct TelemetryReport<'a> {
    pub device_number: &'a str,
    pub flow_rates: &'a [f32],
    pub temperature: Option<f32>,
}

/// Live counters that accompany a status update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveCounts {
    pub valves: u8,
    pub flows: u8,
}

// ───────────────────────────────────────────────────────────────
// BackendClient
// ───────────────────────────────────────────────────────────────

pub struct BackendClient {
    onboard_url: heapless::String<128>,
    status_url: heapless::String<128>,
    health_url: heapless::String<128>,
    telemetry_url: heapless::String<128>,
    timeout_ms: u32,
}

impl BackendClient {
    pub fn new(cfg: &ControllerConfig) -> Self {
        Self {
            onboard_url: cfg.onboard_url.clone(),
            status_url: cfg.status_url.clone(),
            health_url: cfg.health_url.clone(),
            telemetry_url: cfg.telemetry_url.clone(),
            timeout_ms: cfg.http_timeout_ms,
        }
    }

    /// Ask the backend to accept this device for `account_id`.  Success is
    /// exactly HTTP 200.
    pub fn validate(
        &self,
        http: &mut impl HttpPort,
        account_id: &str,
        device_id: &str,
        ssid: &str,
        passphrase: &str,
    ) -> bool {
        let body = OnboardRequest {
            uid: account_id,
            device_number: device_id,
            ssid,
            wifi_password: passphrase,
        };
        info!("Backend: validating device '{}' for account '{}'", device_id, account_id);
        self.post_expecting_ok(http, &self.onboard_url, &body, "validation")
    }

    pub fn report_status(
        &self,
        http: &mut impl HttpPort,
        account_id: &str,
        device_id: &str,
        sensors: &SensorConfig,
        active: ActiveCounts,
        timestamp: u64,
    ) -> bool {
        let body = StatusUpdate {
            uid: account_id,
            device_number: device_id,
            valve_connected: sensors.valve_count,
            valve_active: active.valves,
            flow_sensor_connected: sensors.flow_sensor_count,
            flow_sensor_active: active.flows,
            temp_sensor_connected: sensors.temperature_connected,
            temp_sensor: sensors.temperature_connected.then_some(sensors.temperature_c),
            timestamp,
        };
        self.post_expecting_ok(http, &self.status_url, &body, "status update")
    }

    /// Fire-and-forget.
    pub fn report_hardware_health(
        &self,
        http: &mut impl HttpPort,
        device_id: &str,
        status: &HardwareStatus,
    ) {
        let body = HealthReport {
            device_number: device_id,
            valves: status.valves,
            flow_sensors: status.flow_sensors,
            temperature_sensor: status.temperature,
        };
        match self.post(http, &self.health_url, &body) {
            Ok(code) => info!("Backend: hardware health sent ({})", code),
            Err(e) => warn!("Backend: hardware health not sent: {}", e),
        }
    }

    /// Fire-and-forget.
    pub fn send_telemetry(
        &self,
        http: &mut impl HttpPort,
        device_id: &str,
        flow_rates: &[f32],
        temperature: Option<f32>,
    ) {
        let body = TelemetryReport {
            device_number: device_id,
            flow_rates,
            temperature,
        };
        match self.post(http, &self.telemetry_url, &body) {
            Ok(_) => log::debug!("Backend: telemetry sent ({} channel(s))", flow_rates.len()),
            Err(e) => warn!("Backend: telemetry not sent: {}", e),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn post<T: Serialize>(
        &self,
        http: &mut impl HttpPort,
        url: &str,
        body: &T,
    ) -> Result<u16, TransportError> {
        let bytes = serde_json::to_vec(body).map_err(|_| TransportError::Encode)?;
        http.post_json(url, &bytes, self.timeout_ms)
    }

    fn post_expecting_ok<T: Serialize>(
        &self,
        http: &mut impl HttpPort,
        url: &str,
        body: &T,
        what: &str,
    ) -> bool {
        match self.post(http, url, body) {
            Ok(200) => {
                info!("Backend: {} accepted", what);
                true
            }
            Ok(code) => {
                warn!("Backend: {} rejected ({})", what, code);
                false
            }
            Err(e) => {
                warn!("Backend: {} failed: {}", what, e);
                false
            }
        }
    }
}
