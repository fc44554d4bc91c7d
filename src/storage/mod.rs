//! Persisted configuration store.
//!
//! Durable record of the device identity, onboarding flags and the
//! last-known sensor configuration, layered over any [`StoragePort`].
//!
//! | Namespace  | Keys                                                          |
//! |------------|---------------------------------------------------------------|
//! | `identity` | ssid, passphrase (obfuscated), account_id, device_id, onboarded, first_boot |
//! | `sensors`  | valve_count, flow_count, temperature, temp_ok, detected       |
//! | `settings` | ctrlcfg (see [`settings`]): never touched by `clear_all`     |

pub mod obfuscation;
pub mod settings;

use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::error::StorageError;
use crate::sensors::SensorConfig;

pub const IDENTITY_NAMESPACE: &str = "identity";
pub const SENSORS_NAMESPACE: &str = "sensors";

mod keys {
    pub const SSID: &str = "ssid";
    pub const PASSPHRASE: &str = "passphrase";
    pub const ACCOUNT_ID: &str = "account_id";
    pub const DEVICE_ID: &str = "device_id";
    pub const ONBOARDED: &str = "onboarded";
    pub const FIRST_BOOT: &str = "first_boot";

    pub const VALVE_COUNT: &str = "valve_count";
    pub const FLOW_COUNT: &str = "flow_count";
    pub const TEMPERATURE: &str = "temperature";
    pub const TEMP_OK: &str = "temp_ok";
    pub const DETECTED: &str = "detected";
}

// ───────────────────────────────────────────────────────────────
// DeviceConfig
// ───────────────────────────────────────────────────────────────

/// Identity, credentials and onboarding state of this controller.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub ssid: heapless::String<32>,
    pub passphrase: heapless::String<64>,
    pub account_id: heapless::String<64>,
    pub device_id: heapless::String<64>,
    pub is_onboarded: bool,
    pub is_first_boot: bool,
    pub sensors: SensorConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ssid: heapless::String::new(),
            passphrase: heapless::String::new(),
            account_id: heapless::String::new(),
            device_id: heapless::String::new(),
            is_onboarded: false,
            is_first_boot: true,
            sensors: SensorConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// A config is usable only when all four identity strings are present.
    pub fn is_valid(&self) -> bool {
        !self.ssid.is_empty()
            && !self.passphrase.is_empty()
            && !self.account_id.is_empty()
            && !self.device_id.is_empty()
    }

    /// Whether the backend must (re)confirm this identity before operation.
    pub fn needs_validation(&self) -> bool {
        !self.is_onboarded || self.is_first_boot
    }
}

// ───────────────────────────────────────────────────────────────
// ConfigStore
// ───────────────────────────────────────────────────────────────

pub struct ConfigStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> ConfigStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Load the stored identity.  `None` unless all four identity strings
    /// are present and non-empty.
    pub fn load(&self) -> Option<DeviceConfig> {
        let ssid = self.read_string::<32>(keys::SSID)?;
        let hidden = self.read_string::<128>(keys::PASSPHRASE)?;
        let account_id = self.read_string::<64>(keys::ACCOUNT_ID)?;
        let device_id = self.read_string::<64>(keys::DEVICE_ID)?;

        let Some(passphrase) = obfuscation::reveal(&hidden) else {
            warn!("ConfigStore: stored passphrase unreadable, treating config as absent");
            return None;
        };

        let config = DeviceConfig {
            ssid,
            passphrase,
            account_id,
            device_id,
            is_onboarded: self.read_bool(IDENTITY_NAMESPACE, keys::ONBOARDED).unwrap_or(false),
            is_first_boot: self.read_bool(IDENTITY_NAMESPACE, keys::FIRST_BOOT).unwrap_or(true),
            sensors: self.load_sensor_config(),
        };

        if !config.is_valid() {
            return None;
        }
        info!(
            "ConfigStore: loaded device '{}' (onboarded={}, first_boot={})",
            config.device_id, config.is_onboarded, config.is_first_boot
        );
        Some(config)
    }

    /// Persist every field.  The first failing write aborts the save.
    pub fn save(&mut self, config: &DeviceConfig) -> Result<(), StorageError> {
        let hidden = obfuscation::obfuscate(&config.passphrase);
        let ns = IDENTITY_NAMESPACE;
        self.storage.write(ns, keys::SSID, config.ssid.as_bytes())?;
        self.storage.write(ns, keys::PASSPHRASE, hidden.as_bytes())?;
        self.storage.write(ns, keys::ACCOUNT_ID, config.account_id.as_bytes())?;
        self.storage.write(ns, keys::DEVICE_ID, config.device_id.as_bytes())?;
        self.storage.write(ns, keys::ONBOARDED, &[u8::from(config.is_onboarded)])?;
        self.storage.write(ns, keys::FIRST_BOOT, &[u8::from(config.is_first_boot)])?;
        self.save_sensor_config(&config.sensors)?;
        info!(
            "ConfigStore: saved device '{}' on '{}' (passphrase {} bytes)",
            config.device_id,
            config.ssid,
            config.passphrase.len()
        );
        Ok(())
    }

    /// Erase both namespaces.  Both erases are attempted even if the first
    /// fails; the first error is returned.
    pub fn clear_all(&mut self) -> Result<(), StorageError> {
        let identity = self.storage.erase_namespace(IDENTITY_NAMESPACE);
        let sensors = self.storage.erase_namespace(SENSORS_NAMESPACE);
        match (identity, sensors) {
            (Ok(()), Ok(())) => {
                info!("ConfigStore: all configuration cleared");
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("ConfigStore: clear failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn save_sensor_config(&mut self, sensors: &SensorConfig) -> Result<(), StorageError> {
        let ns = SENSORS_NAMESPACE;
        self.storage.write(ns, keys::VALVE_COUNT, &[sensors.valve_count])?;
        self.storage.write(ns, keys::FLOW_COUNT, &[sensors.flow_sensor_count])?;
        self.storage.write(ns, keys::TEMPERATURE, &sensors.temperature_c.to_le_bytes())?;
        self.storage.write(ns, keys::TEMP_OK, &[u8::from(sensors.temperature_connected)])?;
        self.storage.write(ns, keys::DETECTED, &[u8::from(sensors.sensors_detected)])?;
        Ok(())
    }

    /// Last persisted sensor configuration, or the empty default.
    pub fn load_sensor_config(&self) -> SensorConfig {
        let ns = SENSORS_NAMESPACE;
        let mut temp = [0u8; 4];
        let temperature_c = match self.storage.read(ns, keys::TEMPERATURE, &mut temp) {
            Ok(4) => f32::from_le_bytes(temp),
            _ => 0.0,
        };
        SensorConfig {
            valve_count: self.read_u8(ns, keys::VALVE_COUNT).unwrap_or(0),
            flow_sensor_count: self.read_u8(ns, keys::FLOW_COUNT).unwrap_or(0),
            temperature_c,
            temperature_connected: self.read_bool(ns, keys::TEMP_OK).unwrap_or(false),
            sensors_detected: self.read_bool(ns, keys::DETECTED).unwrap_or(false),
        }
    }

    /// Record a successful onboarding: sets `onboarded`, clears `first_boot`.
    pub fn mark_onboarded(&mut self) -> Result<(), StorageError> {
        self.storage.write(IDENTITY_NAMESPACE, keys::ONBOARDED, &[1])?;
        self.storage.write(IDENTITY_NAMESPACE, keys::FIRST_BOOT, &[0])?;
        info!("ConfigStore: device marked as onboarded");
        Ok(())
    }

    // ── Internal ──────────────────────────────────────────────

    fn read_string<const N: usize>(&self, key: &str) -> Option<heapless::String<N>> {
        let mut buf = [0u8; 160];
        let len = self.storage.read(IDENTITY_NAMESPACE, key, &mut buf).ok()?;
        let text = core::str::from_utf8(&buf[..len]).ok()?;
        if text.is_empty() {
            return None;
        }
        let mut out = heapless::String::new();
        out.push_str(text).ok()?;
        Some(out)
    }

    fn read_u8(&self, namespace: &str, key: &str) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.storage.read(namespace, key, &mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn read_bool(&self, namespace: &str, key: &str) -> Option<bool> {
        self.read_u8(namespace, key).map(|b| b != 0)
    }
}
