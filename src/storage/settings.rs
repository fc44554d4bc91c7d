//! Persisted [`ControllerConfig`] override.
//!
//! A factory or field technician may store a tuned configuration as a
//! postcard blob; it is validated on every load and save, and anything
//! missing or invalid falls back to the compiled-in defaults.

use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::config::ControllerConfig;
use crate::error::{Error, StorageError};

pub const SETTINGS_NAMESPACE: &str = "settings";
const SETTINGS_KEY: &str = "ctrlcfg";

const MAX_BLOB_SIZE: usize = 1024;

/// Range-check every field the firmware relies on.
pub fn validate_config(cfg: &ControllerConfig) -> Result<(), Error> {
    let urls = [
        &cfg.onboard_url,
        &cfg.status_url,
        &cfg.health_url,
        &cfg.telemetry_url,
        &cfg.probe_url,
    ];
    if urls.iter().any(|u| !u.starts_with("http://") && !u.starts_with("https://")) {
        return Err(Error::Config("backend URLs must be http:// or https://"));
    }
    if !cfg.broker_url.starts_with("mqtt://") && !cfg.broker_url.starts_with("mqtts://") {
        return Err(Error::Config("broker_url must be mqtt:// or mqtts://"));
    }
    if cfg.topic_base.is_empty() || cfg.topic_base.contains(['/', '+', '#']) {
        return Err(Error::Config("topic_base must be a single non-wildcard segment"));
    }
    if !(100..=599).contains(&cfg.probe_expected_status) {
        return Err(Error::Config("probe_expected_status must be an HTTP status"));
    }
    if !(1..=100).contains(&cfg.join_retry_count) {
        return Err(Error::Config("join_retry_count must be 1–100"));
    }
    let intervals = [
        cfg.http_timeout_ms,
        cfg.broker_backoff_ms,
        cfg.join_poll_interval_ms,
        cfg.rejoin_backoff_ms,
        cfg.heartbeat_interval_ms,
        cfg.telemetry_interval_ms,
        cfg.status_interval_ms,
    ];
    if intervals.contains(&0) {
        return Err(Error::Config("intervals and timeouts must be non-zero"));
    }
    if cfg.flow_calibration_factor.is_nan() || cfg.flow_calibration_factor <= 0.0 {
        return Err(Error::Config("flow_calibration_factor must be > 0"));
    }
    if !(1000..=3600).contains(&cfg.adc_vref_mv) {
        return Err(Error::Config("adc_vref_mv must be 1000–3600"));
    }
    Ok(())
}

/// Load the stored override, falling back to defaults.
pub fn load_or_default(storage: &impl StoragePort) -> ControllerConfig {
    let mut buf = [0u8; MAX_BLOB_SIZE];
    let len = match storage.read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf) {
        Ok(len) => len,
        Err(StorageError::NotFound) => {
            info!("Settings: none stored, using defaults");
            return ControllerConfig::default();
        }
        Err(e) => {
            warn!("Settings: read failed ({}), using defaults", e);
            return ControllerConfig::default();
        }
    };

    match postcard::from_bytes::<ControllerConfig>(&buf[..len]) {
        Ok(cfg) => match validate_config(&cfg) {
            Ok(()) => {
                info!("Settings: loaded stored configuration ({} bytes)", len);
                cfg
            }
            Err(e) => {
                warn!("Settings: stored configuration rejected ({}), using defaults", e);
                ControllerConfig::default()
            }
        },
        Err(_) => {
            warn!("Settings: stored configuration corrupted, using defaults");
            ControllerConfig::default()
        }
    }
}

/// Like [`load_or_default`], but stores the defaults when no blob exists
/// yet.  A present but unreadable blob is left alone.
pub fn load_or_seed(storage: &mut impl StoragePort) -> ControllerConfig {
    if storage.exists(SETTINGS_NAMESPACE, SETTINGS_KEY) {
        return load_or_default(storage);
    }
    let cfg = ControllerConfig::default();
    if let Err(e) = save_settings(storage, &cfg) {
        warn!("Settings: defaults not stored: {}", e);
    }
    cfg
}

/// Validate and persist an override.
pub fn save_settings(storage: &mut impl StoragePort, cfg: &ControllerConfig) -> Result<(), Error> {
    validate_config(cfg)?;
    let bytes = postcard::to_allocvec(cfg).map_err(|_| StorageError::Corrupted)?;
    if bytes.len() > MAX_BLOB_SIZE {
        return Err(StorageError::Full.into());
    }
    storage.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &bytes)?;
    info!("Settings: configuration saved ({} bytes)", bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;
    use crate::config::heapless_str;

    #[test]
    fn default_config_passes_validation() {
        assert!(validate_config(&ControllerConfig::default()).is_ok());
    }

    #[test]
    fn rejects_zero_calibration() {
        let cfg = ControllerConfig {
            flow_calibration_factor: 0.0,
            ..Default::default()
        };
        assert!(matches!(validate_config(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_wildcard_topic_base() {
        let cfg = ControllerConfig {
            topic_base: heapless_str("farm/#"),
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_zero_heartbeat() {
        let cfg = ControllerConfig {
            heartbeat_interval_ms: 0,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn missing_settings_yield_defaults() {
        let nvs = NvsAdapter::default();
        assert_eq!(load_or_default(&nvs), ControllerConfig::default());
    }

    #[test]
    fn stored_settings_are_used() {
        let mut nvs = NvsAdapter::default();
        let cfg = ControllerConfig {
            heartbeat_interval_ms: 10_000,
            join_retry_count: 40,
            ..Default::default()
        };
        save_settings(&mut nvs, &cfg).unwrap();
        assert_eq!(load_or_default(&nvs), cfg);
    }

    #[test]
    fn corrupted_blob_falls_back() {
        let mut nvs = NvsAdapter::default();
        nvs.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &[0xff; 8]).unwrap();
        assert_eq!(load_or_default(&nvs), ControllerConfig::default());
    }

    #[test]
    fn first_boot_seeds_the_defaults() {
        let mut nvs = NvsAdapter::default();
        assert_eq!(load_or_seed(&mut nvs), ControllerConfig::default());
        assert!(nvs.exists(SETTINGS_NAMESPACE, SETTINGS_KEY));
        assert_eq!(load_or_default(&nvs), ControllerConfig::default());
    }

    #[test]
    fn seeding_keeps_an_existing_override() {
        let mut nvs = NvsAdapter::default();
        let cfg = ControllerConfig {
            status_interval_ms: 60_000,
            ..Default::default()
        };
        save_settings(&mut nvs, &cfg).unwrap();
        assert_eq!(load_or_seed(&mut nvs), cfg);
    }

    #[test]
    fn seeding_leaves_a_corrupted_blob_in_place() {
        let mut nvs = NvsAdapter::default();
        nvs.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &[0xff; 8]).unwrap();
        assert_eq!(load_or_seed(&mut nvs), ControllerConfig::default());
        let mut buf = [0u8; 16];
        assert_eq!(nvs.read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf), Ok(8));
    }

    #[test]
    fn invalid_config_is_not_saved() {
        let mut nvs = NvsAdapter::default();
        let cfg = ControllerConfig {
            adc_vref_mv: 5_000,
            ..Default::default()
        };
        assert!(save_settings(&mut nvs, &cfg).is_err());
        assert!(!nvs.exists(SETTINGS_NAMESPACE, SETTINGS_KEY));
    }
}
