//! Persistence across the service boundary: what a factory reset keeps
//! and what a successful session writes back.

use greenmesh::app::ports::StoragePort;
use greenmesh::config::ControllerConfig;
use greenmesh::fsm::StateId;
use greenmesh::pins;
use greenmesh::storage::settings;

use super::mock_hw::{make_app, operational_app, step, stored_device, RecordingSink};

#[test]
fn factory_reset_keeps_controller_settings() {
    let mut sink = RecordingSink::default();
    let mut app = make_app();

    let mut tuned = ControllerConfig::default();
    tuned.telemetry_interval_ms = 5_000;
    settings::save_settings(app.store_mut().storage_mut(), &tuned).unwrap();
    app.store_mut().save(&stored_device(true)).unwrap();

    app.gpio_mut().set_level(pins::RESET_BUTTON_GPIO, false);
    app.start(&mut sink);
    step(&mut app, &mut sink, 100);

    assert_eq!(app.state(), StateId::SetupMode);
    assert!(app.store().load().is_none());
    let reloaded = settings::load_or_default(app.store().storage());
    assert_eq!(reloaded.telemetry_interval_ms, 5_000);
}

#[test]
fn detection_results_are_persisted() {
    let mut sink = RecordingSink::default();
    let app = operational_app(&mut sink);

    let stored = app.store().load_sensor_config();
    assert_eq!(stored.valve_count, 4);
    assert_eq!(stored.flow_sensor_count, 0);
    assert!(!stored.temperature_connected);
    assert!(stored.sensors_detected);
}

#[test]
fn corrupted_settings_blob_falls_back_to_defaults() {
    let mut app = make_app();
    app.store_mut()
        .storage_mut()
        .write("settings", "ctrlcfg", &[0xFF, 0x00, 0x13])
        .unwrap();
    let cfg = settings::load_or_default(app.store().storage());
    assert_eq!(cfg.telemetry_interval_ms, ControllerConfig::default().telemetry_interval_ms);
}
