//! Boot → setup → connecting → validating → operational, end to end
//! against the host simulations.

use greenmesh::adapters::portal;
use greenmesh::app::events::AppEvent;
use greenmesh::config::ControllerConfig;
use greenmesh::events;
use greenmesh::fsm::StateId;
use greenmesh::pins;

use super::mock_hw::{
    make_app, make_configured_app, operational_app, run_until, step, stored_device,
    RecordingSink,
};

#[test]
fn empty_store_boots_into_setup_with_access_point() {
    let mut sink = RecordingSink::default();
    let mut app = make_app();
    app.start(&mut sink);
    assert_eq!(app.state(), StateId::Boot);

    step(&mut app, &mut sink, 100);
    assert_eq!(app.state(), StateId::SetupMode);
    assert_eq!(
        app.wifi_mut().sim_access_point().map(|ap| ap.ssid.as_str()),
        Some("Green Mesh")
    );
    assert!(sink.events.contains(&AppEvent::StateChanged {
        from: StateId::Boot,
        to: StateId::SetupMode,
    }));
}

#[test]
fn portal_submission_is_stored_then_restarts() {
    let mut sink = RecordingSink::default();
    let mut app = make_app();
    app.start(&mut sink);
    step(&mut app, &mut sink, 100);
    assert_eq!(app.state(), StateId::SetupMode);

    // The only test in this binary that uses the command queue.
    events::drain_commands(|_| {});
    let queued = portal::submit_form(
        b"ssid=orchard&password=password1&customer_uid=cust-7&device_number=GM-0042",
    )
    .unwrap();
    assert!(queued);
    events::drain_commands(|cmd| app.handle_command(cmd, &mut sink));

    assert!(sink.events.contains(&AppEvent::CredentialsSaved));
    let stored = app.store().load().expect("credentials persisted");
    assert_eq!(stored.ssid.as_str(), "orchard");
    assert_eq!(stored.device_id.as_str(), "GM-0042");
    assert!(!stored.is_onboarded);

    let delay = u64::from(ControllerConfig::default().restart_delay_ms);
    step(&mut app, &mut sink, delay - 1_000);
    assert_eq!(app.system().sim_restarts(), 0);
    step(&mut app, &mut sink, 1_000);
    assert_eq!(app.system().sim_restarts(), 1);

    // Only one restart per submission.
    step(&mut app, &mut sink, delay);
    assert_eq!(app.system().sim_restarts(), 1);
}

#[test]
fn short_passphrase_is_not_saved() {
    let mut sink = RecordingSink::default();
    let mut app = make_app();
    app.start(&mut sink);
    step(&mut app, &mut sink, 100);

    let creds =
        portal::parse_form(b"ssid=orchard&password=short&customer_uid=c&device_number=d").unwrap();
    app.handle_command(
        greenmesh::app::commands::AppCommand::SubmitCredentials(creds),
        &mut sink,
    );
    assert!(app.store().load().is_none());
    assert!(!sink.events.contains(&AppEvent::CredentialsSaved));
}

#[test]
fn first_connection_is_validated_and_onboarded() {
    let mut sink = RecordingSink::default();
    let mut app = make_configured_app(&stored_device(false), &mut sink);
    let onboard_url = ControllerConfig::default().onboard_url;
    app.http_mut().sim_respond(&onboard_url, Ok(200));

    run_until(&mut app, &mut sink, StateId::Operational, 100);

    assert!(sink.events.contains(&AppEvent::StateChanged {
        from: StateId::Connecting,
        to: StateId::Validating,
    }));
    let stored = app.store().load().unwrap();
    assert!(stored.is_onboarded);
    assert!(!stored.is_first_boot);

    let body: serde_json::Value =
        serde_json::from_slice(app.http().sim_bodies_for(&onboard_url)[0]).unwrap();
    assert_eq!(body["uid"], "cust-7");
    assert_eq!(body["device_number"], "GM-0042");
    assert_eq!(body["ssid"], "orchard");
}

#[test]
fn rejected_validation_never_marks_onboarded() {
    let mut sink = RecordingSink::default();
    let mut app = make_configured_app(&stored_device(false), &mut sink);
    let onboard_url = ControllerConfig::default().onboard_url;
    app.http_mut().sim_respond(&onboard_url, Ok(403));

    run_until(&mut app, &mut sink, StateId::Validating, 100);
    run_until(&mut app, &mut sink, StateId::SetupMode, 100);

    assert!(!app.store().load().unwrap().is_onboarded);
}

#[test]
fn onboarded_device_skips_validation() {
    let mut sink = RecordingSink::default();
    let mut app = make_configured_app(&stored_device(true), &mut sink);
    run_until(&mut app, &mut sink, StateId::Operational, 100);

    let onboard_url = ControllerConfig::default().onboard_url;
    assert!(app.http().sim_bodies_for(&onboard_url).is_empty());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SensorsDetected(c) if c.valve_count == 4)),
        1
    );
}

#[test]
fn failed_join_falls_back_to_setup() {
    let mut sink = RecordingSink::default();
    let mut app = make_configured_app(&stored_device(true), &mut sink);
    app.wifi_mut().sim_join_after(None);

    run_until(&mut app, &mut sink, StateId::Connecting, 100);
    run_until(&mut app, &mut sink, StateId::SetupMode, 500);
    assert!(app.wifi_mut().sim_access_point().is_some());
}

#[test]
fn unreachable_internet_falls_back_to_setup() {
    let mut sink = RecordingSink::default();
    let mut app = make_configured_app(&stored_device(true), &mut sink);
    let probe = ControllerConfig::default().probe_url;
    app.http_mut().sim_respond(&probe, Ok(200));

    run_until(&mut app, &mut sink, StateId::Connecting, 100);
    run_until(&mut app, &mut sink, StateId::SetupMode, 100);
}

#[test]
fn reset_held_at_boot_wipes_store() {
    let mut sink = RecordingSink::default();
    let mut app = make_app();
    app.store_mut().save(&stored_device(true)).unwrap();
    app.gpio_mut().set_level(pins::RESET_BUTTON_GPIO, false);
    app.start(&mut sink);

    step(&mut app, &mut sink, 100);
    assert_eq!(app.state(), StateId::SetupMode);
    assert!(app.store().load().is_none());
    assert!(sink.events.contains(&AppEvent::FactoryReset));
}

#[test]
fn reset_press_while_operational_wipes_and_restarts() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    assert!(app.store().load().is_some());

    app.gpio_mut().set_level(pins::RESET_BUTTON_GPIO, false);
    step(&mut app, &mut sink, 10);
    step(&mut app, &mut sink, 100);

    assert!(app.store().load().is_none());
    assert_eq!(app.system().sim_restarts(), 1);
    assert!(sink.events.contains(&AppEvent::FactoryReset));
}

#[test]
fn lost_link_is_rejoined_after_backoff() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    assert_eq!(app.wifi_mut().sim_joins().len(), 1);

    app.wifi_mut().sim_drop_link();
    step(&mut app, &mut sink, 100);
    assert!(sink.events.contains(&AppEvent::LinkLost));
    assert_eq!(app.state(), StateId::Operational);

    let backoff = u64::from(ControllerConfig::default().rejoin_backoff_ms);
    step(&mut app, &mut sink, backoff - 1_000);
    assert_eq!(app.wifi_mut().sim_joins().len(), 1);
    step(&mut app, &mut sink, 1_000);
    assert_eq!(app.wifi_mut().sim_joins().len(), 2);
}

#[test]
fn status_snapshot_reflects_link() {
    let mut sink = RecordingSink::default();
    let app = operational_app(&mut sink);
    let snapshot = app.status_snapshot();
    assert_eq!(snapshot.device_number.as_str(), "GM-0042");
    assert_eq!(snapshot.customer_uid.as_str(), "cust-7");
    assert!(snapshot.onboarded);
    assert_eq!(
        snapshot.ip_address.as_ref().map(|s| s.as_str()),
        Some("192.168.31.77")
    );
    assert_eq!(snapshot.wifi_rssi, Some(-58));
}
