//! Remote valve control, heartbeat and telemetry while operational.

use greenmesh::app::events::AppEvent;
use greenmesh::config::ControllerConfig;
use greenmesh::fsm::StateId;
use greenmesh::pins;

use super::mock_hw::{
    configure_and_start, make_app, make_board_app, make_configured_app, operational_app,
    run_until, step, stored_device, RecordingSink, CONTROL_TOPIC,
};

fn deliver(app: &mut super::mock_hw::TestApp, payload: &str) {
    app.mqtt_mut().sim_deliver(CONTROL_TOPIC, payload.as_bytes());
}

#[test]
fn session_subscribes_to_device_control_topic() {
    let mut sink = RecordingSink::default();
    let app = operational_app(&mut sink);
    assert_eq!(app.mqtt().sim_subscriptions(), [CONTROL_TOPIC.to_string()]);
    assert_eq!(app.mqtt().sim_client_id(), "GM-0042");
    assert_eq!(sink.count(|e| *e == AppEvent::ControlSessionUp), 1);
}

#[test]
fn valve_on_drives_its_channel_low_exactly_once() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    app.gpio_mut().clear();

    deliver(&mut app, r#"{"valve_number":2,"action":"on"}"#);
    step(&mut app, &mut sink, 100);

    assert_eq!(app.gpio().valve_writes(), vec![(pins::VALVE_GPIOS[1], false)]);
    assert!(app.sensors().is_active(2));
    assert!(sink.events.contains(&AppEvent::ValveChanged { valve: 2, open: true }));
}

#[test]
fn valve_off_releases_the_relay() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    deliver(&mut app, r#"{"valve_number":3,"action":"on"}"#);
    step(&mut app, &mut sink, 100);
    app.gpio_mut().clear();

    deliver(&mut app, r#"{"valve_number":3,"action":"off"}"#);
    step(&mut app, &mut sink, 100);

    assert_eq!(app.gpio().valve_writes(), vec![(pins::VALVE_GPIOS[2], true)]);
    assert!(!app.sensors().is_active(3));
}

#[test]
fn valve_number_keeps_its_relay_when_relay_one_is_dead() {
    let mut sink = RecordingSink::default();
    let mut app = make_app();
    app.gpio_mut().fail_pin(pins::VALVE_GPIOS[0]);
    configure_and_start(&mut app, &stored_device(true), &mut sink);
    run_until(&mut app, &mut sink, StateId::Operational, 100);
    step(&mut app, &mut sink, 100);
    assert_eq!(app.sensor_config().valve_count, 3);
    app.gpio_mut().clear();

    deliver(&mut app, r#"{"valve_number":2,"action":"on"}"#);
    deliver(&mut app, r#"{"valve_number":1,"action":"on"}"#);
    step(&mut app, &mut sink, 100);

    assert_eq!(app.gpio().valve_writes(), vec![(pins::VALVE_GPIOS[1], false)]);
    assert!(app.sensors().is_active(2));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ValveChanged { .. })), 1);
}

#[test]
fn out_of_range_and_malformed_commands_are_dropped() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    app.gpio_mut().clear();

    for payload in [
        r#"{"valve_number":9,"action":"on"}"#,
        r#"{"valve_number":0,"action":"on"}"#,
        r#"{"valve_number":1,"action":"toggle"}"#,
        r#"{"valve":1}"#,
        "not json",
    ] {
        deliver(&mut app, payload);
    }
    step(&mut app, &mut sink, 100);

    assert!(app.gpio().valve_writes().is_empty());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ValveChanged { .. })), 0);
    assert_eq!(app.state(), StateId::Operational);
}

#[test]
fn heartbeat_is_retained_and_periodic() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);

    let heartbeat_topic = "greenmesh/cust-7/GM-0042/heartbeat";
    let beats = |app: &super::mock_hw::TestApp| {
        app.mqtt()
            .sim_published()
            .iter()
            .filter(|(t, p, retain)| t == heartbeat_topic && p == b"online" && *retain)
            .count()
    };
    assert_eq!(beats(&app), 1);

    let interval = u64::from(ControllerConfig::default().heartbeat_interval_ms);
    step(&mut app, &mut sink, interval - 1_000);
    assert_eq!(beats(&app), 1);
    step(&mut app, &mut sink, 1_000);
    assert_eq!(beats(&app), 2);
}

#[test]
fn broker_reconnects_are_spaced_by_backoff() {
    let mut sink = RecordingSink::default();
    let mut app = make_configured_app(&stored_device(true), &mut sink);
    app.mqtt_mut().sim_set_reachable(false);
    run_until(&mut app, &mut sink, StateId::Operational, 100);

    // Backoff is 5 s; ticks are 1 s apart.
    for _ in 0..10 {
        step(&mut app, &mut sink, 1_000);
    }
    assert_eq!(app.mqtt().sim_connect_attempts(), 2);
    step(&mut app, &mut sink, 1_000);
    assert_eq!(app.mqtt().sim_connect_attempts(), 3);

    app.mqtt_mut().sim_set_reachable(true);
    for _ in 0..5 {
        step(&mut app, &mut sink, 1_000);
    }
    assert_eq!(app.mqtt().sim_connect_attempts(), 4);
    assert_eq!(sink.count(|e| *e == AppEvent::ControlSessionUp), 1);
}

#[test]
fn dropped_session_resubscribes() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    app.mqtt_mut().sim_drop_session();

    let backoff = u64::from(ControllerConfig::default().broker_backoff_ms);
    step(&mut app, &mut sink, backoff);
    assert_eq!(app.mqtt().sim_subscriptions(), [CONTROL_TOPIC.to_string()]);
    assert_eq!(sink.count(|e| *e == AppEvent::ControlSessionUp), 2);
}

#[test]
fn silent_broker_reconnect_resubscribes_before_the_next_command() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    app.mqtt_mut().sim_reconnect_silently();
    assert!(app.mqtt().sim_subscriptions().is_empty());

    step(&mut app, &mut sink, 20);
    assert_eq!(app.mqtt().sim_subscriptions(), [CONTROL_TOPIC.to_string()]);
    assert_eq!(app.mqtt().sim_connect_attempts(), 1);
    assert_eq!(sink.count(|e| *e == AppEvent::ControlSessionUp), 2);

    app.gpio_mut().clear();
    deliver(&mut app, r#"{"valve_number":4,"action":"on"}"#);
    step(&mut app, &mut sink, 20);
    assert_eq!(app.gpio().valve_writes(), vec![(pins::VALVE_GPIOS[3], false)]);
}

#[test]
fn telemetry_only_while_a_valve_is_open() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    let url = ControllerConfig::default().telemetry_url;

    for _ in 0..8 {
        step(&mut app, &mut sink, 500);
    }
    assert!(app.http().sim_bodies_for(&url).is_empty());

    deliver(&mut app, r#"{"valve_number":1,"action":"on"}"#);
    step(&mut app, &mut sink, 500);
    for _ in 0..8 {
        step(&mut app, &mut sink, 500);
    }
    // Window opened on the command tick; samples at +2 s and +4 s.
    assert_eq!(app.http().sim_bodies_for(&url).len(), 2);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Telemetry(t) if t.active_valves == 1)), 2);

    let body: serde_json::Value =
        serde_json::from_slice(app.http().sim_bodies_for(&url)[0]).unwrap();
    assert_eq!(body["device_number"], "GM-0042");
    assert!(body["flow_rates"].is_array());

    deliver(&mut app, r#"{"valve_number":1,"action":"off"}"#);
    for _ in 0..8 {
        step(&mut app, &mut sink, 500);
    }
    assert_eq!(app.http().sim_bodies_for(&url).len(), 2);
}

#[test]
fn operational_entry_reports_health_and_status() {
    let mut sink = RecordingSink::default();
    let app = operational_app(&mut sink);
    let cfg = ControllerConfig::default();

    let health: serde_json::Value =
        serde_json::from_slice(app.http().sim_bodies_for(&cfg.health_url)[0]).unwrap();
    assert_eq!(health["valves"], serde_json::json!([true, true, true, true]));
    assert_eq!(health["temperature_sensor"], false);

    let status: serde_json::Value =
        serde_json::from_slice(app.http().sim_bodies_for(&cfg.status_url)[0]).unwrap();
    assert_eq!(status["uid"], "cust-7");
    assert_eq!(status["valve_connected"], 4);
    assert_eq!(status["valve_active"], 0);
    assert!(status["temp_sensor"].is_null());
}

#[test]
fn status_update_is_resent_every_interval() {
    let mut sink = RecordingSink::default();
    let mut app = operational_app(&mut sink);
    let cfg = ControllerConfig::default();
    assert_eq!(app.http().sim_bodies_for(&cfg.status_url).len(), 1);

    let interval = u64::from(cfg.status_interval_ms);
    for _ in 0..interval / 10_000 {
        step(&mut app, &mut sink, 10_000);
    }
    let bodies = app.http().sim_bodies_for(&cfg.status_url);
    assert_eq!(bodies.len(), 2);
    let body: serde_json::Value = serde_json::from_slice(bodies[1]).unwrap();
    assert_eq!(body["device_number"], "GM-0042");
    assert!(body["timestamp"].as_u64().unwrap() >= interval / 1_000);
}

#[test]
fn health_report_reflects_faulty_channels() {
    let mut sink = RecordingSink::default();
    let mut app = make_board_app();
    app.gpio_mut().sim_fail_pin(pins::VALVE_GPIOS[0]);
    app.gpio_mut().sim_set_pattern(pins::FLOW_GPIOS[2], &[true, false]);
    app.gpio_mut().sim_set_adc(pins::TEMP_ADC_GPIO, 4095);
    configure_and_start(&mut app, &stored_device(true), &mut sink);
    run_until(&mut app, &mut sink, StateId::Operational, 100);

    let cfg = ControllerConfig::default();
    let health: serde_json::Value =
        serde_json::from_slice(app.http().sim_bodies_for(&cfg.health_url)[0]).unwrap();
    assert_eq!(health["valves"], serde_json::json!([false, true, true, true]));
    assert_eq!(health["flow_sensors"], serde_json::json!([false, false, true, false]));
    assert_eq!(health["temperature_sensor"], false);

    let status: serde_json::Value =
        serde_json::from_slice(app.http().sim_bodies_for(&cfg.status_url)[0]).unwrap();
    assert_eq!(status["valve_connected"], 3);
    assert_eq!(status["flow_sensor_connected"], 1);
    assert_eq!(status["flow_sensor_active"], 1);
    assert_eq!(status["temp_sensor_connected"], false);
    assert!(status["temp_sensor"].is_null());

    let stored = app.store().load_sensor_config();
    assert_eq!(stored.valve_count, 3);
    assert_eq!(stored.flow_sensor_count, 1);
    assert!(!stored.temperature_connected);
}
