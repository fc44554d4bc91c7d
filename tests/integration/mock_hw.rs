//! Mock hardware for integration tests.
//!
//! `RecordingGpio` keeps every pin write so tests can assert on the full
//! drive history.  The network, storage and clock ports use the crate's
//! own host simulations, reached through the service's accessors.
//! [`make_board_app`] runs the same service over the crate's own
//! [`Board`] platform, simulated GPIO included.

use std::collections::{HashMap, HashSet};

use greenmesh::adapters::Board;
use greenmesh::adapters::hardware::HardwareGpio;
use greenmesh::adapters::http::HttpAdapter;
use greenmesh::adapters::mqtt::MqttAdapter;
use greenmesh::adapters::nvs::NvsAdapter;
use greenmesh::adapters::system::SystemAdapter;
use greenmesh::adapters::time::EspClock;
use greenmesh::adapters::wifi::WifiAdapter;
use greenmesh::app::events::AppEvent;
use greenmesh::app::ports::{ClockPort, EventSink, GpioPort, MqttPort, Platform, PortSet};
use greenmesh::app::service::AppService;
use greenmesh::config::ControllerConfig;
use greenmesh::error::GpioError;
use greenmesh::fsm::StateId;
use greenmesh::pins;
use greenmesh::storage::DeviceConfig;

// ── RecordingGpio ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingGpio {
    pub writes: Vec<(i32, bool)>,
    levels: HashMap<i32, bool>,
    adc: HashMap<i32, u16>,
    failing: HashSet<i32>,
}

#[allow(dead_code)]
impl RecordingGpio {
    pub fn set_level(&mut self, pin: i32, high: bool) {
        self.levels.insert(pin, high);
    }

    pub fn set_adc(&mut self, pin: i32, raw: u16) {
        self.adc.insert(pin, raw);
    }

    /// Reject configuration of and writes to `pin`.
    pub fn fail_pin(&mut self, pin: i32) {
        self.failing.insert(pin);
    }

    /// Writes to `pin`, oldest first.
    pub fn writes_to(&self, pin: i32) -> Vec<bool> {
        self.writes
            .iter()
            .filter(|(p, _)| *p == pin)
            .map(|(_, level)| *level)
            .collect()
    }

    /// Writes to any valve relay, oldest first.
    pub fn valve_writes(&self) -> Vec<(i32, bool)> {
        self.writes
            .iter()
            .copied()
            .filter(|(p, _)| pins::VALVE_GPIOS.contains(p))
            .collect()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl GpioPort for RecordingGpio {
    fn configure_output(&mut self, pin: i32) -> Result<(), GpioError> {
        if self.failing.contains(&pin) {
            return Err(GpioError::ConfigFailed);
        }
        Ok(())
    }

    fn configure_input(&mut self, _pin: i32, _pull_up: bool) -> Result<(), GpioError> {
        Ok(())
    }

    fn write(&mut self, pin: i32, high: bool) -> Result<(), GpioError> {
        if self.failing.contains(&pin) {
            return Err(GpioError::WriteFailed);
        }
        self.writes.push((pin, high));
        Ok(())
    }

    fn read(&mut self, pin: i32) -> bool {
        // Inputs idle at the pull-up.
        self.levels.get(&pin).copied().unwrap_or(true)
    }

    fn read_analog(&mut self, pin: i32) -> Result<u16, GpioError> {
        Ok(self.adc.get(&pin).copied().unwrap_or(0))
    }
}

// ── MockPlatform ──────────────────────────────────────────────

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Gpio = RecordingGpio;
    type Clock = EspClock;
    type Storage = NvsAdapter;
    type Wifi = WifiAdapter;
    type Http = HttpAdapter;
    type Mqtt = MqttAdapter;
    type System = SystemAdapter;
}

pub type TestApp = AppService<MockPlatform>;
#[allow(dead_code)]
pub type BoardApp = AppService<Board>;

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Builders and drivers ──────────────────────────────────────

pub const ACCOUNT: &str = "cust-7";
pub const DEVICE: &str = "GM-0042";
pub const CONTROL_TOPIC: &str = "greenmesh/cust-7/GM-0042/control";

/// A service over fresh mocks.  Not started.
pub fn make_app() -> TestApp {
    let ports = PortSet::<MockPlatform> {
        gpio: RecordingGpio::default(),
        clock: EspClock::new(),
        storage: NvsAdapter::default(),
        wifi: WifiAdapter::new(),
        http: HttpAdapter::new(),
        mqtt: MqttAdapter::new(),
        system: SystemAdapter::new(),
    };
    AppService::new(ports, ControllerConfig::default())
}

/// A service over the crate's simulated board.  Not started.
#[allow(dead_code)]
pub fn make_board_app() -> BoardApp {
    let ports = PortSet::<Board> {
        gpio: HardwareGpio::new(),
        clock: EspClock::new(),
        storage: NvsAdapter::default(),
        wifi: WifiAdapter::new(),
        http: HttpAdapter::new(),
        mqtt: MqttAdapter::new(),
        system: SystemAdapter::new(),
    };
    AppService::new(ports, ControllerConfig::default())
}

#[allow(dead_code)]
pub fn stored_device(onboarded: bool) -> DeviceConfig {
    DeviceConfig {
        ssid: heapless::String::try_from("orchard").unwrap(),
        passphrase: heapless::String::try_from("password1").unwrap(),
        account_id: heapless::String::try_from(ACCOUNT).unwrap(),
        device_id: heapless::String::try_from(DEVICE).unwrap(),
        is_onboarded: onboarded,
        is_first_boot: !onboarded,
        ..Default::default()
    }
}

/// A started service with `device` already in the store and the
/// connectivity probe answering 204.
#[allow(dead_code)]
pub fn make_configured_app(device: &DeviceConfig, sink: &mut RecordingSink) -> TestApp {
    let mut app = make_app();
    configure_and_start(&mut app, device, sink);
    app
}

/// Store `device`, make the connectivity probe answer 204 and start.
#[allow(dead_code)]
pub fn configure_and_start<P>(app: &mut AppService<P>, device: &DeviceConfig, sink: &mut RecordingSink)
where
    P: Platform<Storage = NvsAdapter, Http = HttpAdapter>,
{
    app.store_mut().save(device).unwrap();
    let probe = ControllerConfig::default().probe_url;
    app.http_mut().sim_respond(&probe, Ok(204));
    app.start(sink);
}

/// Advance the clock by `step_ms`, then tick.
pub fn step<P>(app: &mut AppService<P>, sink: &mut RecordingSink, step_ms: u64)
where
    P: Platform<Clock = EspClock>,
{
    app.clock_mut().sim_advance(step_ms);
    app.tick(sink);
}

/// Tick in `step_ms` increments until `state` is reached.
#[allow(dead_code)]
pub fn run_until<P>(app: &mut AppService<P>, sink: &mut RecordingSink, state: StateId, step_ms: u64)
where
    P: Platform<Clock = EspClock>,
{
    for _ in 0..200 {
        if app.state() == state {
            return;
        }
        step(app, sink, step_ms);
    }
    panic!("never reached {:?}, stuck in {:?}", state, app.state());
}

/// A configured, onboarded controller in `Operational` with its broker
/// session up.
#[allow(dead_code)]
pub fn operational_app(sink: &mut RecordingSink) -> TestApp {
    let mut app = make_configured_app(&stored_device(true), sink);
    run_until(&mut app, sink, StateId::Operational, 100);
    step(&mut app, sink, 100);
    assert!(app.mqtt().is_connected(), "broker session should be up");
    app
}

#[allow(dead_code)]
pub fn now_ms(app: &mut TestApp) -> u64 {
    app.clock_mut().now_ms()
}
