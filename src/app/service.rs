//! Application service: the hexagonal core.
//!
//! [`AppService`] owns every domain component and the adapters behind the
//! port traits.  Each loop iteration it gathers inputs into the FSM
//! context, ticks the FSM, then executes the [`Request`]s the state
//! handlers queued and writes their results back as inputs for the next
//! tick.
//!
//! ```text
//!  GpioPort ──┐                              ┌──▶ EventSink
//!  WifiPort ──┤   ┌──────────────────────┐   │
//!  HttpPort ──┼──▶│      AppService      │───┤
//!  MqttPort ──┤   │ FSM · Store · Sensors│   │
//! ClockPort ──┘   └──────────────────────┘   └──▶ SystemPort
//! ```

use core::fmt::Write as _;

use log::{info, warn};
use serde::Serialize;

use crate::config::ControllerConfig;
use crate::control::{ControlChannel, SessionStatus};
use crate::drivers::button::ResetButton;
use crate::drivers::status_led::{PatternId, StatusLed};
use crate::fsm::context::{FsmContext, Link, Request};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::network::backend::{ActiveCounts, BackendClient};
use crate::network::connectivity::{ConnectivityManager, LinkEvent, LinkState};
use crate::pins;
use crate::sensors::flow::{FLOW_PULSES, PulseCounters};
use crate::sensors::{SensorConfig, SensorDetector};
use crate::storage::{ConfigStore, DeviceConfig};

use super::commands::{AppCommand, Credentials};
use super::events::{AppEvent, TelemetryData};
use super::ports::{ClockPort, EventSink, Platform, PortSet, SystemPort, WifiPort};

// ───────────────────────────────────────────────────────────────
// Status snapshot
// ───────────────────────────────────────────────────────────────

/// Body of the `/status` page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub device_number: heapless::String<64>,
    pub customer_uid: heapless::String<64>,
    pub ssid: heapless::String<32>,
    pub ip_address: Option<heapless::String<15>>,
    pub onboarded: bool,
    pub heap_free: u32,
    pub wifi_rssi: Option<i8>,
}

fn format_ip(ip: [u8; 4]) -> heapless::String<15> {
    let mut s = heapless::String::new();
    // 255.255.255.255 is exactly 15 bytes.
    let _ = write!(s, "{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);
    s
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService<P: Platform> {
    fsm: Fsm,
    ctx: FsmContext,

    store: ConfigStore<P::Storage>,
    device: DeviceConfig,
    sensors: SensorDetector,
    connectivity: ConnectivityManager,
    backend: BackendClient,
    control: ControlChannel,
    button: ResetButton,
    led: StatusLed,
    pulses: &'static PulseCounters,

    gpio: P::Gpio,
    clock: P::Clock,
    wifi: P::Wifi,
    http: P::Http,
    mqtt: P::Mqtt,
    system: P::System,

    /// The sensor configuration has been persisted after a successful
    /// status update in this operational period.
    status_synced: bool,
}

impl<P: Platform> AppService<P> {
    /// Construct the service from its adapters and configuration.
    ///
    /// Does **not** touch hardware: call [`start`](Self::start) next.
    pub fn new(ports: PortSet<P>, config: ControllerConfig) -> Self {
        let PortSet {
            gpio,
            clock,
            storage,
            wifi,
            http,
            mqtt,
            system,
        } = ports;

        Self {
            fsm: Fsm::new(build_state_table(), StateId::Boot),
            store: ConfigStore::new(storage),
            device: DeviceConfig::default(),
            sensors: SensorDetector::new(&config),
            connectivity: ConnectivityManager::new(&config),
            backend: BackendClient::new(&config),
            control: ControlChannel::new(&config),
            button: ResetButton::new(pins::RESET_BUTTON_GPIO, config.reset_debounce_ms),
            led: StatusLed::new(pins::STATUS_LED_GPIO),
            pulses: &FLOW_PULSES,
            ctx: FsmContext::new(config),
            gpio,
            clock,
            wifi,
            http,
            mqtt,
            system,
            status_synced: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Park the outputs, take the boot-time reset reading, load the stored
    /// identity and enter `Boot`.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        if let Err(e) = self.sensors.init_outputs(&mut self.gpio) {
            warn!("AppService: valve outputs not initialised: {}", e);
        }
        if let Err(e) = self.button.init(&mut self.gpio) {
            warn!("AppService: reset input not initialised: {}", e);
        }
        if let Err(e) = self.led.init(&mut self.gpio) {
            warn!("AppService: status LED not initialised: {}", e);
        }

        self.ctx.reset_at_boot = self.button.pressed_at_boot(&mut self.gpio);
        match self.store.load() {
            Some(device) => {
                self.ctx.config_valid = true;
                self.ctx.needs_validation = device.needs_validation();
                self.device = device;
            }
            None => {
                self.ctx.config_valid = false;
                self.device = DeviceConfig::default();
            }
        }

        let now = self.clock.now_ms();
        self.ctx.now_ms = now;
        self.fsm.start(&mut self.ctx);
        self.execute_requests(sink);
        self.led.set_pattern(PatternId::for_state(self.fsm.current_state()), now);
        self.led.tick(&mut self.gpio, now);

        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one loop iteration: link → reset → control channel → FSM →
    /// requests → status LED.
    pub fn tick(&mut self, sink: &mut impl EventSink) {
        let now = self.clock.now_ms();
        self.ctx.now_ms = now;
        let prev_state = self.fsm.current_state();

        // 1. Connectivity sub-state
        if let Some(event) = self.connectivity.poll(&mut self.wifi, now) {
            if event == LinkEvent::Lost && prev_state == StateId::Operational {
                sink.emit(&AppEvent::LinkLost);
            }
        }
        self.ctx.link = match self.connectivity.state() {
            LinkState::Disconnected => Link::Down,
            LinkState::Connecting { .. } => Link::Joining,
            LinkState::Connected => Link::Up,
            LinkState::Failed => Link::Failed,
        };

        // 2. Debounced reset input
        self.ctx.reset_pressed = self.button.poll(&mut self.gpio, now);

        // 3. Remote control (operational only)
        if prev_state == StateId::Operational {
            self.service_control_channel(now, sink);
        }
        self.ctx.active_valves = self.sensors.active_valve_count();

        // 4. FSM tick (pure state logic), then its I/O
        self.fsm.tick(&mut self.ctx);
        self.execute_requests(sink);

        // 5. Emit state change if the FSM moved
        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }

        // 6. Status indicator
        let pattern = PatternId::for_state(new_state);
        if self.led.pattern() != pattern {
            self.led.set_pattern(pattern, now);
        }
        self.led.tick(&mut self.gpio, now);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a command from the setup portal.
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::SubmitCredentials(creds) => self.save_credentials(&creds, sink),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// The identity currently in effect.
    pub fn device_config(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn sensor_config(&self) -> SensorConfig {
        self.sensors.config()
    }

    pub fn sensors(&self) -> &SensorDetector {
        &self.sensors
    }

    pub fn link_state(&self) -> LinkState {
        self.connectivity.state()
    }

    /// Snapshot for the status page.
    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            device_number: self.device.device_id.clone(),
            customer_uid: self.device.account_id.clone(),
            ssid: self.device.ssid.clone(),
            ip_address: self
                .connectivity
                .is_connected()
                .then(|| self.wifi.ip_address())
                .flatten()
                .map(format_ip),
            onboarded: self.device.is_onboarded,
            heap_free: self.system.free_heap(),
            wifi_rssi: self.wifi.rssi(),
        }
    }

    pub fn store(&self) -> &ConfigStore<P::Storage> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<P::Storage> {
        &mut self.store
    }

    pub fn gpio(&self) -> &P::Gpio {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut P::Gpio {
        &mut self.gpio
    }

    pub fn clock_mut(&mut self) -> &mut P::Clock {
        &mut self.clock
    }

    pub fn wifi_mut(&mut self) -> &mut P::Wifi {
        &mut self.wifi
    }

    pub fn http(&self) -> &P::Http {
        &self.http
    }

    pub fn http_mut(&mut self) -> &mut P::Http {
        &mut self.http
    }

    pub fn mqtt(&self) -> &P::Mqtt {
        &self.mqtt
    }

    pub fn mqtt_mut(&mut self) -> &mut P::Mqtt {
        &mut self.mqtt
    }

    pub fn system(&self) -> &P::System {
        &self.system
    }

    // ── Internal ──────────────────────────────────────────────

    fn save_credentials(&mut self, creds: &Credentials, sink: &mut impl EventSink) {
        if self.fsm.current_state() != StateId::SetupMode {
            warn!("AppService: credentials ignored outside setup mode");
            return;
        }
        if let Err(e) = crate::network::connectivity::validate_ssid(&creds.ssid)
            .and_then(|()| crate::network::connectivity::validate_passphrase(&creds.passphrase))
        {
            warn!("AppService: submitted credentials rejected: {}", e);
            return;
        }

        let device = DeviceConfig {
            ssid: creds.ssid.clone(),
            passphrase: creds.passphrase.clone(),
            account_id: creds.account_id.clone(),
            device_id: creds.device_id.clone(),
            is_onboarded: false,
            is_first_boot: true,
            sensors: self.device.sensors.clone(),
        };
        if !device.is_valid() {
            warn!("AppService: incomplete credentials, not saved");
            return;
        }
        match self.store.save(&device) {
            Ok(()) => {
                self.device = device;
                self.ctx.credentials_saved_at = Some(self.clock.now_ms());
                sink.emit(&AppEvent::CredentialsSaved);
            }
            Err(e) => warn!("AppService: credentials not saved, staying in setup: {}", e),
        }
    }

    fn service_control_channel(&mut self, now: u64, sink: &mut impl EventSink) {
        let status = self.control.service(&mut self.mqtt, now);
        if status == SessionStatus::CameUp {
            self.ctx.last_heartbeat_ms = None;
            sink.emit(&AppEvent::ControlSessionUp);
        }
        self.ctx.control_connected = status != SessionStatus::Down;

        while let Some(cmd) = self.control.next_command(&mut self.mqtt) {
            let result = if cmd.open {
                self.sensors.activate(cmd.valve, &mut self.gpio)
            } else {
                self.sensors.deactivate(cmd.valve, &mut self.gpio)
            };
            match result {
                Ok(()) => sink.emit(&AppEvent::ValveChanged {
                    valve: cmd.valve,
                    open: cmd.open,
                }),
                Err(e) => warn!("Control: valve {} command rejected: {}", cmd.valve, e),
            }
        }
    }

    fn execute_requests(&mut self, sink: &mut impl EventSink) {
        for req in self.ctx.take_requests() {
            self.execute(req, sink);
        }
    }

    fn execute(&mut self, req: Request, sink: &mut impl EventSink) {
        log::debug!("AppService: executing {:?}", req);
        match req {
            Request::WipeStore => {
                if let Err(e) = self.store.clear_all() {
                    warn!("AppService: wipe incomplete: {}", e);
                }
                self.device = DeviceConfig::default();
                self.ctx.config_valid = false;
                sink.emit(&AppEvent::FactoryReset);
            }
            Request::Restart => {
                self.sensors.close_all(&mut self.gpio);
                info!("AppService: restarting");
                self.system.restart();
            }
            Request::StartAccessPoint => {
                self.connectivity.start_access_point(&mut self.wifi);
            }
            Request::DetectSensors => {
                let detected = self.sensors.detect_all(&mut self.gpio, &mut self.clock);
                if let Err(e) = self.store.save_sensor_config(&detected) {
                    warn!("AppService: sensor configuration not persisted: {}", e);
                }
                self.device.sensors = detected.clone();
                sink.emit(&AppEvent::SensorsDetected(detected));
            }
            Request::BeginJoin | Request::Rejoin => {
                let result = self.connectivity.begin_join(
                    &mut self.wifi,
                    &self.device.ssid,
                    &self.device.passphrase,
                    self.ctx.now_ms,
                );
                self.ctx.link = match result {
                    Ok(()) => Link::Joining,
                    Err(e) => {
                        warn!("AppService: join not started: {}", e);
                        Link::Failed
                    }
                };
            }
            Request::ProbeInternet => {
                self.ctx.internet = Some(self.connectivity.probe_internet(&mut self.http));
            }
            Request::Validate => {
                let accepted = self.backend.validate(
                    &mut self.http,
                    &self.device.account_id,
                    &self.device.device_id,
                    &self.device.ssid,
                    &self.device.passphrase,
                );
                self.ctx.validation = Some(accepted);
            }
            Request::MarkOnboarded => match self.store.mark_onboarded() {
                Ok(()) => {
                    self.device.is_onboarded = true;
                    self.device.is_first_boot = false;
                    self.ctx.needs_validation = false;
                }
                Err(e) => warn!("AppService: onboarding flag not persisted: {}", e),
            },
            Request::StartControlChannel => {
                self.status_synced = false;
                self.control
                    .start(&self.device.account_id, &self.device.device_id);
            }
            Request::StopControlChannel => {
                self.control.stop();
                self.ctx.control_connected = false;
            }
            Request::ReportHardwareHealth => {
                self.backend.report_hardware_health(
                    &mut self.http,
                    &self.device.device_id,
                    &self.sensors.hardware_status(),
                );
            }
            Request::ReportStatus => self.report_status(),
            Request::PublishHeartbeat => {
                self.control.publish_heartbeat(&mut self.mqtt);
            }
            Request::ResetFlowWindow => self.pulses.clear_all(),
            Request::SampleTelemetry { window_ms } => self.sample_telemetry(window_ms, sink),
        }
    }

    fn report_status(&mut self) {
        let sensors = self.sensors.config();
        let active = ActiveCounts {
            valves: self.sensors.active_valve_count(),
            flows: self.sensors.active_flow_count(),
        };
        let timestamp = self.timestamp();
        let accepted = self.backend.report_status(
            &mut self.http,
            &self.device.account_id,
            &self.device.device_id,
            &sensors,
            active,
            timestamp,
        );
        if accepted && !self.status_synced {
            match self.store.save_sensor_config(&sensors) {
                Ok(()) => self.status_synced = true,
                Err(e) => warn!("AppService: sensor configuration not persisted: {}", e),
            }
        }
    }

    fn sample_telemetry(&mut self, window_ms: u64, sink: &mut impl EventSink) {
        let flow_rates = self.sensors.sample_flow_rates(self.pulses, window_ms);
        let temperature_c = self.sensors.read_temperature(&mut self.gpio, &mut self.clock);
        self.backend.send_telemetry(
            &mut self.http,
            &self.device.device_id,
            &flow_rates,
            temperature_c,
        );
        sink.emit(&AppEvent::Telemetry(TelemetryData {
            active_valves: self.sensors.active_valve_count(),
            flow_rates,
            temperature_c,
        }));
    }

    /// Unix seconds once the wall clock is synced, else seconds since boot.
    fn timestamp(&self) -> u64 {
        self.clock
            .unix_time_secs()
            .unwrap_or_else(|| self.clock.now_ms() / 1_000)
    }
}
