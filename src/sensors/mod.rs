//! Sensor subsystem: channel drivers and the aggregating [`SensorDetector`].
//!
//! The detector probes every physical valve, flow and temperature channel
//! once per boot, remembers which ones answered, and from then on owns the
//! live actuation state.  Valve `n` (1-based) is always relay `n`; a
//! command for it is accepted only when `n` is within the detected count
//! and relay `n` itself passed its drive test.  Flow sensors are reported
//! in detection order.

pub mod flow;
pub mod temperature;
pub mod valve;

use log::{info, warn};

use crate::app::ports::{ClockPort, GpioPort};
use crate::config::{ControllerConfig, MAX_FLOW_SENSORS, MAX_VALVES};
use crate::error::{ControlError, GpioError};
use crate::pins;
use flow::PulseCounters;
use temperature::TemperatureSensor;

// ───────────────────────────────────────────────────────────────
// Data model
// ───────────────────────────────────────────────────────────────

/// Result of the last detection pass, persisted by the config store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorConfig {
    pub valve_count: u8,
    pub flow_sensor_count: u8,
    pub temperature_c: f32,
    pub temperature_connected: bool,
    pub sensors_detected: bool,
}

/// Per-physical-channel health, reported to the backend once per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareStatus {
    pub valves: [bool; MAX_VALVES],
    pub flow_sensors: [bool; MAX_FLOW_SENSORS],
    pub temperature: bool,
}

/// Flow rate of each detected sensor, in logical order.
pub type FlowRates = heapless::Vec<f32, MAX_FLOW_SENSORS>;

// ───────────────────────────────────────────────────────────────
// SensorDetector
// ───────────────────────────────────────────────────────────────

pub struct SensorDetector {
    temperature: TemperatureSensor,
    calibration_factor: f32,
    /// Relays that passed their drive test, by physical index.
    valve_present: [bool; MAX_VALVES],
    /// Physical indices of detected flow sensors, in logical order.
    flows: heapless::Vec<u8, MAX_FLOW_SENSORS>,
    valve_active: [bool; MAX_VALVES],
    flow_active: [bool; MAX_FLOW_SENSORS],
    temperature_connected: bool,
    last_temperature_c: f32,
}

impl SensorDetector {
    pub fn new(cfg: &ControllerConfig) -> Self {
        Self {
            temperature: TemperatureSensor::new(pins::TEMP_ADC_GPIO, cfg.adc_vref_mv),
            calibration_factor: cfg.flow_calibration_factor,
            valve_present: [false; MAX_VALVES],
            flows: heapless::Vec::new(),
            valve_active: [false; MAX_VALVES],
            flow_active: [false; MAX_FLOW_SENSORS],
            temperature_connected: false,
            last_temperature_c: 0.0,
        }
    }

    /// Park every relay output closed.  Called before anything else
    /// touches the valves.  A failing relay does not stop the others from
    /// being parked; the first error is returned.
    pub fn init_outputs(&mut self, gpio: &mut impl GpioPort) -> Result<(), GpioError> {
        let mut result = Ok(());
        for &pin in &pins::VALVE_GPIOS {
            if let Err(e) = valve::init(gpio, pin) {
                result = result.and(Err(e));
            }
        }
        self.valve_active = [false; MAX_VALVES];
        result
    }

    // ── Detection ─────────────────────────────────────────────

    /// Probe every channel class and return the resulting configuration.
    pub fn detect_all(
        &mut self,
        gpio: &mut impl GpioPort,
        clock: &mut impl ClockPort,
    ) -> SensorConfig {
        info!("Sensors: starting detection");
        self.detect_valves(gpio, clock);
        self.detect_flow_sensors(gpio, clock);
        self.detect_temperature(gpio, clock);

        let config = self.config();
        info!(
            "Sensors: {} valve(s), {} flow sensor(s), temperature {}",
            config.valve_count,
            config.flow_sensor_count,
            if config.temperature_connected { "connected" } else { "absent" }
        );
        if !config.sensors_detected {
            warn!("Sensors: nothing detected");
        }
        config
    }

    pub fn detect_valves(&mut self, gpio: &mut impl GpioPort, clock: &mut impl ClockPort) -> u8 {
        self.valve_active = [false; MAX_VALVES];
        for (physical, &pin) in pins::VALVE_GPIOS.iter().enumerate() {
            self.valve_present[physical] = valve::probe(gpio, clock, pin);
            if !self.valve_present[physical] {
                warn!("Sensors: valve channel {} failed its drive test", physical + 1);
            }
        }
        self.detected_valve_count()
    }

    pub fn detect_flow_sensors(
        &mut self,
        gpio: &mut impl GpioPort,
        clock: &mut impl ClockPort,
    ) -> u8 {
        self.flows.clear();
        self.flow_active = [false; MAX_FLOW_SENSORS];
        for (physical, &pin) in pins::FLOW_GPIOS.iter().enumerate() {
            if flow::probe(gpio, clock, pin) {
                let logical = self.flows.len();
                let _ = self.flows.push(physical as u8);
                self.flow_active[logical] = true;
            }
        }
        self.flows.len() as u8
    }

    pub fn detect_temperature(
        &mut self,
        gpio: &mut impl GpioPort,
        clock: &mut impl ClockPort,
    ) -> bool {
        let (connected, reading) = self.temperature.probe(gpio);
        self.temperature_connected = connected;
        if connected {
            self.last_temperature_c = self.temperature.read_average(gpio, clock);
        } else {
            self.last_temperature_c = 0.0;
            info!(
                "Sensors: temperature channel rejected (raw={}, {:.0} mV)",
                reading.raw, reading.millivolts
            );
        }
        connected
    }

    /// Snapshot of the current detection results.
    pub fn config(&self) -> SensorConfig {
        let valve_count = self.detected_valve_count();
        let flow_sensor_count = self.flows.len() as u8;
        SensorConfig {
            valve_count,
            flow_sensor_count,
            temperature_c: self.last_temperature_c,
            temperature_connected: self.temperature_connected,
            sensors_detected: valve_count > 0
                || flow_sensor_count > 0
                || self.temperature_connected,
        }
    }

    pub fn hardware_status(&self) -> HardwareStatus {
        let mut status = HardwareStatus {
            valves: self.valve_present,
            temperature: self.temperature_connected,
            ..Default::default()
        };
        for &p in &self.flows {
            status.flow_sensors[usize::from(p)] = true;
        }
        status
    }

    // ── Actuation ─────────────────────────────────────────────

    pub fn detected_valve_count(&self) -> u8 {
        self.valve_present.iter().filter(|&&p| p).count() as u8
    }

    /// Open valve `n`.
    pub fn activate(&mut self, n: u8, gpio: &mut impl GpioPort) -> Result<(), ControlError> {
        self.set_valve(n, true, gpio)
    }

    /// Close valve `n`.
    pub fn deactivate(&mut self, n: u8, gpio: &mut impl GpioPort) -> Result<(), ControlError> {
        self.set_valve(n, false, gpio)
    }

    /// Whether valve `n` is open.  `false` for any valve that would be
    /// rejected by [`activate`](Self::activate).
    pub fn is_active(&self, n: u8) -> bool {
        self.valve_index(n)
            .is_some_and(|i| self.valve_active[i])
    }

    pub fn active_valve_count(&self) -> u8 {
        self.valve_active.iter().filter(|&&a| a).count() as u8
    }

    pub fn active_flow_count(&self) -> u8 {
        self.flow_active.iter().filter(|&&a| a).count() as u8
    }

    /// Close every open valve, ignoring drive failures.
    pub fn close_all(&mut self, gpio: &mut impl GpioPort) {
        for n in 1..=MAX_VALVES as u8 {
            if self.is_active(n) {
                if let Err(e) = self.deactivate(n, gpio) {
                    warn!("Sensors: failed to close valve {}: {}", n, e);
                }
            }
        }
    }

    /// Physical index of valve `n`, if it may be driven.
    fn valve_index(&self, n: u8) -> Option<usize> {
        let i = usize::from(n).checked_sub(1)?;
        let usable = n <= self.detected_valve_count() && self.valve_present.get(i) == Some(&true);
        usable.then_some(i)
    }

    fn set_valve(&mut self, n: u8, open: bool, gpio: &mut impl GpioPort) -> Result<(), ControlError> {
        let i = self
            .valve_index(n)
            .ok_or(ControlError::OutOfRange(i64::from(n)))?;
        let pin = pins::VALVE_GPIOS[i];
        gpio.write(pin, valve::drive_level(open))
            .map_err(|_| ControlError::DriveFailed)?;
        self.valve_active[i] = open;
        info!("Sensors: valve {} {}", n, if open { "opened" } else { "closed" });
        Ok(())
    }

    // ── Sampling ──────────────────────────────────────────────

    /// Drain the pulse counters of every detected flow sensor and convert
    /// them to L/min over `window_ms`.
    pub fn sample_flow_rates(&self, counters: &PulseCounters, window_ms: u64) -> FlowRates {
        let mut rates = FlowRates::new();
        for &p in &self.flows {
            let pulses = counters.take(usize::from(p));
            let _ = rates.push(flow::flow_rate_lpm(pulses, window_ms, self.calibration_factor));
        }
        rates
    }

    /// Averaged temperature, or `None` when no sensor was detected.
    pub fn read_temperature(
        &mut self,
        gpio: &mut impl GpioPort,
        clock: &mut impl ClockPort,
    ) -> Option<f32> {
        if !self.temperature_connected {
            return None;
        }
        self.last_temperature_c = self.temperature.read_average(gpio, clock);
        Some(self.last_temperature_c)
    }
}
