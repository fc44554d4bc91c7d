//! Hardware adapter: bridges the board's GPIO and ADC to [`GpioPort`].
//!
//! On ESP-IDF every call goes straight to the raw helpers in
//! [`hw_init`](crate::drivers::hw_init).  On other targets the adapter is
//! a simulated pin bank: tests and the host build inject input levels,
//! ADC codes and pin faults with the `sim_*` methods and inspect what was
//! driven.

use crate::app::ports::GpioPort;
use crate::error::GpioError;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

#[cfg(not(target_os = "espidf"))]
use std::collections::{HashMap, HashSet};

/// Simulated input source for one pin.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
enum SimInput {
    Level(bool),
    /// Cycled through on successive reads.
    Pattern { levels: Vec<bool>, next: usize },
}

pub struct HardwareGpio {
    #[cfg(not(target_os = "espidf"))]
    inputs: HashMap<i32, SimInput>,
    #[cfg(not(target_os = "espidf"))]
    outputs: HashMap<i32, bool>,
    #[cfg(not(target_os = "espidf"))]
    adc: HashMap<i32, u16>,
    /// Pins whose configuration, writes and conversions fail.
    #[cfg(not(target_os = "espidf"))]
    faults: HashSet<i32>,
}

impl Default for HardwareGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareGpio {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            inputs: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            outputs: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            adc: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            faults: HashSet::new(),
        }
    }
}

#[cfg(target_os = "espidf")]
impl GpioPort for HardwareGpio {
    fn configure_output(&mut self, pin: i32) -> Result<(), GpioError> {
        hw_init::gpio_set_output(pin)
            .then_some(())
            .ok_or(GpioError::ConfigFailed)
    }

    fn configure_input(&mut self, pin: i32, pull_up: bool) -> Result<(), GpioError> {
        hw_init::gpio_set_input(pin, pull_up)
            .then_some(())
            .ok_or(GpioError::ConfigFailed)
    }

    fn write(&mut self, pin: i32, high: bool) -> Result<(), GpioError> {
        hw_init::gpio_write(pin, high)
            .then_some(())
            .ok_or(GpioError::WriteFailed)
    }

    fn read(&mut self, pin: i32) -> bool {
        hw_init::gpio_read(pin)
    }

    fn read_analog(&mut self, pin: i32) -> Result<u16, GpioError> {
        if pin != crate::pins::TEMP_ADC_GPIO {
            return Err(GpioError::AdcReadFailed);
        }
        hw_init::adc1_read(hw_init::ADC1_CH_TEMP).ok_or(GpioError::AdcReadFailed)
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl HardwareGpio {
    /// Hold `pin` at a fixed input level.
    pub fn sim_set_level(&mut self, pin: i32, high: bool) {
        self.inputs.insert(pin, SimInput::Level(high));
    }

    /// Feed `pin` a repeating sequence of levels, one per read.
    pub fn sim_set_pattern(&mut self, pin: i32, levels: &[bool]) {
        self.inputs.insert(
            pin,
            SimInput::Pattern {
                levels: levels.to_vec(),
                next: 0,
            },
        );
    }

    /// Raw code returned by the next ADC conversions on `pin`.
    pub fn sim_set_adc(&mut self, pin: i32, raw: u16) {
        self.adc.insert(pin, raw);
    }

    /// Make every operation on `pin` fail until [`sim_clear_fault`](Self::sim_clear_fault).
    /// Reads of a faulted input return the idle pull-up level.
    pub fn sim_fail_pin(&mut self, pin: i32) {
        self.faults.insert(pin);
    }

    pub fn sim_clear_fault(&mut self, pin: i32) {
        self.faults.remove(&pin);
    }

    /// Last level driven onto `pin`, if any.
    pub fn sim_output(&self, pin: i32) -> Option<bool> {
        self.outputs.get(&pin).copied()
    }
}

#[cfg(not(target_os = "espidf"))]
impl GpioPort for HardwareGpio {
    fn configure_output(&mut self, pin: i32) -> Result<(), GpioError> {
        self.check(pin, GpioError::ConfigFailed)
    }

    fn configure_input(&mut self, pin: i32, _pull_up: bool) -> Result<(), GpioError> {
        self.check(pin, GpioError::ConfigFailed)
    }

    fn write(&mut self, pin: i32, high: bool) -> Result<(), GpioError> {
        self.check(pin, GpioError::WriteFailed)?;
        self.outputs.insert(pin, high);
        Ok(())
    }

    fn read(&mut self, pin: i32) -> bool {
        if self.faults.contains(&pin) {
            return true;
        }
        match self.inputs.get_mut(&pin) {
            Some(SimInput::Level(level)) => *level,
            Some(SimInput::Pattern { levels, next }) if !levels.is_empty() => {
                let level = levels[*next % levels.len()];
                *next += 1;
                level
            }
            // Unconnected inputs float to the pull-up.
            _ => self.outputs.get(&pin).copied().unwrap_or(true),
        }
    }

    fn read_analog(&mut self, pin: i32) -> Result<u16, GpioError> {
        self.check(pin, GpioError::AdcReadFailed)?;
        Ok(self.adc.get(&pin).copied().unwrap_or(0))
    }
}

#[cfg(not(target_os = "espidf"))]
impl HardwareGpio {
    fn check(&self, pin: i32, err: GpioError) -> Result<(), GpioError> {
        if self.faults.contains(&pin) {
            Err(err)
        } else {
            Ok(())
        }
    }
}
