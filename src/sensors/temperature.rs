//! TMP36 analog temperature sensor.
//!
//! Linear output: 10 mV/°C with a 500 mV offset (0 °C = 500 mV), rated
//! −40 °C … 125 °C.  Read through ADC1 at 12-bit resolution.
//!
//! A channel is only trusted when the voltage, the derived temperature and
//! the raw code all look like a live sensor; an open input floats to a code
//! near one rail and a shorted one sits on the other.

use crate::app::ports::{ClockPort, GpioPort};

pub const ADC_MAX: u16 = 4095;
/// Codes within this distance of either rail are treated as open / shorted.
const RAIL_MARGIN: u16 = 50;

const MIN_VALID_MV: f32 = 100.0;
const MAX_VALID_MV: f32 = 1750.0;
const MIN_VALID_C: f32 = -40.0;
const MAX_VALID_C: f32 = 125.0;

/// Samples averaged for a reported temperature.
const SAMPLE_COUNT: usize = 10;
const SAMPLE_SPACING_MS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub raw: u16,
    pub millivolts: f32,
    pub celsius: f32,
}

impl TemperatureReading {
    /// Convert a raw ADC code taken against `vref_mv`.
    pub fn from_raw(raw: u16, vref_mv: u32) -> Self {
        let millivolts = f32::from(raw) * vref_mv as f32 / f32::from(ADC_MAX);
        Self {
            raw,
            millivolts,
            celsius: (millivolts - 500.0) / 10.0,
        }
    }

    fn in_rated_range(&self) -> bool {
        (MIN_VALID_C..=MAX_VALID_C).contains(&self.celsius)
    }

    /// Whether this conversion came from a connected, working sensor.
    pub fn is_connected(&self) -> bool {
        (MIN_VALID_MV..=MAX_VALID_MV).contains(&self.millivolts)
            && self.in_rated_range()
            && self.raw > RAIL_MARGIN
            && self.raw < ADC_MAX - RAIL_MARGIN
    }
}

pub struct TemperatureSensor {
    adc_gpio: i32,
    vref_mv: u32,
}

impl TemperatureSensor {
    pub fn new(adc_gpio: i32, vref_mv: u32) -> Self {
        Self { adc_gpio, vref_mv }
    }

    /// One conversion.  A failed ADC read reports as a grounded input,
    /// which classifies as not connected.
    pub fn read(&self, gpio: &mut impl GpioPort) -> TemperatureReading {
        let raw = gpio.read_analog(self.adc_gpio).unwrap_or(0);
        TemperatureReading::from_raw(raw, self.vref_mv)
    }

    /// Presence check on a single conversion.
    pub fn probe(&self, gpio: &mut impl GpioPort) -> (bool, TemperatureReading) {
        let reading = self.read(gpio);
        (reading.is_connected(), reading)
    }

    /// Average of the samples that fall inside the rated range; 0.0 when
    /// none do.
    pub fn read_average(&self, gpio: &mut impl GpioPort, clock: &mut impl ClockPort) -> f32 {
        let mut sum = 0.0;
        let mut valid = 0u32;
        for i in 0..SAMPLE_COUNT {
            let reading = self.read(gpio);
            if reading.in_rated_range() {
                sum += reading.celsius;
                valid += 1;
            }
            if i + 1 < SAMPLE_COUNT {
                clock.delay_ms(SAMPLE_SPACING_MS);
            }
        }
        if valid == 0 {
            return 0.0;
        }
        sum / valid as f32
    }
}
