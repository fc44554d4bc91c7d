//! Solenoid valve relay channels.
//!
//! Relays are active-low: driving the GPIO low energises the valve.  All
//! level handling goes through [`drive_level`] so the inversion lives in
//! one place.

use crate::app::ports::{ClockPort, GpioPort};
use crate::error::GpioError;

/// Time each level is held during a presence probe.
const PROBE_HOLD_MS: u32 = 50;

/// GPIO level that puts a valve in the requested state.
pub const fn drive_level(open: bool) -> bool {
    !open
}

/// Configure `pin` as an output and park it closed.
pub fn init(gpio: &mut impl GpioPort, pin: i32) -> Result<(), GpioError> {
    gpio.configure_output(pin)?;
    gpio.write(pin, drive_level(false))
}

/// Drive the channel through both levels and back to closed.
///
/// There is no feedback path from the relay, so a channel counts as
/// present whenever every drive succeeds.  This cannot tell a wired valve
/// from an open circuit.
pub fn probe(gpio: &mut impl GpioPort, clock: &mut impl ClockPort, pin: i32) -> bool {
    drive_cycle(gpio, clock, pin).is_ok()
}

fn drive_cycle(
    gpio: &mut impl GpioPort,
    clock: &mut impl ClockPort,
    pin: i32,
) -> Result<(), GpioError> {
    init(gpio, pin)?;
    clock.delay_ms(PROBE_HOLD_MS);
    gpio.write(pin, drive_level(true))?;
    clock.delay_ms(PROBE_HOLD_MS);
    gpio.write(pin, drive_level(false))
}
