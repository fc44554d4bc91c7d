//! Debounced reset button.
//!
//! ## Hardware
//!
//! Active-low momentary switch on a pull-up input.  There is no ISR; the
//! main loop samples the pin once per tick through [`GpioPort`].
//!
//! ## Detection
//!
//! | When     | Check                                   | Used for            |
//! |----------|-----------------------------------------|---------------------|
//! | Boot     | single raw read, no debounce            | factory reset       |
//! | Runtime  | level stable for `debounce_ms`, then a released → pressed edge | wipe + restart |

use crate::app::ports::GpioPort;
use crate::error::GpioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    /// Level has been stable since `since_ms`.
    Stable { pressed: bool },
    /// Raw level changed at `since_ms` and has not settled yet.
    Settling { pressed: bool, since_ms: u64 },
}

pub struct ResetButton {
    pin: i32,
    debounce_ms: u64,
    state: DebounceState,
}

impl ResetButton {
    pub fn new(pin: i32, debounce_ms: u32) -> Self {
        Self {
            pin,
            debounce_ms: u64::from(debounce_ms),
            state: DebounceState::Stable { pressed: false },
        }
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    pub fn init(&mut self, gpio: &mut impl GpioPort) -> Result<(), GpioError> {
        gpio.configure_input(self.pin, true)
    }

    /// Instantaneous read, used once at boot.
    pub fn pressed_at_boot(&mut self, gpio: &mut impl GpioPort) -> bool {
        let pressed = !gpio.read(self.pin);
        // A button still held after boot must not also fire a runtime reset.
        self.state = DebounceState::Stable { pressed };
        pressed
    }

    /// Sample the pin.  Returns `true` exactly once per debounced press.
    pub fn poll(&mut self, gpio: &mut impl GpioPort, now_ms: u64) -> bool {
        let raw = !gpio.read(self.pin);
        match self.state {
            DebounceState::Stable { pressed } => {
                if raw != pressed {
                    self.state = DebounceState::Settling {
                        pressed: raw,
                        since_ms: now_ms,
                    };
                }
                false
            }
            DebounceState::Settling { pressed, since_ms } => {
                if raw != pressed {
                    // Bounced back; restart the window from the new level.
                    self.state = DebounceState::Settling {
                        pressed: raw,
                        since_ms: now_ms,
                    };
                    return false;
                }
                if now_ms.saturating_sub(since_ms) < self.debounce_ms {
                    return false;
                }
                self.state = DebounceState::Stable { pressed };
                pressed
            }
        }
    }
}
