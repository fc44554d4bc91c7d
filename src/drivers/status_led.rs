//! Single-colour status LED with blink patterns.
//!
//! The main loop calls [`StatusLed::tick`] every iteration; the driver
//! derives the LED level from the active pattern and the time since the
//! pattern was selected, and only touches the pin when the level changes.
//!
//! | Pattern      | Description                      | Rate   |
//! |--------------|----------------------------------|--------|
//! | Solid        | Constantly on                    | -      |
//! | SlowBlink    | 50 % square wave                 | 1 Hz   |
//! | FastBlink    | 50 % square wave                 | 4 Hz   |
//! | DoubleBlink  | Two quick flashes, then pause    | 1 Hz   |
//! | RapidFlash   | Very fast on/off                 | 8 Hz   |

use crate::app::ports::GpioPort;
use crate::error::GpioError;
use crate::fsm::StateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternId {
    Off,
    Solid,
    SlowBlink,
    FastBlink,
    DoubleBlink,
    RapidFlash,
}

impl PatternId {
    /// Indicator pattern for each lifecycle state.
    pub fn for_state(state: StateId) -> Self {
        match state {
            StateId::Boot => Self::RapidFlash,
            StateId::SetupMode => Self::DoubleBlink,
            StateId::Connecting => Self::FastBlink,
            StateId::Validating => Self::SlowBlink,
            StateId::Operational => Self::Solid,
        }
    }

    /// LED level `phase_ms` into the pattern.
    pub fn level(self, phase_ms: u64) -> bool {
        match self {
            Self::Off => false,
            Self::Solid => true,
            Self::SlowBlink => phase_ms % 1000 < 500,
            Self::FastBlink => phase_ms % 250 < 125,
            Self::DoubleBlink => {
                let cycle = phase_ms % 1000;
                cycle < 100 || (200..300).contains(&cycle)
            }
            Self::RapidFlash => phase_ms % 125 < 63,
        }
    }
}

pub struct StatusLed {
    pin: i32,
    pattern: PatternId,
    started_ms: u64,
    /// Last level written; `None` forces the next write.
    lit: Option<bool>,
}

impl StatusLed {
    pub fn new(pin: i32) -> Self {
        Self {
            pin,
            pattern: PatternId::Off,
            started_ms: 0,
            lit: None,
        }
    }

    pub fn init(&mut self, gpio: &mut impl GpioPort) -> Result<(), GpioError> {
        gpio.configure_output(self.pin)?;
        gpio.write(self.pin, false)?;
        self.lit = Some(false);
        Ok(())
    }

    pub fn pattern(&self) -> PatternId {
        self.pattern
    }

    /// Switch pattern; the phase restarts only when the pattern changes.
    pub fn set_pattern(&mut self, pattern: PatternId, now_ms: u64) {
        if pattern != self.pattern {
            self.pattern = pattern;
            self.started_ms = now_ms;
        }
    }

    pub fn tick(&mut self, gpio: &mut impl GpioPort, now_ms: u64) {
        let level = self.pattern.level(now_ms.saturating_sub(self.started_ms));
        if self.lit == Some(level) {
            return;
        }
        if gpio.write(self.pin, level).is_ok() {
            self.lit = Some(level);
        }
    }
}
