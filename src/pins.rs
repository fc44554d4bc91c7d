//! GPIO / peripheral pin assignments for the Green Mesh controller board
//! (ESP32-C3).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Logical channel `n` (1-based) of a class lives
//! at index `n - 1` of its array.

use crate::config::{MAX_FLOW_SENSORS, MAX_VALVES};

// ---------------------------------------------------------------------------
// Valve relays (active-low: LOW energises the solenoid)
// ---------------------------------------------------------------------------

pub const VALVE_GPIOS: [i32; MAX_VALVES] = [4, 5, 6, 7];

// ---------------------------------------------------------------------------
// Flow sensors (hall-effect pulse outputs, falling-edge interrupt)
// ---------------------------------------------------------------------------

pub const FLOW_GPIOS: [i32; MAX_FLOW_SENSORS] = [2, 3, 10, 21];

// ---------------------------------------------------------------------------
// Temperature sensor (TMP36 analog output)
// ---------------------------------------------------------------------------

/// ADC1 channel 1 on the C3.
pub const TEMP_ADC_GPIO: i32 = 1;

// ---------------------------------------------------------------------------
// User interface
// ---------------------------------------------------------------------------

/// Manual reset push-button, active-low with internal pull-up.
pub const RESET_BUTTON_GPIO: i32 = 0;

/// Status indicator LED.
pub const STATUS_LED_GPIO: i32 = 8;
