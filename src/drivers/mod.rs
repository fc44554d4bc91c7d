//! Board drivers: reset input, status indicator, and peripheral bring-up.

pub mod button;
pub mod hw_init;
pub mod status_led;
