//! Clock adapter.
//!
//! - **`target_os = "espidf"`**: monotonic time from `esp_timer_get_time()`,
//!   blocking delays through FreeRTOS, wall clock from `gettimeofday()`.
//! - **`not(target_os = "espidf")`**: a virtual clock that only moves when
//!   the code under test sleeps or calls [`EspClock::sim_advance`], so
//!   timing-dependent logic runs deterministically and instantly.

use crate::app::ports::ClockPort;

/// Anything earlier than 2020-01-01 means SNTP has not synced yet.
#[cfg(target_os = "espidf")]
const EPOCH_2020: i64 = 1_577_836_800;

pub struct EspClock {
    #[cfg(not(target_os = "espidf"))]
    virtual_ms: u64,
    #[cfg(not(target_os = "espidf"))]
    unix_base_secs: Option<u64>,
}

impl Default for EspClock {
    fn default() -> Self {
        Self::new()
    }
}

impl EspClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            virtual_ms: 0,
            #[cfg(not(target_os = "espidf"))]
            unix_base_secs: None,
        }
    }
}

#[cfg(target_os = "espidf")]
impl ClockPort for EspClock {
    fn now_ms(&self) -> u64 {
        // SAFETY: esp_timer_get_time is a read of the monotonic system timer.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    fn unix_time_secs(&self) -> Option<u64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: tv is a valid out-pointer; the timezone argument may be null.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        Some(tv.tv_sec as u64)
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl EspClock {
    pub fn sim_advance(&mut self, ms: u64) {
        self.virtual_ms += ms;
    }

    /// Pretend the wall clock was synced to `secs` at the current instant.
    pub fn sim_sync_wall_clock(&mut self, secs: u64) {
        self.unix_base_secs = Some(secs.saturating_sub(self.virtual_ms / 1_000));
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClockPort for EspClock {
    fn now_ms(&self) -> u64 {
        self.virtual_ms
    }

    fn delay_ms(&mut self, ms: u32) {
        self.virtual_ms += u64::from(ms);
    }

    fn unix_time_secs(&self) -> Option<u64> {
        self.unix_base_secs.map(|base| base + self.virtual_ms / 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_advances_virtual_time() {
        let mut clock = EspClock::new();
        clock.delay_ms(250);
        clock.sim_advance(750);
        assert_eq!(clock.now_ms(), 1_000);
    }

    #[test]
    fn wall_clock_is_unsynced_until_set() {
        let mut clock = EspClock::new();
        assert_eq!(clock.unix_time_secs(), None);
        clock.sim_advance(5_000);
        clock.sim_sync_wall_clock(1_700_000_000);
        assert_eq!(clock.unix_time_secs(), Some(1_700_000_000));
        clock.sim_advance(2_000);
        assert_eq!(clock.unix_time_secs(), Some(1_700_000_002));
    }
}
