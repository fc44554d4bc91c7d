//! Hall-effect flow sensors: presence classification and pulse counting.
//!
//! Each sensor channel has one `AtomicU32` counter in the [`PulseCounters`]
//! arena.  The GPIO ISR increments it; the main loop reads and resets it
//! with a single `swap(0)`, so a pulse landing during the read is either in
//! this window or the next, never lost and never counted twice.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::app::ports::{ClockPort, GpioPort};
use crate::config::MAX_FLOW_SENSORS;

/// Settle time after enabling the pull-up before sampling.
const SETTLE_MS: u32 = 100;
/// Digital samples taken per presence probe.
pub const PROBE_SAMPLES: usize = 20;
const PROBE_SPACING_MS: u32 = 25;

// ───────────────────────────────────────────────────────────────
// Pulse counters
// ───────────────────────────────────────────────────────────────

/// Arena of per-channel pulse counters, indexed by physical channel.
pub struct PulseCounters {
    counts: [AtomicU32; MAX_FLOW_SENSORS],
}

impl PulseCounters {
    pub const fn new() -> Self {
        Self {
            counts: [const { AtomicU32::new(0) }; MAX_FLOW_SENSORS],
        }
    }

    /// Count one pulse.  ISR-safe; out-of-range channels are ignored.
    pub fn record(&self, channel: usize) {
        if let Some(c) = self.counts.get(channel) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Read and reset a channel in one atomic exchange.
    pub fn take(&self, channel: usize) -> u32 {
        self.counts
            .get(channel)
            .map_or(0, |c| c.swap(0, Ordering::Relaxed))
    }

    /// Discard every pending count (start of a new sampling window).
    pub fn clear_all(&self) {
        for c in &self.counts {
            c.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for PulseCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters fed by the flow-sensor GPIO interrupts.
/// `static` because ESP-IDF ISR callbacks cannot capture state.
pub static FLOW_PULSES: PulseCounters = PulseCounters::new();

/// Called from the GPIO ISR on each falling edge of `channel`.
pub fn flow_isr_handler(channel: usize) {
    FLOW_PULSES.record(channel);
}

// ───────────────────────────────────────────────────────────────
// Flow rate
// ───────────────────────────────────────────────────────────────

/// Litres per minute for `pulses` counted over `window_ms`.
///
/// Pulses are first normalised to a one-second window, then scaled by
/// `60 / calibration_factor`.
pub fn flow_rate_lpm(pulses: u32, window_ms: u64, calibration_factor: f32) -> f32 {
    if window_ms == 0 || calibration_factor <= 0.0 {
        return 0.0;
    }
    let pulses_per_sec = pulses as f32 * 1000.0 / window_ms as f32;
    pulses_per_sec * 60.0 / calibration_factor
}

// ───────────────────────────────────────────────────────────────
// Presence classification
// ───────────────────────────────────────────────────────────────

/// Decide whether a series of digital samples came from a live sensor.
///
/// Any one of: the level changed between samples; both levels appear; the
/// HIGH share is strictly between 10 % and 90 %.  A pin stuck at either
/// rail fails all three.
pub fn classify_levels(samples: &[bool]) -> bool {
    if samples.is_empty() {
        return false;
    }
    let variation = samples.windows(2).any(|w| w[0] != w[1]);
    let highs = samples.iter().filter(|&&s| s).count();
    let lows = samples.len() - highs;
    let both_levels = highs > 0 && lows > 0;
    let high_pct = highs * 100 / samples.len();
    let mixed_band = high_pct > 10 && high_pct < 90;

    variation || both_levels || mixed_band
}

/// Sample `pin` with its pull-up enabled and classify it.
pub fn probe(gpio: &mut impl GpioPort, clock: &mut impl ClockPort, pin: i32) -> bool {
    if gpio.configure_input(pin, true).is_err() {
        return false;
    }
    clock.delay_ms(SETTLE_MS);

    let mut samples = [false; PROBE_SAMPLES];
    for (i, s) in samples.iter_mut().enumerate() {
        *s = gpio.read(pin);
        if i + 1 < PROBE_SAMPLES {
            clock.delay_ms(PROBE_SPACING_MS);
        }
    }
    classify_levels(&samples)
}
