//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the blackboard between the state handlers and the
//! [`AppService`](crate::app::service::AppService).  The service writes the
//! **inputs** (time, button, link state, results of earlier requests)
//! before each tick; handlers read them, update the **timers**, and queue
//! **requests** that the service executes after the tick.  Handlers never
//! perform I/O themselves.

use crate::config::ControllerConfig;

/// Maximum requests a single tick can queue.
pub const MAX_REQUESTS: usize = 12;

// ---------------------------------------------------------------------------
// Link status (written by the service from the connectivity manager)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Link {
    #[default]
    Down,
    Joining,
    Up,
    Failed,
}

// ---------------------------------------------------------------------------
// Requests (written by state handlers; executed by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Erase the identity and sensor namespaces.
    WipeStore,
    /// Reboot the device.
    Restart,
    /// Bring up the setup access point and portal.
    StartAccessPoint,
    /// Probe every channel and persist the result.
    DetectSensors,
    /// Start joining the stored network.
    BeginJoin,
    /// Check internet reachability.
    ProbeInternet,
    /// One-shot backend validation.
    Validate,
    /// Record a successful validation in the store.
    MarkOnboarded,
    /// Bind and start the broker session.
    StartControlChannel,
    StopControlChannel,
    /// Send the per-channel health report.
    ReportHardwareHealth,
    /// Send a status update.
    ReportStatus,
    PublishHeartbeat,
    /// Discard pulses counted so far and start a new flow window.
    ResetFlowWindow,
    /// Sample flow and temperature over the window that just ended.
    SampleTelemetry { window_ms: u64 },
    /// Re-join after a lost link.
    Rejoin,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,
    /// Monotonic time of this tick.
    pub now_ms: u64,
    /// Time the current state was entered (set by `on_enter` handlers).
    pub entered_ms: u64,

    // -- Inputs --
    /// Raw reset read taken once before the first tick.
    pub reset_at_boot: bool,
    /// Debounced reset press seen this tick.
    pub reset_pressed: bool,
    /// A complete identity is stored.
    pub config_valid: bool,
    /// The stored identity still needs backend validation.
    pub needs_validation: bool,
    pub link: Link,
    /// Result of the last `ProbeInternet`, `None` until it completes.
    pub internet: Option<bool>,
    /// Result of the last `Validate`, `None` until it completes.
    pub validation: Option<bool>,
    /// When a credential submission was stored.
    pub credentials_saved_at: Option<u64>,
    pub active_valves: u8,
    /// The broker session is up.
    pub control_connected: bool,

    // -- Timers --
    pub probe_requested: bool,
    pub last_heartbeat_ms: Option<u64>,
    pub last_status_ms: Option<u64>,
    /// Start of the current flow window; `None` while every valve is closed.
    pub flow_window_start_ms: Option<u64>,
    pub link_lost_at_ms: Option<u64>,

    // -- Outputs --
    pub requests: heapless::Vec<Request, MAX_REQUESTS>,

    // -- Configuration --
    pub config: ControllerConfig,
}

impl FsmContext {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            now_ms: 0,
            entered_ms: 0,
            reset_at_boot: false,
            reset_pressed: false,
            config_valid: false,
            needs_validation: true,
            link: Link::Down,
            internet: None,
            validation: None,
            credentials_saved_at: None,
            active_valves: 0,
            control_connected: false,
            probe_requested: false,
            last_heartbeat_ms: None,
            last_status_ms: None,
            flow_window_start_ms: None,
            link_lost_at_ms: None,
            requests: heapless::Vec::new(),
            config,
        }
    }

    /// Queue a request for the service.  A full queue drops the request
    /// with an error log; the queue is sized well above any single tick.
    pub fn request(&mut self, req: Request) {
        if self.requests.push(req).is_err() {
            log::error!("FSM: request queue full, dropped {:?}", req);
        }
    }

    /// Take every queued request, leaving the queue empty.
    pub fn take_requests(&mut self) -> heapless::Vec<Request, MAX_REQUESTS> {
        core::mem::take(&mut self.requests)
    }

    /// Milliseconds since the current state was entered.
    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.entered_ms)
    }

    /// Whether `interval_ms` has passed since `since`; `None` counts as due.
    pub fn due(&self, since: Option<u64>, interval_ms: u32) -> bool {
        since.is_none_or(|t| self.now_ms.saturating_sub(t) >= u64::from(interval_ms))
    }
}
