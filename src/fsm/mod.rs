//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  StateTable                                             │
//! │  ┌─────────────┬─────────┬─────────┬───────────────────┐│
//! │  │ StateId     │ enter   │ exit    │ update            ││
//! │  ├─────────────┼─────────┼─────────┼───────────────────┤│
//! │  │ Boot        │ fn(ctx) │ fn(ctx) │ fn(ctx)->Option<> ││
//! │  │ SetupMode   │ fn(ctx) │ fn(ctx) │ fn(ctx)->Option<> ││
//! │  │ Connecting  │ fn(ctx) │ fn(ctx) │ fn(ctx)->Option<> ││
//! │  │ Validating  │ fn(ctx) │ fn(ctx) │ fn(ctx)->Option<> ││
//! │  │ Operational │ fn(ctx) │ fn(ctx) │ fn(ctx)->Option<> ││
//! │  └─────────────┴─────────┴─────────┴───────────────────┘│
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut FsmContext`, which
//! carries the inputs for this tick and collects the I/O requests the
//! service executes afterwards.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Device lifecycle states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Boot = 0,
    SetupMode = 1,
    Connecting = 2,
    Validating = 3,
    Operational = 4,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 5;

    /// Convert a `u8` index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `SetupMode` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Boot,
            1 => Self::SetupMode,
            2 => Self::Connecting,
            3 => Self::Validating,
            4 => Self::Operational,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::SetupMode
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and a mutable
/// [`FsmContext`] that is threaded through every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.entered_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    /// 3. Increment tick counter.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition regardless of what `on_update`
    /// returned.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn state_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        // Exit current state
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        // Update pointer and timing
        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;
        ctx.entered_ms = ctx.now_ms;

        // Enter new state
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::context::{FsmContext, Link, Request};
    use super::*;
    use crate::config::ControllerConfig;

    fn make_ctx() -> FsmContext {
        FsmContext::new(ControllerConfig::default())
    }

    fn make_fsm() -> Fsm {
        Fsm::new(states::build_state_table(), StateId::Boot)
    }

    /// Started FSM in `Boot` with a valid, onboarded configuration.
    fn configured(needs_validation: bool) -> (Fsm, FsmContext) {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        ctx.config_valid = true;
        ctx.needs_validation = needs_validation;
        fsm.start(&mut ctx);
        (fsm, ctx)
    }

    /// Drive a configured FSM into `Operational` at `now_ms`.
    fn operational(now_ms: u64) -> (Fsm, FsmContext) {
        let (mut fsm, mut ctx) = configured(false);
        fsm.tick(&mut ctx);
        ctx.link = Link::Up;
        fsm.tick(&mut ctx);
        ctx.internet = Some(true);
        ctx.now_ms = now_ms;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Operational);
        ctx.take_requests();
        (fsm, ctx)
    }

    #[test]
    fn starts_in_boot() {
        let fsm = make_fsm();
        assert_eq!(fsm.current_state(), StateId::Boot);
        assert_eq!(fsm.state_name(), "Boot");
    }

    #[test]
    fn tick_increments_counter() {
        let mut fsm = Fsm::new(states::build_state_table(), StateId::SetupMode);
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.ticks_in_current_state(), 1);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.ticks_in_current_state(), 2);
    }

    #[test]
    fn boot_without_config_enters_setup() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::SetupMode);
        assert_eq!(ctx.take_requests().as_slice(), &[Request::StartAccessPoint]);
    }

    #[test]
    fn reset_held_at_boot_wipes_and_enters_setup() {
        let (mut fsm, mut ctx) = configured(false);
        ctx.reset_at_boot = true;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::SetupMode);
        assert_eq!(
            ctx.take_requests().as_slice(),
            &[Request::WipeStore, Request::StartAccessPoint]
        );
    }

    #[test]
    fn valid_config_detects_sensors_then_joins() {
        let (mut fsm, mut ctx) = configured(false);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Connecting);
        assert_eq!(
            ctx.take_requests().as_slice(),
            &[Request::DetectSensors, Request::BeginJoin]
        );
    }

    #[test]
    fn connecting_probes_once_link_is_up() {
        let (mut fsm, mut ctx) = configured(false);
        fsm.tick(&mut ctx);
        ctx.take_requests();

        ctx.link = Link::Joining;
        fsm.tick(&mut ctx);
        assert!(ctx.requests.is_empty());

        ctx.link = Link::Up;
        fsm.tick(&mut ctx);
        fsm.tick(&mut ctx);
        assert_eq!(ctx.take_requests().as_slice(), &[Request::ProbeInternet]);
        assert_eq!(fsm.current_state(), StateId::Connecting);
    }

    #[test]
    fn join_failure_falls_back_to_setup() {
        let (mut fsm, mut ctx) = configured(false);
        fsm.tick(&mut ctx);
        ctx.link = Link::Failed;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::SetupMode);
    }

    #[test]
    fn no_internet_falls_back_to_setup() {
        let (mut fsm, mut ctx) = configured(false);
        fsm.tick(&mut ctx);
        ctx.link = Link::Up;
        fsm.tick(&mut ctx);
        ctx.internet = Some(false);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::SetupMode);
    }

    #[test]
    fn first_connection_goes_through_validation() {
        let (mut fsm, mut ctx) = configured(true);
        fsm.tick(&mut ctx);
        ctx.link = Link::Up;
        fsm.tick(&mut ctx);
        ctx.internet = Some(true);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Validating);
        assert_eq!(ctx.requests.last(), Some(&Request::Validate));

        ctx.take_requests();
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Validating);

        ctx.validation = Some(true);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Operational);
        assert_eq!(ctx.requests[0], Request::MarkOnboarded);
    }

    #[test]
    fn rejected_validation_returns_to_setup() {
        let (mut fsm, mut ctx) = configured(true);
        fsm.tick(&mut ctx);
        ctx.link = Link::Up;
        fsm.tick(&mut ctx);
        ctx.internet = Some(true);
        fsm.tick(&mut ctx);
        ctx.validation = Some(false);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::SetupMode);
        assert!(!ctx.requests.contains(&Request::MarkOnboarded));
    }

    #[test]
    fn operational_entry_starts_channel_and_reports() {
        let (mut fsm, mut ctx) = configured(false);
        fsm.tick(&mut ctx);
        ctx.link = Link::Up;
        fsm.tick(&mut ctx);
        ctx.take_requests();
        ctx.internet = Some(true);
        fsm.tick(&mut ctx);
        assert_eq!(
            ctx.take_requests().as_slice(),
            &[
                Request::StartControlChannel,
                Request::ReportHardwareHealth,
                Request::ReportStatus
            ]
        );
    }

    #[test]
    fn heartbeat_only_with_session_and_on_interval() {
        let (mut fsm, mut ctx) = operational(1_000);
        fsm.tick(&mut ctx);
        assert!(ctx.take_requests().is_empty());

        ctx.control_connected = true;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.take_requests().as_slice(), &[Request::PublishHeartbeat]);

        ctx.now_ms += u64::from(ctx.config.heartbeat_interval_ms) - 1;
        fsm.tick(&mut ctx);
        assert!(ctx.take_requests().is_empty());

        ctx.now_ms += 1;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.take_requests().as_slice(), &[Request::PublishHeartbeat]);
    }

    #[test]
    fn telemetry_windows_follow_open_valves() {
        let (mut fsm, mut ctx) = operational(1_000);
        let window = u64::from(ctx.config.telemetry_interval_ms);

        fsm.tick(&mut ctx);
        assert!(ctx.take_requests().is_empty());

        ctx.active_valves = 1;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.take_requests().as_slice(), &[Request::ResetFlowWindow]);

        ctx.now_ms += window;
        fsm.tick(&mut ctx);
        assert_eq!(
            ctx.take_requests().as_slice(),
            &[Request::SampleTelemetry { window_ms: window }]
        );

        ctx.active_valves = 0;
        ctx.now_ms += window;
        fsm.tick(&mut ctx);
        assert!(ctx.take_requests().is_empty());
        assert_eq!(ctx.flow_window_start_ms, None);
    }

    #[test]
    fn periodic_status_update() {
        let (mut fsm, mut ctx) = operational(1_000);
        ctx.now_ms += u64::from(ctx.config.status_interval_ms);
        fsm.tick(&mut ctx);
        assert_eq!(ctx.take_requests().as_slice(), &[Request::ReportStatus]);
    }

    #[test]
    fn lost_link_rejoins_after_backoff() {
        let (mut fsm, mut ctx) = operational(1_000);
        let backoff = u64::from(ctx.config.rejoin_backoff_ms);

        ctx.link = Link::Down;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.link_lost_at_ms, Some(1_000));
        assert!(ctx.take_requests().is_empty());

        ctx.now_ms += backoff - 1;
        fsm.tick(&mut ctx);
        assert!(ctx.take_requests().is_empty());

        ctx.now_ms += 1;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.take_requests().as_slice(), &[Request::Rejoin]);
        assert_eq!(fsm.current_state(), StateId::Operational);

        ctx.link = Link::Joining;
        ctx.now_ms += backoff * 3;
        fsm.tick(&mut ctx);
        assert!(ctx.take_requests().is_empty());

        ctx.link = Link::Up;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.link_lost_at_ms, None);
    }

    #[test]
    fn reset_press_in_operational_wipes_and_restarts() {
        let (mut fsm, mut ctx) = operational(1_000);
        ctx.reset_pressed = true;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::SetupMode);
        assert_eq!(
            ctx.take_requests().as_slice(),
            &[
                Request::WipeStore,
                Request::Restart,
                Request::StopControlChannel,
                Request::StartAccessPoint
            ]
        );
    }

    #[test]
    fn setup_restarts_after_credentials_saved() {
        let mut fsm = Fsm::new(states::build_state_table(), StateId::SetupMode);
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        ctx.take_requests();

        ctx.now_ms = 5_000;
        ctx.credentials_saved_at = Some(5_000);
        fsm.tick(&mut ctx);
        assert!(ctx.take_requests().is_empty());

        ctx.now_ms += u64::from(ctx.config.restart_delay_ms);
        fsm.tick(&mut ctx);
        assert_eq!(ctx.take_requests().as_slice(), &[Request::Restart]);
        assert_eq!(ctx.credentials_saved_at, None);
    }

    #[test]
    fn force_transition_calls_enter_and_exit() {
        let (mut fsm, mut ctx) = operational(1_000);
        fsm.force_transition(StateId::SetupMode, &mut ctx);
        assert_eq!(
            ctx.take_requests().as_slice(),
            &[Request::StopControlChannel, Request::StartAccessPoint]
        );
        fsm.force_transition(StateId::SetupMode, &mut ctx);
        assert!(ctx.requests.is_empty());
    }

    #[test]
    fn entered_ms_tracks_transitions() {
        let (fsm, mut ctx) = operational(7_500);
        assert_eq!(fsm.current_state(), StateId::Operational);
        ctx.now_ms = 9_000;
        assert_eq!(ctx.ms_in_state(), 1_500);
    }

    #[test]
    fn state_id_from_index_roundtrip() {
        for i in 0..StateId::COUNT {
            let id = StateId::from_index(i);
            assert_eq!(id as usize, i);
        }
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn state_id_from_invalid_index_returns_setup() {
        let id = StateId::from_index(99);
        assert_eq!(id, StateId::SetupMode);
    }
}
