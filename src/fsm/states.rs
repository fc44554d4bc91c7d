//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.  Handlers only read inputs from the context
//! and queue [`Request`]s; the service performs the I/O after the tick and
//! feeds the results back as inputs for the next one.
//!
//! ```text
//!  BOOT ──[reset held / no config]──▶ SETUP_MODE ◀──────────────┐
//!    │                                                          │
//!  [config valid]                                   [join / probe failed]
//!    ▼                                                          │
//!  CONNECTING ──[online, needs validation]──▶ VALIDATING ──[rejected]
//!    │                                            │
//!  [online, onboarded]                        [accepted]
//!    ▼                                            ▼
//!  OPERATIONAL ◀──────────────────────────────────┘
//!
//!  Any state after BOOT ──[reset pressed]──▶ wipe + restart
//! ```

use super::context::{FsmContext, Link, Request};
use super::{StateDescriptor, StateId};
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Boot
        StateDescriptor {
            id: StateId::Boot,
            name: "Boot",
            on_enter: None,
            on_exit: None,
            on_update: boot_update,
        },
        // Index 1: SetupMode
        StateDescriptor {
            id: StateId::SetupMode,
            name: "SetupMode",
            on_enter: Some(setup_enter),
            on_exit: None,
            on_update: setup_update,
        },
        // Index 2: Connecting
        StateDescriptor {
            id: StateId::Connecting,
            name: "Connecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_update: connecting_update,
        },
        // Index 3: Validating
        StateDescriptor {
            id: StateId::Validating,
            name: "Validating",
            on_enter: Some(validating_enter),
            on_exit: None,
            on_update: validating_update,
        },
        // Index 4: Operational
        StateDescriptor {
            id: StateId::Operational,
            name: "Operational",
            on_enter: Some(operational_enter),
            on_exit: Some(operational_exit),
            on_update: operational_update,
        },
    ]
}

/// Manual reset after boot: wipe the store and restart.
fn reset_requested(ctx: &mut FsmContext) -> bool {
    if !ctx.reset_pressed {
        return false;
    }
    warn!("RESET: button pressed, wiping configuration and restarting");
    ctx.request(Request::WipeStore);
    ctx.request(Request::Restart);
    true
}

// ═══════════════════════════════════════════════════════════════════════════
//  BOOT
// ═══════════════════════════════════════════════════════════════════════════

fn boot_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.reset_at_boot {
        warn!("BOOT: reset held at power-up, wiping configuration");
        ctx.request(Request::WipeStore);
        return Some(StateId::SetupMode);
    }
    if !ctx.config_valid {
        info!("BOOT: no usable configuration stored");
        return Some(StateId::SetupMode);
    }
    ctx.request(Request::DetectSensors);
    Some(StateId::Connecting)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SETUP_MODE: access point + captive portal, waiting for credentials
// ═══════════════════════════════════════════════════════════════════════════

fn setup_enter(ctx: &mut FsmContext) {
    info!("SETUP: starting access point '{}'", ctx.config.access_point.ssid);
    ctx.request(Request::StartAccessPoint);
}

fn setup_update(ctx: &mut FsmContext) -> Option<StateId> {
    if reset_requested(ctx) {
        return None;
    }
    if let Some(saved_at) = ctx.credentials_saved_at {
        if ctx.now_ms.saturating_sub(saved_at) >= u64::from(ctx.config.restart_delay_ms) {
            info!("SETUP: restarting into the new configuration");
            ctx.credentials_saved_at = None;
            ctx.request(Request::Restart);
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING: join, then probe reachability
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut FsmContext) {
    ctx.internet = None;
    ctx.probe_requested = false;
    ctx.request(Request::BeginJoin);
}

fn connecting_update(ctx: &mut FsmContext) -> Option<StateId> {
    if reset_requested(ctx) {
        return Some(StateId::SetupMode);
    }
    match ctx.link {
        Link::Failed => {
            warn!("CONNECTING: join failed, falling back to setup");
            Some(StateId::SetupMode)
        }
        Link::Up if !ctx.probe_requested => {
            ctx.probe_requested = true;
            ctx.request(Request::ProbeInternet);
            None
        }
        Link::Up => match ctx.internet {
            Some(true) if ctx.needs_validation => Some(StateId::Validating),
            Some(true) => Some(StateId::Operational),
            Some(false) => {
                warn!("CONNECTING: no internet access, falling back to setup");
                Some(StateId::SetupMode)
            }
            None => None,
        },
        Link::Down | Link::Joining => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  VALIDATING: one-shot backend onboarding check
// ═══════════════════════════════════════════════════════════════════════════

fn validating_enter(ctx: &mut FsmContext) {
    ctx.validation = None;
    ctx.request(Request::Validate);
}

fn validating_update(ctx: &mut FsmContext) -> Option<StateId> {
    if reset_requested(ctx) {
        return Some(StateId::SetupMode);
    }
    match ctx.validation {
        Some(true) => {
            ctx.request(Request::MarkOnboarded);
            Some(StateId::Operational)
        }
        Some(false) => {
            warn!("VALIDATING: backend rejected the device");
            Some(StateId::SetupMode)
        }
        None => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPERATIONAL: remote control, heartbeats, telemetry
// ═══════════════════════════════════════════════════════════════════════════

fn operational_enter(ctx: &mut FsmContext) {
    ctx.last_heartbeat_ms = None;
    ctx.flow_window_start_ms = None;
    ctx.link_lost_at_ms = None;
    ctx.last_status_ms = Some(ctx.now_ms);
    ctx.request(Request::StartControlChannel);
    ctx.request(Request::ReportHardwareHealth);
    ctx.request(Request::ReportStatus);
    info!("OPERATIONAL: accepting remote commands");
}

fn operational_exit(ctx: &mut FsmContext) {
    ctx.request(Request::StopControlChannel);
}

fn operational_update(ctx: &mut FsmContext) -> Option<StateId> {
    if reset_requested(ctx) {
        return Some(StateId::SetupMode);
    }

    if ctx.link != Link::Up {
        // Nothing is reported while offline; the window restarts on return.
        ctx.flow_window_start_ms = None;
        if ctx.link != Link::Joining {
            match ctx.link_lost_at_ms {
                None => ctx.link_lost_at_ms = Some(ctx.now_ms),
                Some(lost_at)
                    if ctx.now_ms.saturating_sub(lost_at)
                        >= u64::from(ctx.config.rejoin_backoff_ms) =>
                {
                    info!("OPERATIONAL: re-joining network");
                    ctx.link_lost_at_ms = None;
                    ctx.request(Request::Rejoin);
                }
                Some(_) => {}
            }
        }
        return None;
    }
    ctx.link_lost_at_ms = None;

    if ctx.control_connected && ctx.due(ctx.last_heartbeat_ms, ctx.config.heartbeat_interval_ms) {
        ctx.last_heartbeat_ms = Some(ctx.now_ms);
        ctx.request(Request::PublishHeartbeat);
    }

    if ctx.active_valves > 0 {
        match ctx.flow_window_start_ms {
            None => {
                ctx.flow_window_start_ms = Some(ctx.now_ms);
                ctx.request(Request::ResetFlowWindow);
            }
            Some(start)
                if ctx.now_ms.saturating_sub(start)
                    >= u64::from(ctx.config.telemetry_interval_ms) =>
            {
                ctx.flow_window_start_ms = Some(ctx.now_ms);
                ctx.request(Request::SampleTelemetry {
                    window_ms: ctx.now_ms - start,
                });
            }
            Some(_) => {}
        }
    } else {
        ctx.flow_window_start_ms = None;
    }

    if ctx.due(ctx.last_status_ms, ctx.config.status_interval_ms) {
        ctx.last_status_ms = Some(ctx.now_ms);
        ctx.request(Request::ReportStatus);
    }

    None
}
