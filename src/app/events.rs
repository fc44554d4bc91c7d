//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::fsm::StateId;
use crate::sensors::{FlowRates, SensorConfig};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A detection pass finished.
    SensorsDetected(SensorConfig),

    /// A remote command moved a valve.
    ValveChanged { valve: u8, open: bool },

    /// New credentials were stored; a restart follows.
    CredentialsSaved,

    /// The reset button wiped the store.
    FactoryReset,

    /// The station link dropped while operational.
    LinkLost,

    /// The broker session (re)connected.
    ControlSessionUp,

    /// One telemetry window was sampled.
    Telemetry(TelemetryData),
}

/// Flow and temperature sample sent while valves are open.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub active_valves: u8,
    pub flow_rates: FlowRates,
    pub temperature_c: Option<f32>,
}
