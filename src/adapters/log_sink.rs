//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the logger
//! (UART / USB-CDC in production, stderr on the host).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => info!("START | initial_state={:?}", state),
            AppEvent::StateChanged { from, to } => info!("STATE | {:?} -> {:?}", from, to),
            AppEvent::SensorsDetected(cfg) => info!(
                "SENSORS | valves={} flow={} temp={}",
                cfg.valve_count,
                cfg.flow_sensor_count,
                if cfg.temperature_connected { "yes" } else { "no" },
            ),
            AppEvent::ValveChanged { valve, open } => {
                info!("VALVE | {} {}", valve, if *open { "open" } else { "closed" })
            }
            AppEvent::CredentialsSaved => info!("SETUP | credentials stored, restarting"),
            AppEvent::FactoryReset => warn!("RESET | store wiped"),
            AppEvent::LinkLost => warn!("LINK | station link lost"),
            AppEvent::ControlSessionUp => info!("CONTROL | broker session up"),
            AppEvent::Telemetry(t) => info!(
                "TELEM | valves={} flow={:?} L/min | T={:?}",
                t.active_valves, t.flow_rates, t.temperature_c,
            ),
        }
    }
}
