//! Inbound control messages and topic layout.
//!
//! Payload schema: `{"valve_number": <int>, "action": "on" | "off"}`.
//! Unknown fields are ignored; anything else is rejected.

use serde::Deserialize;

use crate::config::MAX_VALVES;
use crate::error::ControlError;

pub type Topic = heapless::String<128>;

#[derive(Debug, Deserialize)]
struct RawMessage {
    valve_number: i64,
    action: heapless::String<16>,
}

/// A validated valve command.  `valve` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub valve: u8,
    pub open: bool,
}

impl ControlMessage {
    /// Parse and range-check a payload against the board's valve count.
    /// Whether the valve was actually detected is checked at actuation.
    pub fn parse(payload: &[u8]) -> Result<Self, ControlError> {
        let raw: RawMessage =
            serde_json::from_slice(payload).map_err(|_| ControlError::Malformed)?;
        let open = match raw.action.as_str() {
            "on" => true,
            "off" => false,
            _ => return Err(ControlError::UnknownAction),
        };
        if raw.valve_number < 1 || raw.valve_number > MAX_VALVES as i64 {
            return Err(ControlError::OutOfRange(raw.valve_number));
        }
        Ok(Self {
            valve: raw.valve_number as u8,
            open,
        })
    }
}

/// Per-device topic pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub control: Topic,
    pub heartbeat: Topic,
}

impl Topics {
    /// `<base>/<account>/<device>/{control,heartbeat}`.  `None` if either
    /// topic would not fit.
    pub fn new(base: &str, account_id: &str, device_id: &str) -> Option<Self> {
        Some(Self {
            control: topic(base, account_id, device_id, "control")?,
            heartbeat: topic(base, account_id, device_id, "heartbeat")?,
        })
    }
}

fn topic(base: &str, account_id: &str, device_id: &str, leaf: &str) -> Option<Topic> {
    let mut t = Topic::new();
    for (i, part) in [base, account_id, device_id, leaf].iter().enumerate() {
        if i > 0 {
            t.push('/').ok()?;
        }
        t.push_str(part).ok()?;
    }
    Some(t)
}
