//! Fuzz target: `ControlMessage::parse`
//!
//! Arbitrary broker payloads must never panic, and anything accepted must
//! address a valve the board can have.
//!
//! cargo fuzz run fuzz_control_message

#![no_main]

use greenmesh::config::MAX_VALVES;
use greenmesh::control::message::ControlMessage;
use libfuzzer_sys::fuzz_target;

use critical_section as _;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = ControlMessage::parse(data) {
        assert!(msg.valve >= 1, "valve numbers are 1-based");
        assert!(usize::from(msg.valve) <= MAX_VALVES, "valve beyond the board");
    }
});
