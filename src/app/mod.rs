//! Application core: lifecycle orchestration over port traits.
//!
//! The business rules of the controller live here: the service that owns
//! every domain component and drives the lifecycle FSM.  All interaction
//! with hardware happens through the **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
