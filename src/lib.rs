//! Green Mesh irrigation controller firmware library.
//!
//! Exposes the controller core (lifecycle FSM, connectivity, sensor
//! detection, backend client, remote control channel, configuration
//! store) for integration testing.  All ESP-IDF-specific code is guarded
//! by `#[cfg(target_os = "espidf")]` within each module; other targets
//! get simulated adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod network;
pub mod pins;
pub mod sensors;
pub mod storage;

#[cfg(all(test, not(target_os = "espidf")))]
use critical_section as _;
