//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a slice of the
//! controller against the host simulations and recording mocks.  All tests
//! run on the host with no real hardware required.

// Host implementation for the embassy-sync channel statics.
use critical_section as _;

mod control_tests;
mod lifecycle_tests;
mod mock_hw;
mod store_tests;
