//! Inbound commands to the application service.
//!
//! Produced outside the control loop (the setup portal's HTTP handler
//! thread) and delivered through [`crate::events`].

/// Everything the setup portal collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: heapless::String<32>,
    pub passphrase: heapless::String<64>,
    pub account_id: heapless::String<64>,
    pub device_id: heapless::String<64>,
}

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Store new network and account identity, then restart into it.
    /// Only honoured in setup mode.
    SubmitCredentials(Credentials),
}
