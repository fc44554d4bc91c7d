//! Unified error types for the Green Mesh firmware.
//!
//! Every subsystem has its own small `Copy` error enum; all of them convert
//! into the top-level [`Error`] so the bootstrap code in `main` can funnel
//! failures through one type (and from there into `anyhow`).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Persistent storage failed.
    Storage(StorageError),
    /// A GPIO or ADC operation failed.
    Gpio(GpioError),
    /// An HTTP or MQTT exchange failed.
    Transport(TransportError),
    /// Joining a network or starting the access point failed.
    Connectivity(ConnectivityError),
    /// A remote control message was rejected.
    Control(ControlError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Gpio(e) => write!(f, "gpio: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Connectivity(e) => write!(f, "connectivity: {e}"),
            Self::Control(e) => write!(f, "control: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Stored bytes could not be decoded.
    Corrupted,
    /// Generic I/O error from the backend.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::Corrupted => write!(f, "stored value corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// GPIO errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    /// Pin direction / pull configuration was rejected.
    ConfigFailed,
    /// Level write was rejected by the driver.
    WriteFailed,
    /// ADC conversion failed or timed out.
    AdcReadFailed,
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigFailed => write!(f, "pin configuration failed"),
            Self::WriteFailed => write!(f, "GPIO write failed"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
        }
    }
}

impl From<GpioError> for Error {
    fn from(e: GpioError) -> Self {
        Self::Gpio(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors (HTTP / MQTT)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No route to the remote end (link down, DNS failure).
    Unreachable,
    /// The request did not complete within its timeout.
    Timeout,
    /// The session is not connected.
    NotConnected,
    /// The request body could not be encoded.
    Encode,
    /// The underlying client returned an error.
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "remote unreachable"),
            Self::Timeout => write!(f, "request timed out"),
            Self::NotConnected => write!(f, "session not connected"),
            Self::Encode => write!(f, "body encoding failed"),
            Self::Io => write!(f, "transport I/O error"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// SSID empty, too long, or not printable ASCII.
    InvalidSsid,
    /// Passphrase length is not valid for WPA2.
    InvalidPassphrase,
    /// The radio driver rejected the request.
    RadioFailed,
    /// The join poll bound was exhausted.
    JoinTimeout,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassphrase => {
                write!(f, "passphrase invalid (must be 8-64 bytes, or empty for open)")
            }
            Self::RadioFailed => write!(f, "radio operation failed"),
            Self::JoinTimeout => write!(f, "join timed out"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Control errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// Payload is not the expected JSON document.
    Malformed,
    /// `action` is neither `"on"` nor `"off"`.
    UnknownAction,
    /// Channel index is outside the permitted range.
    OutOfRange(i64),
    /// The channel could not be driven.
    DriveFailed,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed control payload"),
            Self::UnknownAction => write!(f, "unknown action"),
            Self::OutOfRange(n) => write!(f, "channel {n} out of range"),
            Self::DriveFailed => write!(f, "channel drive failed"),
        }
    }
}

impl From<ControlError> for Error {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}
