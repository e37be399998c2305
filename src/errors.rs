use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(#[from] PathError),

    #[error("Unexpected response length (expected: {expected}, actual: {actual})")]
    UnexpectedResponseLength { expected: usize, actual: usize },

    #[error("Device communication error: {0}")]
    Device(#[from] DeviceCommunicationError),

    #[error("Hash does not fit the device payload once shifted by 4 bits")]
    HashOutOfRange,

    #[error("Not a 256-bit integer: {0}")]
    InvalidFelt(String),

    #[error("Invalid chain id: {0}")]
    InvalidChainId(String),

    #[error("Invalid APDU: {0}")]
    InvalidApdu(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons a derivation path string is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty derivation path")]
    Empty,

    #[error("Derivation path is not {expected}-level long (got {actual})")]
    WrongLength { expected: usize, actual: usize },

    #[error("Derivation path is not prefixed with m/2645.")]
    WrongPurpose,

    #[error("Invalid path element: {0}")]
    InvalidIndex(String),
}

/// Failures raised by a [`DeviceTransport`](crate::transport::DeviceTransport).
///
/// These are surfaced to callers untouched; nothing in this crate retries a
/// command after one of them.
#[derive(Error, Debug)]
pub enum DeviceCommunicationError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("No Ledger device found")]
    NoDevice,

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Timed out waiting for the device")]
    Timeout,

    #[error("Device returned status 0x{code:04X}: {description}")]
    Status { code: u16, description: String },

    #[error("Device session lock poisoned by a panicked caller")]
    SessionPoisoned,

    #[error("Transport is out of sync after an earlier failure ({0}), reopen the device")]
    Desynchronized(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
