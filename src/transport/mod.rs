//! Device transports
//!
//! The signing core only needs one synchronous request/response call. USB
//! framing, timeouts and disconnects are the transport's business.

pub mod hid;

pub use hid::{list_ledger_devices, HidTransport, LedgerDeviceInfo};

use crate::apdu::ApduCommand;
use crate::errors::DeviceCommunicationError;

/// Sends one command and waits for exactly one response.
pub trait DeviceTransport: Send {
    /// Exchange a single APDU. On success the returned bytes are the response
    /// data with the status word already checked and stripped.
    fn exchange(&mut self, command: &ApduCommand) -> Result<Vec<u8>, DeviceCommunicationError>;
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for Box<T> {
    fn exchange(&mut self, command: &ApduCommand) -> Result<Vec<u8>, DeviceCommunicationError> {
        (**self).exchange(command)
    }
}
