//! APDU command/answer framing

use crate::constants::{status, STARKNET_CLA};
use crate::errors::{DeviceCommunicationError, LedgerError, Result};

/// Largest payload expressible with a one-byte `Lc`
pub const MAX_SHORT_APDU_DATA: usize = 255;

/// A single command sent to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl ApduCommand {
    /// Build a command for the Starknet app
    pub fn new(ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla: STARKNET_CLA,
            ins,
            p1,
            p2,
            data,
        }
    }

    /// `CLA INS P1 P2 Lc DATA`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.data.len() > MAX_SHORT_APDU_DATA {
            return Err(LedgerError::InvalidApdu(format!(
                "payload of {} bytes exceeds {} bytes",
                self.data.len(),
                MAX_SHORT_APDU_DATA
            )));
        }

        let mut out = Vec::with_capacity(5 + self.data.len());
        out.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2, self.data.len() as u8]);
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

/// Raw reply from the device: response data followed by a status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduAnswer {
    data: Vec<u8>,
    status: u16,
}

impl ApduAnswer {
    pub fn from_bytes(mut raw: Vec<u8>) -> std::result::Result<Self, DeviceCommunicationError> {
        if raw.len() < 2 {
            return Err(DeviceCommunicationError::Framing(format!(
                "answer of {} bytes has no status word",
                raw.len()
            )));
        }
        let sw = raw.split_off(raw.len() - 2);
        Ok(Self {
            data: raw,
            status: u16::from_be_bytes([sw[0], sw[1]]),
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Response data if the device reported success, the status otherwise
    pub fn into_result(self) -> std::result::Result<Vec<u8>, DeviceCommunicationError> {
        if self.status == status::OK {
            Ok(self.data)
        } else {
            Err(DeviceCommunicationError::Status {
                code: self.status,
                description: describe_status(self.status).to_string(),
            })
        }
    }
}

pub fn describe_status(code: u16) -> &'static str {
    match code {
        status::OK => "Success",
        status::DEVICE_LOCKED => "Device is locked",
        status::USER_REJECTED => "Rejected by user",
        status::INVALID_DATA => "Invalid data",
        status::INS_NOT_SUPPORTED => "Instruction not supported (is the Starknet app open?)",
        status::CLA_NOT_SUPPORTED => "Class not supported (is the Starknet app open?)",
        _ => "Unknown status",
    }
}
