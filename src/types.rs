use std::fmt;

use primitive_types::U256;
use serde::{Serialize, Serializer};

use crate::errors::{LedgerError, Result};

/// Stark curve signature returned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Signature {
    #[serde(serialize_with = "serialize_u256_hex")]
    pub r: U256,
    #[serde(serialize_with = "serialize_u256_hex")]
    pub s: U256,
}

impl Signature {
    pub fn new(r: U256, s: U256) -> Self {
        Self { r, s }
    }

    /// `[r, s]`, the list form transaction payloads carry
    pub fn to_vec(&self) -> Vec<U256> {
        vec![self.r, self.s]
    }
}

/// Version of the Starknet app running on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AppVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl AppVersion {
    pub fn to_semver(&self) -> semver::Version {
        semver::Version::new(self.major.into(), self.minor.into(), self.patch.into())
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

pub fn serialize_u256_hex<S: Serializer>(value: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:#x}", value))
}

/// Parse a felt given as `0x`-prefixed hex or as decimal
pub fn parse_u256(value: &str) -> Result<U256> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) if !digits.is_empty() => U256::from_str_radix(digits, 16).ok(),
        None if !value.is_empty() => U256::from_dec_str(value).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| LedgerError::InvalidFelt(format!("{:?}", value)))
}
