//! EIP-2645 derivation paths
//!
//! Starknet keys live under `m/2645'/layer'/application'/eth_1'/eth_2'/index`.
//! Paths are parsed once into a fixed six-element array and encoded as
//! concatenated big-endian `u32`s, which is the argument format the Ledger app
//! expects.

use std::fmt;
use std::str::FromStr;

use crate::constants::{EIP_2645_PATH_LENGTH, EIP_2645_PURPOSE, HARDENED, PATH_ELEMENT_SIZE};
use crate::errors::PathError;

/// A validated six-level derivation path.
///
/// Elements are stored with the hardened bit already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivationPath([u32; EIP_2645_PATH_LENGTH]);

impl DerivationPath {
    /// Parse a path string such as `m/2645'/1195502025'/1470455285'/0'/0'/0`.
    ///
    /// Checks run in a fixed order: empty input, element count, then purpose.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let elements = strip_root(path)
            .split('/')
            .map(parse_element)
            .collect::<Result<Vec<u32>, PathError>>()?;

        let elements: [u32; EIP_2645_PATH_LENGTH] =
            elements
                .try_into()
                .map_err(|rejected: Vec<u32>| PathError::WrongLength {
                    expected: EIP_2645_PATH_LENGTH,
                    actual: rejected.len(),
                })?;

        if elements[0] != EIP_2645_PURPOSE {
            return Err(PathError::WrongPurpose);
        }

        Ok(Self(elements))
    }

    /// Raw element values, hardened bit included
    pub fn elements(&self) -> &[u32; EIP_2645_PATH_LENGTH] {
        &self.0
    }

    /// Serialize in the format used by the device app
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EIP_2645_PATH_LENGTH * PATH_ELEMENT_SIZE);
        for element in &self.0 {
            out.extend_from_slice(&element.to_be_bytes());
        }
        out
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for element in &self.0 {
            if element & HARDENED != 0 {
                write!(f, "/{}'", element & !HARDENED)?;
            } else {
                write!(f, "/{}", element)?;
            }
        }
        Ok(())
    }
}

/// Drop the conventional root marker, written `m/` or just `/`
fn strip_root(path: &str) -> &str {
    path.strip_prefix("m/")
        .or_else(|| path.strip_prefix('/'))
        .unwrap_or(path)
}

fn parse_element(part: &str) -> Result<u32, PathError> {
    let (digits, hardened) = match part.strip_suffix('\'') {
        Some(digits) => (digits, true),
        None => (part, false),
    };

    let index: u32 = digits
        .parse()
        .map_err(|_| PathError::InvalidIndex(part.to_string()))?;

    if hardened {
        if index & HARDENED != 0 {
            return Err(PathError::InvalidIndex(part.to_string()));
        }
        Ok(index | HARDENED)
    } else {
        Ok(index)
    }
}
