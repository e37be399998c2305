//! Starknet Ledger app commands
//!
//! Every command is a strict request/response pair validated against the
//! exact response shape the app produces. The transport lives behind a mutex:
//! a caller holds it for the whole command sequence, so the two phases of a
//! hash signature can never be interleaved with another caller's traffic.

use std::sync::{Mutex, MutexGuard};

use primitive_types::U256;

use crate::apdu::ApduCommand;
use crate::constants::{
    ins, p1, p2, FELT_SIZE, HASH_SHIFT_BITS, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH, VERSION_LENGTH,
};
use crate::derivation_path::DerivationPath;
use crate::errors::{DeviceCommunicationError, LedgerError, Result};
use crate::transport::DeviceTransport;
use crate::types::{AppVersion, Signature};

/// Client for the Starknet app on one device handle
pub struct LedgerStarknetApp<T> {
    session: Mutex<T>,
}

impl<T: DeviceTransport> LedgerStarknetApp<T> {
    pub fn new(transport: T) -> Self {
        Self {
            session: Mutex::new(transport),
        }
    }

    /// Get the app version.
    pub fn get_version(&self) -> Result<AppVersion> {
        let mut transport = self.lock()?;
        let response = exchange(
            &mut *transport,
            ApduCommand::new(ins::GET_VERSION, p1::DEFAULT, p2::DEFAULT, vec![]),
        )?;
        drop(transport);

        check_length(&response, VERSION_LENGTH)?;
        Ok(AppVersion {
            major: response[0],
            minor: response[1],
            patch: response[2],
        })
    }

    /// Get the public key for `path`.
    ///
    /// With `device_confirmation` the device displays the key and waits for
    /// the user before answering. The response shape is the same either way.
    pub fn get_public_key(&self, path: &DerivationPath, device_confirmation: bool) -> Result<U256> {
        let confirm = if device_confirmation {
            p1::CONFIRM_ON_DEVICE
        } else {
            p1::DEFAULT
        };

        log::info!("Requesting public key for {}", path);
        let mut transport = self.lock()?;
        let response = exchange(
            &mut *transport,
            ApduCommand::new(ins::GET_PUBLIC_KEY, confirm, p2::DEFAULT, path.encode()),
        )?;
        drop(transport);

        check_length(&response, PUBLIC_KEY_LENGTH)?;
        // Byte 0 is the point tag, x follows
        Ok(U256::from_big_endian(&response[1..1 + FELT_SIZE]))
    }

    /// Blind-sign a raw hash with the key at `path`.
    ///
    /// Runs both device phases under one lock. No partial result is returned:
    /// either a fully validated signature or an error.
    pub fn sign_hash(&self, path: &DerivationPath, hash: U256) -> Result<Signature> {
        let payload = encode_shifted_hash(hash)?;

        let _span = tracing::debug_span!("sign_hash", path = %path).entered();
        log::info!("✍️ Signing hash {:#x} with {}", hash, path);

        let session = SignSession {
            transport: self.lock()?,
        };
        session.register_path(path)?.sign(payload)
    }

    fn lock(&self) -> Result<MutexGuard<'_, T>> {
        self.session
            .lock()
            .map_err(|_| LedgerError::Device(DeviceCommunicationError::SessionPoisoned))
    }
}

/// Exclusive access to the device at the start of a signing flow
struct SignSession<'a, T> {
    transport: MutexGuard<'a, T>,
}

/// The device has the derivation path and expects the hash next
struct PathRegistered<'a, T> {
    transport: MutexGuard<'a, T>,
}

impl<'a, T: DeviceTransport> SignSession<'a, T> {
    fn register_path(mut self, path: &DerivationPath) -> Result<PathRegistered<'a, T>> {
        // The app acknowledges the path with no data worth checking
        exchange(
            &mut *self.transport,
            ApduCommand::new(ins::SIGN_HASH_SET_PATH, p1::DEFAULT, p2::DEFAULT, path.encode()),
        )?;
        log::debug!("Derivation path registered");
        Ok(PathRegistered {
            transport: self.transport,
        })
    }
}

impl<'a, T: DeviceTransport> PathRegistered<'a, T> {
    fn sign(mut self, payload: [u8; FELT_SIZE]) -> Result<Signature> {
        let response = exchange(
            &mut *self.transport,
            ApduCommand::new(ins::SIGN_HASH, p1::SIGN_HASH_FINAL, p2::DEFAULT, payload.to_vec()),
        )?;
        parse_signature(&response)
    }
}

fn exchange<T: DeviceTransport + ?Sized>(transport: &mut T, command: ApduCommand) -> Result<Vec<u8>> {
    log::debug!(
        "APDU ins=0x{:02X} p1=0x{:02X} p2=0x{:02X} data={}",
        command.ins,
        command.p1,
        command.p2,
        hex::encode(&command.data)
    );
    let response = transport.exchange(&command)?;
    log::debug!("APDU response {}", hex::encode(&response));
    Ok(response)
}

fn check_length(response: &[u8], expected: usize) -> Result<()> {
    if response.len() != expected {
        return Err(LedgerError::UnexpectedResponseLength {
            expected,
            actual: response.len(),
        });
    }
    Ok(())
}

/// The app reserves the low nibble, so the hash goes over the wire shifted
/// left by four bits as a 32-byte big-endian value.
pub fn encode_shifted_hash(hash: U256) -> Result<[u8; FELT_SIZE]> {
    if hash.bits() > 256 - HASH_SHIFT_BITS {
        return Err(LedgerError::HashOutOfRange);
    }
    let mut out = [0u8; FELT_SIZE];
    (hash << HASH_SHIFT_BITS).to_big_endian(&mut out);
    Ok(out)
}

/// `[len][r][s]` where `len` must equal the signature length
fn parse_signature(response: &[u8]) -> Result<Signature> {
    if response.len() != SIGNATURE_LENGTH + 1 || response[0] as usize != SIGNATURE_LENGTH {
        return Err(LedgerError::UnexpectedResponseLength {
            expected: SIGNATURE_LENGTH + 1,
            actual: response.len(),
        });
    }

    let r = U256::from_big_endian(&response[1..1 + FELT_SIZE]);
    let s = U256::from_big_endian(&response[1 + FELT_SIZE..1 + 2 * FELT_SIZE]);
    Ok(Signature { r, s })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shifted_hash_vector() {
        let hash = U256::from_str_radix(
            "2d6479c0758efbb5aa07d35ed5454d728637fceab7ba544d3ea95403a5630a8",
            16,
        )
        .unwrap();
        assert_eq!(
            hex::encode(encode_shifted_hash(hash).unwrap()),
            "2d6479c0758efbb5aa07d35ed5454d728637fceab7ba544d3ea95403a5630a80"
        );
    }

    #[test]
    fn test_shifted_small_hash() {
        let payload = encode_shifted_hash(U256::from(1u64)).unwrap();
        let mut expected = [0u8; FELT_SIZE];
        expected[31] = 0x10;
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_shift_rejects_oversized_hash() {
        let too_big = U256::one() << 252;
        assert!(matches!(encode_shifted_hash(too_big), Err(LedgerError::HashOutOfRange)));
        assert!(encode_shifted_hash(too_big - U256::one()).is_ok());
    }

    #[test]
    fn test_parse_signature_rejects_bad_tag() {
        let mut response = vec![0u8; SIGNATURE_LENGTH + 1];
        response[0] = 65;
        assert!(matches!(
            parse_signature(&response),
            Err(LedgerError::UnexpectedResponseLength { .. })
        ));
    }

    #[test]
    fn test_parse_signature_rejects_short_response() {
        assert!(matches!(
            parse_signature(&[SIGNATURE_LENGTH as u8]),
            Err(LedgerError::UnexpectedResponseLength { expected: 65, actual: 1 })
        ));
        assert!(parse_signature(&[]).is_err());
    }
}
