//! Wire-level constants of the Starknet Ledger app.
//!
//! These are a contract with the firmware running on the device and must not
//! change independently of it.

/// APDU class byte of the Starknet app
pub const STARKNET_CLA: u8 = 0x5A;

/// Ledger SAS USB vendor id
pub const LEDGER_VENDOR_ID: u16 = 0x2C97;

/// Hardened offset for BIP-32 derivation
pub const HARDENED: u32 = 0x8000_0000;

/// EIP-2645 purpose (`2645'`), stored in its hardened form
pub const EIP_2645_PURPOSE: u32 = HARDENED | 2645;

/// Number of elements in a Starknet derivation path
pub const EIP_2645_PATH_LENGTH: usize = 6;

/// Size of a single encoded path element
pub const PATH_ELEMENT_SIZE: usize = 4;

/// `major`, `minor`, `patch`
pub const VERSION_LENGTH: usize = 3;

/// Uncompressed point: tag byte followed by x and y
pub const PUBLIC_KEY_LENGTH: usize = 65;

/// r and s, 32 bytes each
pub const SIGNATURE_LENGTH: usize = 64;

/// Width of one big-endian felt on the wire
pub const FELT_SIZE: usize = 32;

/// Bits the device expects the signed hash to be shifted by
pub const HASH_SHIFT_BITS: usize = 4;

/// APDU instruction codes
pub mod ins {
    /// Query the app version. Also reused as the first sign-hash phase.
    pub const GET_VERSION: u8 = 0x00;
    /// Sign hash, phase 1: register the derivation path
    pub const SIGN_HASH_SET_PATH: u8 = 0x00;
    /// Get the public key for a derivation path
    pub const GET_PUBLIC_KEY: u8 = 0x01;
    /// Sign hash, phase 2: send the shifted hash
    pub const SIGN_HASH: u8 = 0x02;
}

/// P1 parameter constants
pub mod p1 {
    pub const DEFAULT: u8 = 0x00;
    /// Ask the device to display the public key before returning it
    pub const CONFIRM_ON_DEVICE: u8 = 0x01;
    /// Marks the sign-hash payload as the final chunk
    pub const SIGN_HASH_FINAL: u8 = 0x01;
}

/// P2 parameter constants
pub mod p2 {
    pub const DEFAULT: u8 = 0x00;
}

/// Status words returned by the device after each APDU
pub mod status {
    pub const OK: u16 = 0x9000;
    pub const DEVICE_LOCKED: u16 = 0x5515;
    pub const USER_REJECTED: u16 = 0x6985;
    pub const INVALID_DATA: u16 = 0x6A80;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const CLA_NOT_SUPPORTED: u16 = 0x6E00;
}
