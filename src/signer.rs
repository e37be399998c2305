//! Signer capability and its Ledger-backed implementation

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use primitive_types::U256;

use crate::app::LedgerStarknetApp;
use crate::derivation_path::DerivationPath;
use crate::errors::{LedgerError, Result};
use crate::transport::DeviceTransport;
use crate::types::{parse_u256, Signature};

/// Starknet chain identifier, a felt usually holding an ASCII short string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(U256);

impl ChainId {
    pub const MAINNET: &'static str = "SN_MAIN";
    pub const SEPOLIA: &'static str = "SN_SEPOLIA";
    /// Deprecated testnet, still accepted for old configurations
    pub const GOERLI: &'static str = "SN_GOERLI";

    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn mainnet() -> Self {
        Self::encode_short_string(Self::MAINNET)
    }

    pub fn sepolia() -> Self {
        Self::encode_short_string(Self::SEPOLIA)
    }

    pub fn goerli() -> Self {
        Self::encode_short_string(Self::GOERLI)
    }

    /// Encode an ASCII short string (at most 31 characters) as a felt
    pub fn from_short_string(name: &str) -> Result<Self> {
        if name.is_empty() || name.len() > 31 || !name.is_ascii() {
            return Err(LedgerError::InvalidChainId(format!(
                "{:?} is not a valid short string",
                name
            )));
        }
        Ok(Self::encode_short_string(name))
    }

    fn encode_short_string(name: &str) -> Self {
        Self(U256::from_big_endian(name.as_bytes()))
    }

    pub fn value(&self) -> U256 {
        self.0
    }
}

impl FromStr for ChainId {
    type Err = LedgerError;

    /// Accepts `mainnet`/`sepolia`/`goerli`, a short string such as `SN_MAIN`,
    /// or a numeric felt in hex or decimal.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => return Ok(Self::mainnet()),
            "sepolia" => return Ok(Self::sepolia()),
            "goerli" | "testnet" => return Ok(Self::goerli()),
            _ => {}
        }
        if s.starts_with("SN_") {
            return Self::from_short_string(s);
        }
        parse_u256(s)
            .map(Self)
            .map_err(|_| LedgerError::InvalidChainId(format!("{:?} is neither a known network nor a felt", s)))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A transaction that knows how to compute its own hash
pub trait AccountTransaction {
    fn calculate_hash(&self, chain_id: ChainId) -> U256;
}

/// Structured data with a message hash bound to an account
pub trait TypedData {
    fn message_hash(&self, account_address: U256) -> U256;
}

/// Anything able to produce Starknet signatures for one account key
pub trait Signer {
    /// Public key of the signing account
    fn public_key(&self) -> Result<U256>;

    fn sign_transaction(&self, transaction: &dyn AccountTransaction) -> Result<Signature>;

    fn sign_message(&self, typed_data: &dyn TypedData, account_address: U256) -> Result<Signature>;
}

/// Signer that keeps its key on a Ledger device
pub struct LedgerSigner<T> {
    app: Arc<LedgerStarknetApp<T>>,
    derivation_path: DerivationPath,
    chain_id: ChainId,
}

impl<T: DeviceTransport> LedgerSigner<T> {
    /// The path is parsed here so a bad path fails before any device traffic
    pub fn new(app: Arc<LedgerStarknetApp<T>>, derivation_path: &str, chain_id: ChainId) -> Result<Self> {
        let derivation_path = DerivationPath::parse(derivation_path)?;
        Ok(Self {
            app,
            derivation_path,
            chain_id,
        })
    }

    pub fn derivation_path(&self) -> &DerivationPath {
        &self.derivation_path
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn app(&self) -> &LedgerStarknetApp<T> {
        &self.app
    }
}

impl<T: DeviceTransport> Signer for LedgerSigner<T> {
    fn public_key(&self) -> Result<U256> {
        self.app.get_public_key(&self.derivation_path, false)
    }

    fn sign_transaction(&self, transaction: &dyn AccountTransaction) -> Result<Signature> {
        let tx_hash = transaction.calculate_hash(self.chain_id);
        self.app.sign_hash(&self.derivation_path, tx_hash)
    }

    fn sign_message(&self, typed_data: &dyn TypedData, account_address: U256) -> Result<Signature> {
        let msg_hash = typed_data.message_hash(account_address);
        self.app.sign_hash(&self.derivation_path, msg_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_chain_ids() {
        assert_eq!(
            ChainId::mainnet().value(),
            U256::from_str_radix("534e5f4d41494e", 16).unwrap()
        );
        assert_eq!(
            ChainId::sepolia().value(),
            U256::from_str_radix("534e5f5345504f4c4941", 16).unwrap()
        );
    }

    #[test]
    fn test_chain_id_from_str() {
        assert_eq!("mainnet".parse::<ChainId>().unwrap(), ChainId::mainnet());
        assert_eq!("SN_SEPOLIA".parse::<ChainId>().unwrap(), ChainId::sepolia());
        assert_eq!("0x534e5f4d41494e".parse::<ChainId>().unwrap(), ChainId::mainnet());
        assert!("not a chain".parse::<ChainId>().is_err());
    }

    #[test]
    fn test_chain_id_errors_name_the_chain_id() {
        assert!(matches!(
            "not a chain".parse::<ChainId>(),
            Err(LedgerError::InvalidChainId(_))
        ));
        assert!(matches!(
            format!("SN_{}", "A".repeat(29)).parse::<ChainId>(),
            Err(LedgerError::InvalidChainId(_))
        ));
    }

    #[test]
    fn test_short_string_limits() {
        assert!(ChainId::from_short_string("").is_err());
        assert!(ChainId::from_short_string(&"A".repeat(32)).is_err());
        assert!(ChainId::from_short_string(&"A".repeat(31)).is_ok());
    }
}
