//! Starknet signer backed by a Ledger hardware device.
//!
//! The key never leaves the device. This crate encodes EIP-2645 derivation
//! paths, drives the Starknet app's APDU commands and validates every answer
//! before trusting it. Only blind signing of raw hashes is supported.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use starknet_ledger::{ChainId, HidTransport, LedgerSigner, LedgerStarknetApp, Signer};
//!
//! let transport = HidTransport::open(None, 30_000)?;
//! let app = Arc::new(LedgerStarknetApp::new(transport));
//! let signer = LedgerSigner::new(app, "m/2645'/1195502025'/1470455285'/0'/0'/0", ChainId::sepolia())?;
//! let public_key = signer.public_key()?;
//! ```

pub mod apdu;
pub mod app;
pub mod config;
pub mod constants;
pub mod derivation_path;
pub mod errors;
pub mod signer;
pub mod transport;
pub mod types;
pub mod version;

pub use app::LedgerStarknetApp;
pub use config::SignerConfig;
pub use derivation_path::DerivationPath;
pub use errors::{DeviceCommunicationError, LedgerError, PathError, Result};
pub use signer::{AccountTransaction, ChainId, LedgerSigner, Signer, TypedData};
pub use transport::{DeviceTransport, HidTransport};
pub use types::{AppVersion, Signature};

pub use primitive_types::U256;
