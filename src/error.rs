//! Error types for account operations.
//!
//! Provides strongly-typed errors for configuration, signing, tracker and
//! relayer operations using `thiserror`.

use ethers::types::{Address, H256};
use thiserror::Error;

/// Errors that can occur while building, signing or updating an account.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Configuration is structurally invalid or unsatisfiable
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// Collected signer weight does not reach the threshold
    #[error("Insufficient weight: {required} required, {provided} provided")]
    InsufficientWeight { required: u64, provided: u64 },

    /// Checkpoint of a configuration update does not strictly increase
    #[error("Stale checkpoint: next {next} must be greater than current {current}")]
    StaleCheckpoint { current: u32, next: u32 },

    /// Signature could not be recovered or does not match the config
    #[error("Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    /// The orchestrator produced no signature parts at all
    #[error("No signatures collected")]
    NoSignatures,

    #[error("Unknown wallet {0:?}")]
    UnknownWallet(Address),

    #[error("Unknown image hash {0:?}")]
    UnknownImageHash(H256),

    #[error("No wallet context for version {0}")]
    UnknownContext(u16),

    #[error("Unknown network with chain id {0}")]
    UnknownNetwork(u64),

    #[error("No relayer configured for chain id {0}")]
    MissingRelayer(u64),

    /// Network/RPC error
    #[error("Network error: {reason}")]
    NetworkError { reason: String },

    /// Cryptographic operation failed
    #[error("Crypto error: {reason}")]
    CryptoError { reason: String },

    /// Invalid input parameters
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "remote")]
impl From<reqwest::Error> for AccountError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkError { reason: e.to_string() }
    }
}

/// Result type alias for account operations.
pub type Result<T> = core::result::Result<T, AccountError>;
