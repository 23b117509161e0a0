//! # sequence-account
//!
//! Weighted-threshold smart-contract wallets ("Sequence accounts").
//!
//! This crate builds and updates multisig wallet accounts: signer
//! configurations as flat lists or nested Merkle signer trees, deterministic
//! image hashes and counterfactual addresses, witness publication and
//! presigned configuration updates stored with a tracker.
//!
//! ## Features
//!
//! - **Signer Trees**: Nested weight/threshold nodes over a binary Merkle tree
//! - **Deterministic Addresses**: CREATE2 address from config image hash
//! - **Wallets as Signers**: Accounts sign for other accounts recursively
//! - **Presigned Updates**: Chain-agnostic `SetImageHash` signatures kept by a tracker
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sequence_account::{
//!     default_contexts, Account, AccountOptions, MemoryTracker, NetworkConfig,
//!     LocalSigner, Signer, SignatureOrchestrator, SignerLeaf, SimpleConfig,
//! };
//!
//! # async fn run() -> sequence_account::Result<()> {
//! let signer = Arc::new(LocalSigner::random());
//! let config = SimpleConfig::new(1, 1, vec![SignerLeaf::new(signer.address(), 1)]);
//!
//! let wallet = Account::new(AccountOptions {
//!     config: config.into(),
//!     tracker: Arc::new(MemoryTracker::new()),
//!     orchestrator: SignatureOrchestrator::new(vec![signer]),
//!     contexts: default_contexts()?,
//!     networks: vec![NetworkConfig::ethereum("https://nodes.sequence.app/mainnet", None)],
//! })
//! .await?;
//!
//! wallet.publish_witness().await?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod network;
pub mod orchestrator;
pub mod relayer;
pub mod settings;
pub mod signature;
pub mod signer;
pub mod tracker;
pub mod utils;

pub use account::{Account, AccountOptions, AccountSigner, AccountStatus};
pub use config::{SignerLeaf, SimpleConfig, Topology, WalletConfig};
pub use context::{address_of, default_contexts, VersionedContext, WalletContext};
pub use error::{AccountError, Result};
pub use network::{NativeToken, NetworkConfig, RelayerConfig};
pub use orchestrator::SignatureOrchestrator;
pub use signature::{hash_set_image_hash, subdigest_of, SignaturePart, WalletSignature};
pub use signer::{LocalSigner, Signer};
pub use tracker::{ConfigTracker, MemoryTracker, PresignedConfigUpdate, Witness};

#[cfg(feature = "remote")]
pub use tracker::RemoteTracker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
