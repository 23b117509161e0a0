//! Configuration trackers.
//!
//! A tracker stores wallet configurations by image hash, counterfactual
//! wallets by address, presigned configuration updates and witnesses. The
//! in-memory tracker validates everything it stores; the remote tracker
//! forwards to a sessions service.

pub mod memory;
#[cfg(feature = "remote")]
pub mod remote;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::config::WalletConfig;
use crate::context::WalletContext;
use crate::error::Result;
use crate::signature::WalletSignature;

pub use memory::MemoryTracker;
#[cfg(feature = "remote")]
pub use remote::RemoteTracker;

/// Image hash and context a wallet address was derived from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterfactualWallet {
    pub image_hash: H256,
    pub context: WalletContext,
}

/// A signed move of `wallet` to `next_config`, stored for later application.
///
/// `signature` is a chain-agnostic signature by the wallet's config at the
/// time of signing over `hash_set_image_hash(next_config.image_hash())`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedConfigUpdate {
    pub wallet: Address,
    pub next_config: WalletConfig,
    pub signature: WalletSignature,
}

impl PresignedConfigUpdate {
    pub fn next_image_hash(&self) -> H256 {
        self.next_config.image_hash()
    }
}

/// One step of a wallet's presigned update chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedConfigLink {
    pub wallet: Address,
    pub from_image_hash: H256,
    pub next_image_hash: H256,
    pub signature: WalletSignature,
}

/// Published proof that a wallet's signers control it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Witness {
    pub wallet: Address,
    pub digest: H256,
    pub chain_id: u64,
    pub signature: WalletSignature,
}

/// Storage for configurations, counterfactual wallets and their updates.
#[async_trait]
pub trait ConfigTracker: Send + Sync {
    async fn save_wallet_config(&self, config: &WalletConfig) -> Result<()>;

    async fn config_of_image_hash(&self, image_hash: H256) -> Result<Option<WalletConfig>>;

    /// Record the wallet address of `config` under every context.
    async fn save_counterfactual_wallet(
        &self,
        config: &WalletConfig,
        contexts: &[WalletContext],
    ) -> Result<()>;

    async fn image_hash_of_counterfactual_wallet(
        &self,
        wallet: Address,
    ) -> Result<Option<CounterfactualWallet>>;

    async fn save_presigned_configuration(&self, update: &PresignedConfigUpdate) -> Result<()>;

    /// Updates of `wallet` that follow `from_image_hash`, oldest first.
    async fn presigned_configurations(
        &self,
        wallet: Address,
        from_image_hash: H256,
    ) -> Result<Vec<PresignedConfigLink>>;

    async fn save_witnesses(&self, witness: &Witness) -> Result<()>;

    async fn witnesses(&self, wallet: Address) -> Result<Vec<Witness>>;
}
