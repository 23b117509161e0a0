//! In-memory tracker.
//!
//! Validates every update before storing it: presigned updates must raise
//! the checkpoint and carry a valid signature of the wallet's current config,
//! witnesses must be valid signatures of the current config.

use std::collections::HashMap;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::WalletConfig;
use crate::context::WalletContext;
use crate::error::{AccountError, Result};
use crate::signature::{hash_set_image_hash, PinnedResolver, WalletResolver, CHAIN_AGNOSTIC};
use crate::tracker::{
    ConfigTracker, CounterfactualWallet, PresignedConfigLink, PresignedConfigUpdate, Witness,
};

#[derive(Default)]
struct TrackerState {
    configs: HashMap<H256, WalletConfig>,
    wallets: HashMap<Address, CounterfactualWallet>,
    /// Update chain per wallet, oldest first
    updates: HashMap<Address, Vec<PresignedConfigLink>>,
    witnesses: HashMap<Address, Vec<Witness>>,
}

impl TrackerState {
    fn current_image_hash(&self, wallet: &Address) -> Option<H256> {
        let counterfactual = self.wallets.get(wallet)?;
        let latest = self
            .updates
            .get(wallet)
            .and_then(|links| links.last())
            .map(|link| link.next_image_hash);
        Some(latest.unwrap_or(counterfactual.image_hash))
    }

    fn current_config(&self, wallet: &Address) -> Result<(H256, &WalletConfig)> {
        let image_hash = self
            .current_image_hash(wallet)
            .ok_or(AccountError::UnknownWallet(*wallet))?;
        let config = self
            .configs
            .get(&image_hash)
            .ok_or(AccountError::UnknownImageHash(image_hash))?;
        Ok((image_hash, config))
    }
}

impl WalletResolver for TrackerState {
    fn controls(&self, wallet: &Address, image_hash: H256) -> bool {
        self.current_image_hash(wallet) == Some(image_hash)
    }
}

/// Accepts any image hash a wallet has held along its update chain.
///
/// Signer wallets nested in a stored update may have moved on since the
/// update was signed.
struct HistoricResolver<'a>(&'a TrackerState);

impl WalletResolver for HistoricResolver<'_> {
    fn controls(&self, wallet: &Address, image_hash: H256) -> bool {
        let state = self.0;
        let Some(counterfactual) = state.wallets.get(wallet) else {
            return false;
        };
        counterfactual.image_hash == image_hash
            || state
                .updates
                .get(wallet)
                .map(|links| links.iter().any(|l| l.next_image_hash == image_hash))
                .unwrap_or(false)
    }
}

/// Thread-safe tracker kept entirely in process memory.
#[derive(Default)]
pub struct MemoryTracker {
    state: RwLock<TrackerState>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image hash at the tip of the wallet's update chain.
    pub async fn current_image_hash(&self, wallet: Address) -> Option<H256> {
        self.state.read().await.current_image_hash(&wallet)
    }

    /// Re-check every stored update of `wallet` against the config it moved
    /// away from. Nested signer wallets are accepted at any config they
    /// held. Returns the image hash at the tip of the chain.
    pub async fn verify_update_chain(&self, wallet: Address) -> Result<H256> {
        let state = self.state.read().await;
        let counterfactual = state
            .wallets
            .get(&wallet)
            .ok_or(AccountError::UnknownWallet(wallet))?;

        let historic = HistoricResolver(&state);
        let mut current = counterfactual.image_hash;
        for link in state.updates.get(&wallet).into_iter().flatten() {
            if link.from_image_hash != current {
                return Err(AccountError::InvalidSignature {
                    reason: format!("update chain broken at {:?}", link.from_image_hash),
                });
            }
            let resolver = PinnedResolver {
                inner: &historic,
                wallet,
                image_hash: current,
            };
            link.signature
                .verify(hash_set_image_hash(link.next_image_hash), &resolver)?;
            current = link.next_image_hash;
        }
        Ok(current)
    }
}

#[async_trait]
impl ConfigTracker for MemoryTracker {
    async fn save_wallet_config(&self, config: &WalletConfig) -> Result<()> {
        let image_hash = config.image_hash();
        self.state
            .write()
            .await
            .configs
            .entry(image_hash)
            .or_insert_with(|| config.clone());
        Ok(())
    }

    async fn config_of_image_hash(&self, image_hash: H256) -> Result<Option<WalletConfig>> {
        Ok(self.state.read().await.configs.get(&image_hash).cloned())
    }

    async fn save_counterfactual_wallet(
        &self,
        config: &WalletConfig,
        contexts: &[WalletContext],
    ) -> Result<()> {
        let image_hash = config.image_hash();
        let mut state = self.state.write().await;
        state.configs.entry(image_hash).or_insert_with(|| config.clone());

        for context in contexts {
            let address = context.address_of(image_hash);
            debug!(wallet = ?address, version = context.version, "saving counterfactual wallet");
            state.wallets.entry(address).or_insert_with(|| CounterfactualWallet {
                image_hash,
                context: context.clone(),
            });
        }
        Ok(())
    }

    async fn image_hash_of_counterfactual_wallet(
        &self,
        wallet: Address,
    ) -> Result<Option<CounterfactualWallet>> {
        Ok(self.state.read().await.wallets.get(&wallet).cloned())
    }

    async fn save_presigned_configuration(&self, update: &PresignedConfigUpdate) -> Result<()> {
        let wallet = update.wallet;
        let next_image_hash = update.next_image_hash();
        let mut state = self.state.write().await;

        let already_stored = state
            .updates
            .get(&wallet)
            .map(|links| links.iter().any(|l| l.next_image_hash == next_image_hash))
            .unwrap_or(false);
        if already_stored {
            return Ok(());
        }

        let (current_image_hash, current_config) = state.current_config(&wallet)?;
        if update.next_config.checkpoint <= current_config.checkpoint {
            return Err(AccountError::StaleCheckpoint {
                current: current_config.checkpoint,
                next: update.next_config.checkpoint,
            });
        }
        update.next_config.validate()?;

        if update.signature.wallet != wallet || update.signature.chain_id != CHAIN_AGNOSTIC {
            return Err(AccountError::InvalidSignature {
                reason: "presigned updates must be chain-agnostic signatures of the wallet".into(),
            });
        }
        let resolver = PinnedResolver {
            inner: &*state,
            wallet,
            image_hash: current_image_hash,
        };
        update
            .signature
            .verify(hash_set_image_hash(next_image_hash), &resolver)?;

        state
            .configs
            .entry(next_image_hash)
            .or_insert_with(|| update.next_config.clone());
        state.updates.entry(wallet).or_default().push(PresignedConfigLink {
            wallet,
            from_image_hash: current_image_hash,
            next_image_hash,
            signature: update.signature.clone(),
        });
        Ok(())
    }

    async fn presigned_configurations(
        &self,
        wallet: Address,
        from_image_hash: H256,
    ) -> Result<Vec<PresignedConfigLink>> {
        let state = self.state.read().await;
        let links = match state.updates.get(&wallet) {
            Some(links) => links,
            None => return Ok(Vec::new()),
        };

        let start = links
            .iter()
            .position(|l| l.from_image_hash == from_image_hash);
        Ok(match start {
            Some(i) => links[i..].to_vec(),
            None => Vec::new(),
        })
    }

    async fn save_witnesses(&self, witness: &Witness) -> Result<()> {
        let mut state = self.state.write().await;

        if witness.signature.wallet != witness.wallet || witness.signature.chain_id != witness.chain_id {
            return Err(AccountError::InvalidSignature {
                reason: "witness signature does not match wallet or chain".into(),
            });
        }
        witness.signature.verify(witness.digest, &*state)?;

        let stored = state.witnesses.entry(witness.wallet).or_default();
        if !stored.iter().any(|w| w.digest == witness.digest && w.chain_id == witness.chain_id) {
            stored.push(witness.clone());
        }
        Ok(())
    }

    async fn witnesses(&self, wallet: Address) -> Result<Vec<Witness>> {
        Ok(self
            .state
            .read()
            .await
            .witnesses
            .get(&wallet)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SignerLeaf, SimpleConfig};
    use crate::context::default_contexts;
    use crate::orchestrator::SignatureOrchestrator;
    use crate::signer::{LocalSigner, Signer};
    use std::sync::Arc;

    fn config(checkpoint: u32, signers: &[Address]) -> WalletConfig {
        SimpleConfig::new(1, checkpoint, signers.iter().map(|a| SignerLeaf::new(*a, 1)).collect()).into()
    }

    async fn setup() -> (MemoryTracker, Arc<LocalSigner>, Address, WalletConfig) {
        let tracker = MemoryTracker::new();
        let signer = Arc::new(LocalSigner::random());
        let config = config(1, &[signer.address()]);
        let contexts = default_contexts().unwrap();
        let ctx: Vec<WalletContext> = contexts.values().cloned().collect();
        tracker.save_counterfactual_wallet(&config, &ctx).await.unwrap();
        let wallet = contexts[&2].address_of(config.image_hash());
        (tracker, signer, wallet, config)
    }

    async fn presign(
        signer: Arc<LocalSigner>,
        wallet: Address,
        current: &WalletConfig,
        next: WalletConfig,
    ) -> PresignedConfigUpdate {
        let orchestrator = SignatureOrchestrator::new(vec![signer]);
        let signature = orchestrator
            .sign(wallet, current, hash_set_image_hash(next.image_hash()), CHAIN_AGNOSTIC)
            .await
            .unwrap();
        PresignedConfigUpdate { wallet, next_config: next, signature }
    }

    #[tokio::test]
    async fn test_counterfactual_lookup() {
        let (tracker, _signer, wallet, config) = setup().await;
        let found = tracker.image_hash_of_counterfactual_wallet(wallet).await.unwrap().unwrap();
        assert_eq!(found.image_hash, config.image_hash());
        assert_eq!(found.context.version, 2);
        assert_eq!(
            tracker.config_of_image_hash(config.image_hash()).await.unwrap(),
            Some(config)
        );
    }

    #[tokio::test]
    async fn test_presigned_update_chain() {
        let (tracker, signer, wallet, config) = setup().await;
        let other = LocalSigner::random();
        let next = self::config(2, &[signer.address(), other.address()]);

        let update = presign(signer.clone(), wallet, &config, next.clone()).await;
        tracker.save_presigned_configuration(&update).await.unwrap();
        // Saving twice is a no-op
        tracker.save_presigned_configuration(&update).await.unwrap();

        let links = tracker
            .presigned_configurations(wallet, config.image_hash())
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].next_image_hash, next.image_hash());
        assert_eq!(tracker.current_image_hash(wallet).await, Some(next.image_hash()));
        assert_eq!(tracker.verify_update_chain(wallet).await.unwrap(), next.image_hash());
    }

    #[tokio::test]
    async fn test_stale_checkpoint_rejected() {
        let (tracker, signer, wallet, config) = setup().await;
        let next = self::config(1, &[signer.address(), LocalSigner::random().address()]);

        let update = presign(signer, wallet, &config, next).await;
        let err = tracker.save_presigned_configuration(&update).await.unwrap_err();
        assert!(matches!(err, AccountError::StaleCheckpoint { current: 1, next: 1 }));
    }

    #[tokio::test]
    async fn test_update_signed_by_stranger_rejected() {
        let (tracker, signer, wallet, _config) = setup().await;
        let stranger = Arc::new(LocalSigner::random());
        let fake_current = self::config(1, &[stranger.address()]);
        let next = self::config(2, &[signer.address(), stranger.address()]);

        let update = presign(stranger, wallet, &fake_current, next).await;
        let err = tracker.save_presigned_configuration(&update).await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidSignature { .. }));
    }

    #[tokio::test]
    async fn test_unknown_wallet_rejected() {
        let tracker = MemoryTracker::new();
        let signer = Arc::new(LocalSigner::random());
        let current = config(1, &[signer.address()]);
        let next = config(2, &[signer.address()]);
        let update = presign(signer, Address::repeat_byte(9), &current, next).await;

        let err = tracker.save_presigned_configuration(&update).await.unwrap_err();
        assert!(matches!(err, AccountError::UnknownWallet(_)));
    }

    #[tokio::test]
    async fn test_witness_validated_and_deduplicated() {
        let (tracker, signer, wallet, config) = setup().await;
        let digest = H256::repeat_byte(0x77);
        let orchestrator = SignatureOrchestrator::new(vec![signer]);
        let signature = orchestrator.sign(wallet, &config, digest, 0).await.unwrap();

        let witness = Witness { wallet, digest, chain_id: 0, signature };
        tracker.save_witnesses(&witness).await.unwrap();
        tracker.save_witnesses(&witness).await.unwrap();
        assert_eq!(tracker.witnesses(wallet).await.unwrap().len(), 1);

        let mut forged = witness.clone();
        forged.digest = H256::repeat_byte(0x78);
        assert!(tracker.save_witnesses(&forged).await.is_err());
    }
}
