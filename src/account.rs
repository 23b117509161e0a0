//! Accounts: counterfactual wallets driven by a tracker and an orchestrator.
//!
//! An account is identified by the CREATE2 address of its first
//! configuration. Its current configuration is the tip of the presigned
//! update chain stored with the tracker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use tracing::info;

use crate::config::WalletConfig;
use crate::context::{context_for, VersionedContext, WalletContext};
use crate::error::{AccountError, Result};
use crate::network::{network_for, NetworkConfig};
use crate::orchestrator::SignatureOrchestrator;
use crate::relayer::{bundle_digest, Call, DeployData, RelayReceipt, RelayRequest, Relayer};
use crate::signature::{hash_set_image_hash, SignaturePart, WalletSignature, CHAIN_AGNOSTIC};
use crate::signer::Signer;
use crate::tracker::{ConfigTracker, PresignedConfigLink, PresignedConfigUpdate, Witness};
use crate::utils::{keccak256, unix_millis};

/// Wallet version whose context derives new account addresses.
pub const WALLET_VERSION: u16 = 2;

/// Message prefix of witness digests.
const WITNESS_MESSAGE: &str = "This is a Sequence account woo!";

/// Everything needed to create an account.
pub struct AccountOptions {
    pub config: WalletConfig,
    pub tracker: Arc<dyn ConfigTracker>,
    pub orchestrator: SignatureOrchestrator,
    pub contexts: VersionedContext,
    pub networks: Vec<NetworkConfig>,
}

/// Snapshot of an account's configuration state.
#[derive(Clone, Debug, PartialEq)]
pub struct AccountStatus {
    pub address: Address,
    pub chain_id: u64,
    /// Image hash the address was derived from
    pub original: H256,
    pub context: WalletContext,
    /// Image hash at the tip of the update chain
    pub image_hash: H256,
    pub config: WalletConfig,
    pub presigned: Vec<PresignedConfigLink>,
}

impl AccountStatus {
    pub fn checkpoint(&self) -> u32 {
        self.config.checkpoint
    }

    /// Whether the current config differs from the one the wallet was created with.
    pub fn is_updated(&self) -> bool {
        self.original != self.image_hash
    }
}

/// A multisig wallet account.
pub struct Account {
    address: Address,
    tracker: Arc<dyn ConfigTracker>,
    orchestrator: SignatureOrchestrator,
    contexts: VersionedContext,
    networks: Vec<NetworkConfig>,
    relayers: HashMap<u64, Arc<dyn Relayer>>,
}

impl Account {
    /// Create a counterfactual account for `options.config`.
    ///
    /// Fails if the config is invalid or the orchestrator's signers cannot
    /// reach its threshold.
    pub async fn new(options: AccountOptions) -> Result<Self> {
        let AccountOptions {
            config,
            tracker,
            orchestrator,
            contexts,
            networks,
        } = options;

        config.validate()?;
        let reachable = orchestrator.reachable_weight(&config);
        if reachable < config.threshold as u64 {
            return Err(AccountError::InsufficientWeight {
                required: config.threshold as u64,
                provided: reachable,
            });
        }

        let image_hash = config.image_hash();
        let address = context_for(&contexts, WALLET_VERSION)?.address_of(image_hash);

        tracker.save_wallet_config(&config).await?;
        let all_contexts: Vec<WalletContext> = contexts.values().cloned().collect();
        tracker.save_counterfactual_wallet(&config, &all_contexts).await?;

        info!(wallet = ?address, image_hash = ?image_hash, threshold = config.threshold, "account created");

        Ok(Self::from_address(address, tracker, orchestrator, contexts, networks))
    }

    /// Account for a wallet whose configuration is already known to the tracker.
    pub fn from_address(
        address: Address,
        tracker: Arc<dyn ConfigTracker>,
        orchestrator: SignatureOrchestrator,
        contexts: VersionedContext,
        networks: Vec<NetworkConfig>,
    ) -> Self {
        Self {
            address,
            tracker,
            orchestrator,
            contexts,
            networks,
            relayers: HashMap::new(),
        }
    }

    /// Use `relayer` for `chain_id` instead of the network's configured one.
    pub fn with_relayer(mut self, chain_id: u64, relayer: Arc<dyn Relayer>) -> Self {
        self.relayers.insert(chain_id, relayer);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn networks(&self) -> &[NetworkConfig] {
        &self.networks
    }

    pub fn contexts(&self) -> &VersionedContext {
        &self.contexts
    }

    pub fn tracker(&self) -> &Arc<dyn ConfigTracker> {
        &self.tracker
    }

    pub fn network(&self, chain_id: u64) -> Result<&NetworkConfig> {
        network_for(&self.networks, chain_id)
    }

    /// Current configuration state on `chain_id` (0 for chain-agnostic).
    pub async fn status(&self, chain_id: u64) -> Result<AccountStatus> {
        if chain_id != CHAIN_AGNOSTIC {
            self.network(chain_id)?;
        }

        let counterfactual = self
            .tracker
            .image_hash_of_counterfactual_wallet(self.address)
            .await?
            .ok_or(AccountError::UnknownWallet(self.address))?;

        let presigned = self
            .tracker
            .presigned_configurations(self.address, counterfactual.image_hash)
            .await?;
        let image_hash = presigned
            .last()
            .map(|link| link.next_image_hash)
            .unwrap_or(counterfactual.image_hash);

        let config = self
            .tracker
            .config_of_image_hash(image_hash)
            .await?
            .ok_or(AccountError::UnknownImageHash(image_hash))?;

        Ok(AccountStatus {
            address: self.address,
            chain_id,
            original: counterfactual.image_hash,
            context: counterfactual.context,
            image_hash,
            config,
            presigned,
        })
    }

    /// Sign `digest` with the current quorum.
    pub async fn sign_digest(&self, digest: H256, chain_id: u64) -> Result<WalletSignature> {
        let status = self.status(chain_id).await?;
        self.orchestrator
            .sign(self.address, &status.config, digest, chain_id)
            .await
    }

    /// Sign a fresh witness digest with the current quorum and store it.
    pub async fn publish_witness(&self) -> Result<Witness> {
        let message = format!("{} {}", WITNESS_MESSAGE, unix_millis());
        let digest = keccak256(message.as_bytes());

        let signature = self.sign_digest(digest, CHAIN_AGNOSTIC).await?;
        if signature.parts.is_empty() {
            return Err(AccountError::NoSignatures);
        }

        let witness = Witness {
            wallet: self.address,
            digest,
            chain_id: CHAIN_AGNOSTIC,
            signature,
        };
        self.tracker.save_witnesses(&witness).await?;

        info!(
            wallet = ?self.address,
            image_hash = ?witness.signature.config.image_hash(),
            signers = witness.signature.parts.len(),
            "witness published"
        );
        Ok(witness)
    }

    /// Sign a move to `next` without storing it.
    pub async fn presign_config_update(&self, next: &WalletConfig) -> Result<PresignedConfigUpdate> {
        next.validate()?;
        let status = self.status(CHAIN_AGNOSTIC).await?;
        if next.checkpoint <= status.checkpoint() {
            return Err(AccountError::StaleCheckpoint {
                current: status.checkpoint(),
                next: next.checkpoint,
            });
        }

        let digest = hash_set_image_hash(next.image_hash());
        let signature = self
            .orchestrator
            .sign(self.address, &status.config, digest, CHAIN_AGNOSTIC)
            .await?;

        Ok(PresignedConfigUpdate {
            wallet: self.address,
            next_config: next.clone(),
            signature,
        })
    }

    /// Presign a move to `next` and store it with the tracker.
    pub async fn update_config(&self, next: &WalletConfig) -> Result<PresignedConfigUpdate> {
        let update = self.presign_config_update(next).await?;
        self.tracker.save_wallet_config(next).await?;
        self.tracker.save_presigned_configuration(&update).await?;

        info!(
            wallet = ?self.address,
            image_hash = ?update.next_image_hash(),
            checkpoint = next.checkpoint,
            "config updated"
        );
        Ok(update)
    }

    /// Apply a presigned update on `chain_id` through the network's relayer.
    ///
    /// The relayer deploys the wallet at the image hash its address was
    /// derived from, so the bundle moves through every stored link up to and
    /// including `update`, and is signed by that first config.
    pub async fn relay_config_update(
        &self,
        chain_id: u64,
        update: &PresignedConfigUpdate,
    ) -> Result<RelayReceipt> {
        if update.wallet != self.address {
            return Err(AccountError::InvalidInput {
                reason: format!("update belongs to {:?}", update.wallet),
            });
        }
        let relayer = self.relayer(chain_id)?;
        let status = self.status(chain_id).await?;

        let pending = pending_image_hashes(&status, update)?;
        let deployed = self
            .tracker
            .config_of_image_hash(status.original)
            .await?
            .ok_or(AccountError::UnknownImageHash(status.original))?;

        let calls: Vec<Call> = pending
            .iter()
            .map(|image_hash| Call::update_image_hash(self.address, *image_hash))
            .collect();
        let nonce = relayer.nonce(self.address).await?;
        let digest = bundle_digest(nonce, &calls);
        let signature = self
            .orchestrator
            .sign(self.address, &deployed, digest, chain_id)
            .await?;

        info!(wallet = ?self.address, chain_id, steps = calls.len(), "relaying config update");

        let request = RelayRequest {
            chain_id,
            wallet: self.address,
            nonce,
            calls,
            signature,
            deploy: Some(DeployData::new(&status.context, status.original)),
        };
        relayer.relay(&request).await
    }

    fn relayer(&self, chain_id: u64) -> Result<Arc<dyn Relayer>> {
        if let Some(relayer) = self.relayers.get(&chain_id) {
            return Ok(relayer.clone());
        }
        let network = self.network(chain_id)?;

        #[cfg(feature = "remote")]
        {
            Ok(Arc::new(crate::relayer::RpcRelayer::for_network(network)?))
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(AccountError::MissingRelayer(network.chain_id))
        }
    }

    /// This account as a signer of other wallets.
    pub fn signer(self: &Arc<Self>) -> AccountSigner {
        AccountSigner::new(self.clone())
    }
}

/// Image hashes the wallet moves through, after the one it was deployed
/// with, to land on `update`.
fn pending_image_hashes(status: &AccountStatus, update: &PresignedConfigUpdate) -> Result<Vec<H256>> {
    let from = update.signature.config.image_hash();
    let next = update.next_image_hash();

    let mut pending = Vec::new();
    for link in &status.presigned {
        pending.push(link.next_image_hash);
        if link.from_image_hash == from && link.next_image_hash == next {
            return Ok(pending);
        }
    }
    if from == status.image_hash {
        pending.push(next);
        return Ok(pending);
    }
    Err(AccountError::InvalidInput {
        reason: format!("update from {:?} does not extend the update chain of {:?}", from, status.address),
    })
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("orchestrator", &self.orchestrator)
            .field("networks", &self.networks.iter().map(|n| n.chain_id).collect::<Vec<_>>())
            .finish()
    }
}

/// Wraps an account so it can sign for wallets that list it as a signer.
///
/// Every signature uses the account's status at signing time, so updates of
/// the wrapped account are picked up.
#[derive(Clone, Debug)]
pub struct AccountSigner {
    account: Arc<Account>,
}

impl AccountSigner {
    pub fn new(account: Arc<Account>) -> Self {
        Self { account }
    }

    pub fn account(&self) -> &Arc<Account> {
        &self.account
    }
}

#[async_trait]
impl Signer for AccountSigner {
    fn address(&self) -> Address {
        self.account.address()
    }

    async fn sign_digest(&self, subdigest: H256, chain_id: u64) -> Result<SignaturePart> {
        let signature = self.account.sign_digest(subdigest, chain_id).await?;
        Ok(SignaturePart::wallet(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SignerLeaf, SimpleConfig};
    use crate::context::default_contexts;
    use crate::signer::LocalSigner;
    use crate::tracker::MemoryTracker;

    fn one_of(signers: &[Address], checkpoint: u32) -> WalletConfig {
        SimpleConfig::new(1, checkpoint, signers.iter().map(|a| SignerLeaf::new(*a, 1)).collect()).into()
    }

    async fn account_with(signer: Arc<LocalSigner>, tracker: Arc<MemoryTracker>) -> Account {
        Account::new(AccountOptions {
            config: one_of(&[signer.address()], 1),
            tracker,
            orchestrator: SignatureOrchestrator::new(vec![signer]),
            contexts: default_contexts().unwrap(),
            networks: vec![NetworkConfig::ethereum("http://localhost:8545", None)],
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_status_of_new_account() {
        let tracker = Arc::new(MemoryTracker::new());
        let signer = Arc::new(LocalSigner::random());
        let account = account_with(signer.clone(), tracker).await;

        let status = account.status(1).await.unwrap();
        assert_eq!(status.address, account.address());
        assert_eq!(status.checkpoint(), 1);
        assert!(!status.is_updated());
        assert!(status.presigned.is_empty());

        assert!(matches!(account.status(137).await, Err(AccountError::UnknownNetwork(137))));
    }

    #[tokio::test]
    async fn test_creation_requires_reachable_quorum() {
        let stranger = Arc::new(LocalSigner::random());
        let result = Account::new(AccountOptions {
            config: one_of(&[Address::repeat_byte(1)], 1),
            tracker: Arc::new(MemoryTracker::new()),
            orchestrator: SignatureOrchestrator::new(vec![stranger]),
            contexts: default_contexts().unwrap(),
            networks: vec![],
        })
        .await;
        assert!(matches!(
            result,
            Err(AccountError::InsufficientWeight { required: 1, provided: 0 })
        ));
    }

    #[tokio::test]
    async fn test_update_requires_higher_checkpoint() {
        let tracker = Arc::new(MemoryTracker::new());
        let signer = Arc::new(LocalSigner::random());
        let account = account_with(signer.clone(), tracker).await;

        let same = one_of(&[signer.address(), LocalSigner::random().address()], 1);
        assert!(matches!(
            account.update_config(&same).await,
            Err(AccountError::StaleCheckpoint { current: 1, next: 1 })
        ));
    }

    #[tokio::test]
    async fn test_relay_without_relayer() {
        let tracker = Arc::new(MemoryTracker::new());
        let signer = Arc::new(LocalSigner::random());
        let account = account_with(signer.clone(), tracker).await;

        let next = one_of(&[signer.address()], 2);
        let update = account.presign_config_update(&next).await.unwrap();
        assert!(matches!(
            account.relay_config_update(1, &update).await,
            Err(AccountError::MissingRelayer(1))
        ));
    }
}
