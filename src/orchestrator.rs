//! Signature collection across several signers.

use std::collections::BTreeSet;
use std::sync::Arc;

use ethers::types::{Address, H256};
use tracing::{debug, warn};

use crate::config::WalletConfig;
use crate::error::{AccountError, Result};
use crate::signature::WalletSignature;
use crate::signer::Signer;

/// Collects signature parts from a set of signers until a configuration's
/// threshold is met.
#[derive(Clone, Default)]
pub struct SignatureOrchestrator {
    signers: Vec<Arc<dyn Signer>>,
}

impl SignatureOrchestrator {
    pub fn new(signers: Vec<Arc<dyn Signer>>) -> Self {
        Self { signers }
    }

    /// Addresses of every signer held by this orchestrator.
    pub fn addresses(&self) -> BTreeSet<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    /// Weight these signers could provide under `config` if all of them sign.
    pub fn reachable_weight(&self, config: &WalletConfig) -> u64 {
        config.tree.signed_weight(&self.addresses())
    }

    /// Ask every signer present in `config` to sign `digest` for `wallet`.
    ///
    /// Signers that are not part of the configuration are skipped, and a
    /// failing signer only reduces the collected weight. A static subdigest
    /// leaf matching the wallet subdigest counts as satisfied. Fails when the
    /// collected weight does not reach the threshold.
    pub async fn sign(
        &self,
        wallet: Address,
        config: &WalletConfig,
        digest: H256,
        chain_id: u64,
    ) -> Result<WalletSignature> {
        let mut signature = WalletSignature::new(wallet, chain_id, config.clone());
        let subdigest = signature.subdigest(digest);

        for signer in &self.signers {
            let address = signer.address();
            if !config.contains(&address) {
                debug!(signer = ?address, wallet = ?wallet, "signer not in config, skipping");
                continue;
            }
            if signature.parts.contains_key(&address) {
                continue;
            }

            match signer.sign_digest(subdigest, chain_id).await {
                Ok(part) => {
                    signature.parts.insert(address, part);
                }
                Err(e) => {
                    warn!(signer = ?address, wallet = ?wallet, error = %e, "signer failed");
                }
            }
        }

        let signed: BTreeSet<Address> = signature.parts.keys().copied().collect();
        let weight = config.tree.signed_weight_for(&signed, subdigest);
        if weight < config.threshold as u64 {
            if signature.parts.is_empty() {
                return Err(AccountError::NoSignatures);
            }
            return Err(AccountError::InsufficientWeight {
                required: config.threshold as u64,
                provided: weight,
            });
        }

        Ok(signature)
    }
}

impl std::fmt::Debug for SignatureOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureOrchestrator")
            .field("signers", &self.addresses())
            .finish()
    }
}
