//! Wallet configurations and their image hashes.

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::config::topology::{SignerLeaf, Topology};
use crate::error::{AccountError, Result};
use crate::utils::{keccak256_packed, u256_word};

/// A versioned signer configuration: threshold and checkpoint over a signer tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub threshold: u16,
    pub checkpoint: u32,
    pub tree: Topology,
}

impl WalletConfig {
    pub fn new(threshold: u16, checkpoint: u32, tree: Topology) -> Self {
        Self { threshold, checkpoint, tree }
    }

    /// Deterministic digest of the configuration.
    ///
    /// `keccak256(keccak256(root ++ uint256(threshold)) ++ uint256(checkpoint))`
    pub fn image_hash(&self) -> H256 {
        let root = self.tree.hash();
        let inner = keccak256_packed(&[root.as_bytes(), &u256_word(self.threshold as u64)]);
        keccak256_packed(&[inner.as_bytes(), &u256_word(self.checkpoint as u64)])
    }

    /// Reject configurations no quorum could ever satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(AccountError::InvalidConfig {
                reason: "threshold must be greater than zero".into(),
            });
        }
        self.tree.validate()?;

        let reachable = self.tree.max_weight();
        if reachable < self.threshold as u64 {
            return Err(AccountError::InvalidConfig {
                reason: format!(
                    "threshold {} unreachable, max weight {}",
                    self.threshold, reachable
                ),
            });
        }
        Ok(())
    }

    pub fn signers(&self) -> Vec<SignerLeaf> {
        self.tree.signers()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.tree.contains(address)
    }
}

/// Flat configuration: a list of weighted members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleConfig {
    pub threshold: u16,
    pub checkpoint: u32,
    #[serde(alias = "signers")]
    pub members: Vec<SignerLeaf>,
}

impl SimpleConfig {
    pub fn new(threshold: u16, checkpoint: u32, members: Vec<SignerLeaf>) -> Self {
        Self { threshold, checkpoint, members }
    }

    /// Convert into a tree configuration with the same image hash semantics.
    pub fn to_wallet_config(&self) -> WalletConfig {
        WalletConfig::new(
            self.threshold,
            self.checkpoint,
            Topology::from_members(&self.members),
        )
    }
}

impl From<SimpleConfig> for WalletConfig {
    fn from(simple: SimpleConfig) -> Self {
        simple.to_wallet_config()
    }
}
