//! Signing capability.
//!
//! Anything that can sign a wallet subdigest for a chain is a [`Signer`]:
//! plain secp256k1 keys ([`LocalSigner`]) as well as whole accounts acting as
//! signers of other wallets (`AccountSigner`).

use std::str::FromStr;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::{Address, H256};

use crate::error::{AccountError, Result};
use crate::signature::SignaturePart;

/// Capability to sign a subdigest on a given chain.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Address this signer appears under in signer trees.
    fn address(&self) -> Address;

    /// Produce the signature part for `subdigest`.
    ///
    /// `chain_id` 0 requests a chain-agnostic signature.
    async fn sign_digest(&self, subdigest: H256, chain_id: u64) -> Result<SignaturePart>;
}

/// In-memory secp256k1 key.
#[derive(Clone, Debug)]
pub struct LocalSigner {
    wallet: LocalWallet,
}

impl LocalSigner {
    /// Fresh key from the thread RNG.
    pub fn random() -> Self {
        Self {
            wallet: LocalWallet::new(&mut rand::thread_rng()),
        }
    }

    /// Key from a hex-encoded private key (with or without `0x`).
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let wallet = LocalWallet::from_str(private_key.trim_start_matches("0x")).map_err(|e| {
            AccountError::InvalidInput {
                reason: format!("Invalid private key: {}", e),
            }
        })?;
        Ok(Self { wallet })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign_digest(&self, subdigest: H256, _chain_id: u64) -> Result<SignaturePart> {
        // The chain id is already bound into the subdigest
        let signature = self
            .wallet
            .sign_hash(subdigest)
            .map_err(|e| AccountError::CryptoError {
                reason: format!("Signing failed: {}", e),
            })?;
        Ok(SignaturePart::eoa(signature))
    }
}
