//! Wallet signatures and their recursive recovery.
//!
//! A wallet signature carries the configuration it was produced under and one
//! part per signer that took part. Recovery walks the signer tree, recovering
//! each ECDSA part against the wallet subdigest and validating nested wallet
//! parts recursively, and bubbles satisfied weight up to the root.

use std::collections::BTreeMap;

use ethers::types::{Address, Signature, H256};
use serde::{Deserialize, Serialize};

use crate::config::{Topology, WalletConfig};
use crate::context::WalletContext;
use crate::error::{AccountError, Result};
use crate::utils::{keccak256, keccak256_packed, u256_word};

/// EIP-712 style type string for configuration updates.
pub const SET_IMAGE_HASH_TYPE: &str = "SetImageHash(bytes32 imageHash)";

/// Chain id used for chain-agnostic signatures.
pub const CHAIN_AGNOSTIC: u64 = 0;

/// Type hash of [`SET_IMAGE_HASH_TYPE`].
pub fn set_image_hash_type_hash() -> H256 {
    keccak256(SET_IMAGE_HASH_TYPE.as_bytes())
}

/// Update struct digest that authorizes moving a wallet to `image_hash`.
pub fn hash_set_image_hash(image_hash: H256) -> H256 {
    keccak256_packed(&[set_image_hash_type_hash().as_bytes(), image_hash.as_bytes()])
}

/// Digest actually signed by the signers of `wallet`:
/// `keccak256("\x19\x01" ++ uint256(chain_id) ++ wallet ++ digest)`.
pub fn subdigest_of(wallet: Address, chain_id: u64, digest: H256) -> H256 {
    keccak256_packed(&[
        b"\x19\x01",
        &u256_word(chain_id),
        wallet.as_bytes(),
        digest.as_bytes(),
    ])
}

/// Signature contributed by one signer leaf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SignaturePart {
    /// secp256k1 signature over the wallet subdigest.
    Eoa { signature: Signature },
    /// Signature of a nested wallet acting as a signer.
    Wallet { signature: Box<WalletSignature> },
}

impl SignaturePart {
    pub fn eoa(signature: Signature) -> Self {
        SignaturePart::Eoa { signature }
    }

    pub fn wallet(signature: WalletSignature) -> Self {
        SignaturePart::Wallet {
            signature: Box::new(signature),
        }
    }
}

/// Decides whether a configuration currently controls a wallet.
///
/// Used when validating signatures of nested wallets and when checking the
/// top-level configuration of a signature.
pub trait WalletResolver {
    fn controls(&self, wallet: &Address, image_hash: H256) -> bool;
}

/// Accepts a configuration only if it is the one the wallet was created with.
pub struct CounterfactualResolver<'a> {
    pub context: &'a WalletContext,
}

impl WalletResolver for CounterfactualResolver<'_> {
    fn controls(&self, wallet: &Address, image_hash: H256) -> bool {
        self.context.address_of(image_hash) == *wallet
    }
}

/// Pins one wallet to a fixed image hash and defers every other wallet to
/// `inner`. Used to check an update against the config it was signed under.
pub struct PinnedResolver<'a> {
    pub inner: &'a dyn WalletResolver,
    pub wallet: Address,
    pub image_hash: H256,
}

impl WalletResolver for PinnedResolver<'_> {
    fn controls(&self, wallet: &Address, image_hash: H256) -> bool {
        if *wallet == self.wallet {
            image_hash == self.image_hash
        } else {
            self.inner.controls(wallet, image_hash)
        }
    }
}

/// Outcome of recovering a wallet signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recovered {
    pub weight: u64,
    pub threshold: u16,
    pub image_hash: H256,
    /// Signers whose parts counted toward the weight, in tree order
    pub signers: Vec<Address>,
}

impl Recovered {
    pub fn meets_threshold(&self) -> bool {
        self.weight >= self.threshold as u64
    }
}

/// A signature of `wallet` over a digest on `chain_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSignature {
    pub wallet: Address,
    pub chain_id: u64,
    pub config: WalletConfig,
    pub parts: BTreeMap<Address, SignaturePart>,
}

impl WalletSignature {
    pub fn new(wallet: Address, chain_id: u64, config: WalletConfig) -> Self {
        Self {
            wallet,
            chain_id,
            config,
            parts: BTreeMap::new(),
        }
    }

    pub fn subdigest(&self, digest: H256) -> H256 {
        subdigest_of(self.wallet, self.chain_id, digest)
    }

    /// Recover the weight this signature carries for `digest`.
    ///
    /// Does not check the threshold or whether the config controls the wallet.
    pub fn recover(&self, digest: H256, resolver: &dyn WalletResolver) -> Result<Recovered> {
        let subdigest = self.subdigest(digest);
        let mut signers = Vec::new();
        let weight = recover_tree(
            &self.config.tree,
            subdigest,
            self.chain_id,
            &self.parts,
            resolver,
            &mut signers,
        )?;

        Ok(Recovered {
            weight,
            threshold: self.config.threshold,
            image_hash: self.config.image_hash(),
            signers,
        })
    }

    /// Recover and require the config to control the wallet and the weight to
    /// meet the threshold.
    pub fn verify(&self, digest: H256, resolver: &dyn WalletResolver) -> Result<Recovered> {
        let recovered = self.recover(digest, resolver)?;

        if !resolver.controls(&self.wallet, recovered.image_hash) {
            return Err(AccountError::InvalidSignature {
                reason: format!(
                    "config {:?} does not control wallet {:?}",
                    recovered.image_hash, self.wallet
                ),
            });
        }

        if !recovered.meets_threshold() {
            return Err(AccountError::InsufficientWeight {
                required: recovered.threshold as u64,
                provided: recovered.weight,
            });
        }

        Ok(recovered)
    }
}

fn recover_tree(
    tree: &Topology,
    subdigest: H256,
    chain_id: u64,
    parts: &BTreeMap<Address, SignaturePart>,
    resolver: &dyn WalletResolver,
    signers: &mut Vec<Address>,
) -> Result<u64> {
    match tree {
        Topology::Signer { address, weight } => {
            let part = match parts.get(address) {
                Some(part) => part,
                None => return Ok(0),
            };

            match part {
                SignaturePart::Eoa { signature } => {
                    let recovered = signature.recover(subdigest).map_err(|e| {
                        AccountError::InvalidSignature {
                            reason: format!("recovery failed for {:?}: {}", address, e),
                        }
                    })?;
                    if recovered != *address {
                        return Err(AccountError::InvalidSignature {
                            reason: format!("expected signer {:?}, recovered {:?}", address, recovered),
                        });
                    }
                }
                SignaturePart::Wallet { signature } => {
                    if signature.wallet != *address {
                        return Err(AccountError::InvalidSignature {
                            reason: format!(
                                "nested signature for {:?} placed at leaf {:?}",
                                signature.wallet, address
                            ),
                        });
                    }
                    if signature.chain_id != chain_id {
                        return Err(AccountError::InvalidSignature {
                            reason: format!(
                                "nested signature on chain {} inside chain {}",
                                signature.chain_id, chain_id
                            ),
                        });
                    }
                    // The nested wallet signs our subdigest as its digest
                    signature.verify(subdigest, resolver)?;
                }
            }

            signers.push(*address);
            Ok(*weight as u64)
        }
        Topology::Subdigest { subdigest: static_digest } => {
            if *static_digest == subdigest {
                Ok(u64::MAX)
            } else {
                Ok(0)
            }
        }
        Topology::Node { left, right } => {
            let l = recover_tree(left, subdigest, chain_id, parts, resolver, signers)?;
            let r = recover_tree(right, subdigest, chain_id, parts, resolver, signers)?;
            Ok(l.saturating_add(r))
        }
        Topology::Nested { weight, threshold, tree } => {
            let before = signers.len();
            let inner = recover_tree(tree, subdigest, chain_id, parts, resolver, signers)?;
            if inner >= *threshold as u64 {
                Ok(*weight as u64)
            } else {
                // An unsatisfied subtree contributes no signers
                signers.truncate(before);
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SignerLeaf, SimpleConfig};
    use ethers::signers::LocalWallet;

    struct AcceptAll;

    impl WalletResolver for AcceptAll {
        fn controls(&self, _wallet: &Address, _image_hash: H256) -> bool {
            true
        }
    }

    fn key() -> LocalWallet {
        LocalWallet::new(&mut rand::thread_rng())
    }

    fn sign(key: &LocalWallet, subdigest: H256) -> SignaturePart {
        SignaturePart::eoa(key.sign_hash(subdigest).unwrap())
    }

    fn addr_of(key: &LocalWallet) -> Address {
        use ethers::signers::Signer;
        key.address()
    }

    #[test]
    fn test_set_image_hash_type_hash_constant() {
        assert_eq!(
            set_image_hash_type_hash(),
            keccak256(b"SetImageHash(bytes32 imageHash)")
        );
        assert_ne!(
            hash_set_image_hash(H256::repeat_byte(1)),
            hash_set_image_hash(H256::repeat_byte(2))
        );
    }

    #[test]
    fn test_subdigest_binds_chain_and_wallet() {
        let digest = H256::repeat_byte(9);
        let wallet = Address::repeat_byte(1);
        let base = subdigest_of(wallet, 1, digest);
        assert_ne!(base, subdigest_of(wallet, CHAIN_AGNOSTIC, digest));
        assert_ne!(base, subdigest_of(Address::repeat_byte(2), 1, digest));
    }

    #[test]
    fn test_weights_sum_to_threshold() {
        let (a, b) = (key(), key());
        let config: WalletConfig = SimpleConfig::new(
            2,
            1,
            vec![SignerLeaf::new(addr_of(&a), 1), SignerLeaf::new(addr_of(&b), 1)],
        )
        .into();
        let wallet = Address::repeat_byte(0xEE);
        let digest = H256::repeat_byte(3);

        let mut sig = WalletSignature::new(wallet, 1, config);
        let subdigest = sig.subdigest(digest);
        sig.parts.insert(addr_of(&a), sign(&a, subdigest));

        let err = sig.verify(digest, &AcceptAll).unwrap_err();
        assert!(matches!(err, AccountError::InsufficientWeight { required: 2, provided: 1 }));

        sig.parts.insert(addr_of(&b), sign(&b, subdigest));
        let recovered = sig.verify(digest, &AcceptAll).unwrap();
        assert_eq!(recovered.weight, 2);
        assert_eq!(recovered.signers.len(), 2);
    }

    #[test]
    fn test_wrong_digest_rejected() {
        let a = key();
        let config: WalletConfig =
            SimpleConfig::new(1, 1, vec![SignerLeaf::new(addr_of(&a), 1)]).into();
        let wallet = Address::repeat_byte(0xEE);

        let mut sig = WalletSignature::new(wallet, 1, config);
        let subdigest = sig.subdigest(H256::repeat_byte(3));
        sig.parts.insert(addr_of(&a), sign(&a, subdigest));

        assert!(sig.verify(H256::repeat_byte(3), &AcceptAll).is_ok());
        assert!(matches!(
            sig.verify(H256::repeat_byte(4), &AcceptAll),
            Err(AccountError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_nested_branches() {
        // 2-of-2 branches, each branch itself 1-of-2
        let keys: Vec<LocalWallet> = (0..4).map(|_| key()).collect();
        let branch = |i: usize| {
            Topology::nested(
                1,
                1,
                Topology::node(
                    Topology::signer(addr_of(&keys[i]), 1),
                    Topology::signer(addr_of(&keys[i + 1]), 1),
                ),
            )
        };
        let config = WalletConfig::new(2, 0, Topology::node(branch(0), branch(2)));
        let wallet = Address::repeat_byte(0xEE);
        let digest = H256::repeat_byte(5);

        let mut sig = WalletSignature::new(wallet, 1, config);
        let subdigest = sig.subdigest(digest);

        sig.parts.insert(addr_of(&keys[0]), sign(&keys[0], subdigest));
        sig.parts.insert(addr_of(&keys[1]), sign(&keys[1], subdigest));
        // Both signers of one branch only satisfy that branch
        assert_eq!(sig.recover(digest, &AcceptAll).unwrap().weight, 1);

        sig.parts.insert(addr_of(&keys[3]), sign(&keys[3], subdigest));
        assert_eq!(sig.verify(digest, &AcceptAll).unwrap().weight, 2);
    }

    #[test]
    fn test_unsatisfied_branch_lists_no_signers() {
        // Left branch needs both of its keys, right branch needs one
        let keys: Vec<LocalWallet> = (0..3).map(|_| key()).collect();
        let left = Topology::nested(
            1,
            2,
            Topology::node(
                Topology::signer(addr_of(&keys[0]), 1),
                Topology::signer(addr_of(&keys[1]), 1),
            ),
        );
        let right = Topology::nested(1, 1, Topology::signer(addr_of(&keys[2]), 1));
        let config = WalletConfig::new(1, 0, Topology::node(left, right));
        let wallet = Address::repeat_byte(0xEE);
        let digest = H256::repeat_byte(7);

        let mut sig = WalletSignature::new(wallet, 1, config);
        let subdigest = sig.subdigest(digest);
        sig.parts.insert(addr_of(&keys[0]), sign(&keys[0], subdigest));
        sig.parts.insert(addr_of(&keys[2]), sign(&keys[2], subdigest));

        let recovered = sig.verify(digest, &AcceptAll).unwrap();
        assert_eq!(recovered.weight, 1);
        assert_eq!(recovered.signers, vec![addr_of(&keys[2])]);
    }

    #[test]
    fn test_static_subdigest_leaf() {
        let wallet = Address::repeat_byte(0xEE);
        let digest = H256::repeat_byte(6);
        let subdigest = subdigest_of(wallet, 1, digest);

        let config = WalletConfig::new(
            1,
            0,
            Topology::node(
                Topology::signer(Address::repeat_byte(1), 1),
                Topology::subdigest(subdigest),
            ),
        );
        let sig = WalletSignature::new(wallet, 1, config);
        assert!(sig.verify(digest, &AcceptAll).is_ok());
        assert!(sig.verify(H256::repeat_byte(7), &AcceptAll).is_err());
    }

    #[test]
    fn test_counterfactual_resolver() {
        let contexts = crate::context::default_contexts().unwrap();
        let ctx = &contexts[&2];
        let image_hash = H256::repeat_byte(8);
        let resolver = CounterfactualResolver { context: ctx };
        assert!(resolver.controls(&ctx.address_of(image_hash), image_hash));
        assert!(!resolver.controls(&Address::repeat_byte(1), image_hash));
    }
}
