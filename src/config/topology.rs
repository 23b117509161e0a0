//! Signer trees.
//!
//! A topology is a binary Merkle tree whose leaves are weighted signers or
//! static subdigests. Nested nodes carry their own weight and threshold so a
//! subtree acts as a single signer of the parent once it is satisfied.

use std::collections::BTreeSet;

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::error::{AccountError, Result};
use crate::utils::{keccak256_packed, u256_word};

/// Domain prefix for nested config nodes.
const NESTED_PREFIX: &[u8] = b"Sequence nested config:\n";
/// Domain prefix for static subdigest leaves.
const SUBDIGEST_PREFIX: &[u8] = b"Sequence static digest:\n";

/// A weighted signer leaf.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerLeaf {
    pub address: Address,
    pub weight: u8,
}

impl SignerLeaf {
    pub fn new(address: Address, weight: u8) -> Self {
        Self { address, weight }
    }
}

/// Node of a signer tree.
///
/// Serialized untagged so JSON configs look like
/// `{"address": .., "weight": ..}`, `{"left": .., "right": ..}`,
/// `{"weight": .., "threshold": .., "tree": ..}` or `{"subdigest": ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Topology {
    Signer {
        address: Address,
        weight: u8,
    },
    Nested {
        weight: u8,
        threshold: u16,
        tree: Box<Topology>,
    },
    Node {
        left: Box<Topology>,
        right: Box<Topology>,
    },
    Subdigest {
        subdigest: H256,
    },
}

impl Topology {
    pub fn signer(address: Address, weight: u8) -> Self {
        Topology::Signer { address, weight }
    }

    pub fn node(left: Topology, right: Topology) -> Self {
        Topology::Node {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn nested(weight: u8, threshold: u16, tree: Topology) -> Self {
        Topology::Nested {
            weight,
            threshold,
            tree: Box::new(tree),
        }
    }

    pub fn subdigest(subdigest: H256) -> Self {
        Topology::Subdigest { subdigest }
    }

    /// Build a tree from a flat member list by pairing nodes level by level.
    ///
    /// An odd node at the end of a level is promoted unchanged. An empty list
    /// becomes a zero subdigest leaf.
    pub fn from_members(members: &[SignerLeaf]) -> Self {
        if members.is_empty() {
            return Topology::subdigest(H256::zero());
        }

        let mut level: Vec<Topology> = members
            .iter()
            .map(|m| Topology::signer(m.address, m.weight))
            .collect();

        while level.len() > 1 {
            let mut next = Vec::with_capacity((level.len() + 1) / 2);
            let mut nodes = level.into_iter();
            while let Some(left) = nodes.next() {
                match nodes.next() {
                    Some(right) => next.push(Topology::node(left, right)),
                    None => next.push(left),
                }
            }
            level = next;
        }

        // `level` has exactly one element here
        level.pop().unwrap_or_else(|| Topology::subdigest(H256::zero()))
    }

    /// Merkle hash of this subtree.
    pub fn hash(&self) -> H256 {
        match self {
            Topology::Signer { address, weight } => {
                // bytes32(uint256(weight) << 160 | uint160(address))
                let mut word = [0u8; 32];
                word[11] = *weight;
                word[12..].copy_from_slice(address.as_bytes());
                H256::from(word)
            }
            Topology::Subdigest { subdigest } => {
                keccak256_packed(&[SUBDIGEST_PREFIX, subdigest.as_bytes()])
            }
            Topology::Node { left, right } => {
                keccak256_packed(&[left.hash().as_bytes(), right.hash().as_bytes()])
            }
            Topology::Nested { weight, threshold, tree } => keccak256_packed(&[
                NESTED_PREFIX,
                tree.hash().as_bytes(),
                &u256_word(*threshold as u64),
                &u256_word(*weight as u64),
            ]),
        }
    }

    /// Highest weight this subtree can contribute to its parent.
    ///
    /// Nested nodes only contribute when their own subtree can reach the
    /// local threshold. Subdigest leaves contribute nothing to a signer quorum.
    pub fn max_weight(&self) -> u64 {
        match self {
            Topology::Signer { weight, .. } => *weight as u64,
            Topology::Subdigest { .. } => 0,
            Topology::Node { left, right } => left.max_weight() + right.max_weight(),
            Topology::Nested { weight, threshold, tree } => {
                if tree.max_weight() >= *threshold as u64 {
                    *weight as u64
                } else {
                    0
                }
            }
        }
    }

    /// Weight this subtree contributes if exactly the `signed` addresses sign.
    pub fn signed_weight(&self, signed: &BTreeSet<Address>) -> u64 {
        self.weight_of(signed, None)
    }

    /// Like [`signed_weight`](Self::signed_weight), but a subdigest leaf
    /// equal to `subdigest` satisfies any threshold.
    pub fn signed_weight_for(&self, signed: &BTreeSet<Address>, subdigest: H256) -> u64 {
        self.weight_of(signed, Some(subdigest))
    }

    fn weight_of(&self, signed: &BTreeSet<Address>, subdigest: Option<H256>) -> u64 {
        match self {
            Topology::Signer { address, weight } => {
                if signed.contains(address) {
                    *weight as u64
                } else {
                    0
                }
            }
            Topology::Subdigest { subdigest: leaf } => {
                if subdigest == Some(*leaf) {
                    u64::MAX
                } else {
                    0
                }
            }
            Topology::Node { left, right } => left
                .weight_of(signed, subdigest)
                .saturating_add(right.weight_of(signed, subdigest)),
            Topology::Nested { weight, threshold, tree } => {
                if tree.weight_of(signed, subdigest) >= *threshold as u64 {
                    *weight as u64
                } else {
                    0
                }
            }
        }
    }

    /// All signer leaves, depth-first, left to right.
    pub fn signers(&self) -> Vec<SignerLeaf> {
        let mut out = Vec::new();
        self.collect_signers(&mut out);
        out
    }

    fn collect_signers(&self, out: &mut Vec<SignerLeaf>) {
        match self {
            Topology::Signer { address, weight } => out.push(SignerLeaf::new(*address, *weight)),
            Topology::Subdigest { .. } => {}
            Topology::Node { left, right } => {
                left.collect_signers(out);
                right.collect_signers(out);
            }
            Topology::Nested { tree, .. } => tree.collect_signers(out),
        }
    }

    /// Whether `address` appears anywhere in the tree.
    pub fn contains(&self, address: &Address) -> bool {
        match self {
            Topology::Signer { address: a, .. } => a == address,
            Topology::Subdigest { .. } => false,
            Topology::Node { left, right } => left.contains(address) || right.contains(address),
            Topology::Nested { tree, .. } => tree.contains(address),
        }
    }

    /// Check every nested node has a non-zero threshold it can reach.
    pub fn validate(&self) -> Result<()> {
        match self {
            Topology::Signer { .. } | Topology::Subdigest { .. } => Ok(()),
            Topology::Node { left, right } => {
                left.validate()?;
                right.validate()
            }
            Topology::Nested { threshold, tree, .. } => {
                if *threshold == 0 {
                    return Err(AccountError::InvalidConfig {
                        reason: "nested threshold must be greater than zero".into(),
                    });
                }
                tree.validate()?;
                let reachable = tree.max_weight();
                if reachable < *threshold as u64 {
                    return Err(AccountError::InvalidConfig {
                        reason: format!(
                            "nested threshold {} unreachable, max weight {}",
                            threshold, reachable
                        ),
                    });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn test_signer_leaf_encoding() {
        let leaf = Topology::signer(addr(0x11), 3);
        let hash = leaf.hash();
        assert_eq!(hash.as_bytes()[11], 3);
        assert_eq!(&hash.as_bytes()[12..], addr(0x11).as_bytes());
        assert!(hash.as_bytes()[..11].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_from_members_pairs_levels() {
        let members: Vec<SignerLeaf> = (1..=3).map(|i| SignerLeaf::new(addr(i), 1)).collect();
        let tree = Topology::from_members(&members);

        let expected = Topology::node(
            Topology::node(Topology::signer(addr(1), 1), Topology::signer(addr(2), 1)),
            Topology::signer(addr(3), 1),
        );
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_from_members_single_and_empty() {
        let single = Topology::from_members(&[SignerLeaf::new(addr(7), 2)]);
        assert_eq!(single, Topology::signer(addr(7), 2));

        let empty = Topology::from_members(&[]);
        assert_eq!(empty, Topology::subdigest(H256::zero()));
    }

    #[test]
    fn test_node_order_matters() {
        let a = Topology::node(Topology::signer(addr(1), 1), Topology::signer(addr(2), 1));
        let b = Topology::node(Topology::signer(addr(2), 1), Topology::signer(addr(1), 1));
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_nested_max_weight() {
        let inner = Topology::node(Topology::signer(addr(1), 1), Topology::signer(addr(2), 1));
        assert_eq!(Topology::nested(5, 2, inner.clone()).max_weight(), 5);
        assert_eq!(Topology::nested(5, 3, inner).max_weight(), 0);
    }

    #[test]
    fn test_signed_weight_respects_nested_threshold() {
        let tree = Topology::node(
            Topology::nested(1, 2, Topology::node(Topology::signer(addr(1), 1), Topology::signer(addr(2), 1))),
            Topology::signer(addr(3), 1),
        );
        let signed: BTreeSet<Address> = [addr(1), addr(3)].into_iter().collect();
        assert_eq!(tree.signed_weight(&signed), 1);

        let signed: BTreeSet<Address> = [addr(1), addr(2), addr(3)].into_iter().collect();
        assert_eq!(tree.signed_weight(&signed), 2);
    }

    #[test]
    fn test_matching_subdigest_leaf_satisfies_nested_node() {
        let static_digest = H256::repeat_byte(0x5D);
        let tree = Topology::nested(
            2,
            3,
            Topology::node(Topology::signer(addr(1), 1), Topology::subdigest(static_digest)),
        );
        let none = BTreeSet::new();
        assert_eq!(tree.signed_weight(&none), 0);
        assert_eq!(tree.signed_weight_for(&none, static_digest), 2);
        assert_eq!(tree.signed_weight_for(&none, H256::repeat_byte(0x5E)), 0);
    }

    #[test]
    fn test_nested_unreachable_threshold_rejected() {
        let tree = Topology::nested(1, 4, Topology::signer(addr(1), 1));
        assert!(matches!(tree.validate(), Err(AccountError::InvalidConfig { .. })));

        let zero = Topology::nested(1, 0, Topology::signer(addr(1), 1));
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_signers_depth_first() {
        let tree = Topology::node(
            Topology::nested(1, 1, Topology::node(Topology::signer(addr(1), 1), Topology::signer(addr(2), 1))),
            Topology::signer(addr(3), 1),
        );
        let order: Vec<Address> = tree.signers().iter().map(|s| s.address).collect();
        assert_eq!(order, vec![addr(1), addr(2), addr(3)]);
        assert!(tree.contains(&addr(2)));
        assert!(!tree.contains(&addr(4)));
    }

    #[test]
    fn test_json_shapes() {
        let json = r#"{
            "weight": 2,
            "threshold": 1,
            "tree": {
                "left": { "address": "0x1111111111111111111111111111111111111111", "weight": 1 },
                "right": { "subdigest": "0x0000000000000000000000000000000000000000000000000000000000000000" }
            }
        }"#;
        let tree: Topology = serde_json::from_str(json).unwrap();
        assert_eq!(
            tree,
            Topology::nested(
                2,
                1,
                Topology::node(Topology::signer(addr(0x11), 1), Topology::subdigest(H256::zero()))
            )
        );
    }
}
