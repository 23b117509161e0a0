//! Signer configurations.
//!
//! - Signer trees and their Merkle encoding (`topology`)
//! - Threshold/checkpoint configs and image hashes (`wallet`)

pub mod topology;
pub mod wallet;

pub use topology::{SignerLeaf, Topology};
pub use wallet::{SimpleConfig, WalletConfig};
