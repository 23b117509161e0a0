//! Transaction relaying.
//!
//! A relayer submits signed transaction bundles of a wallet on a chain,
//! deploying the wallet first when it is still counterfactual.

#[cfg(feature = "remote")]
pub mod rpc;

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

use crate::context::WalletContext;
use crate::error::Result;
use crate::signature::WalletSignature;
use crate::utils::{keccak256, selector};

#[cfg(feature = "remote")]
pub use rpc::RpcRelayer;

/// Gas limit attached to self-calls that only touch wallet storage.
const SELF_CALL_GAS_LIMIT: u64 = 100_000;

/// One call of a wallet transaction bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub delegate_call: bool,
    pub revert_on_error: bool,
    pub gas_limit: U256,
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Call {
    /// Self-call moving `wallet` to `image_hash`.
    pub fn update_image_hash(wallet: Address, image_hash: H256) -> Self {
        let mut data = selector("updateImageHash(bytes32)").to_vec();
        data.extend_from_slice(image_hash.as_bytes());

        Self {
            delegate_call: false,
            revert_on_error: true,
            gas_limit: U256::from(SELF_CALL_GAS_LIMIT),
            target: wallet,
            value: U256::zero(),
            data: Bytes::from(data),
        }
    }

    fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Bool(self.delegate_call),
            Token::Bool(self.revert_on_error),
            Token::Uint(self.gas_limit),
            Token::Address(self.target),
            Token::Uint(self.value),
            Token::Bytes(self.data.to_vec()),
        ])
    }
}

/// Digest a wallet signs to execute `calls` at `nonce`:
/// `keccak256(abi.encode(nonce, calls))`.
pub fn bundle_digest(nonce: U256, calls: &[Call]) -> H256 {
    let encoded = abi::encode(&[
        Token::Uint(nonce),
        Token::Array(calls.iter().map(Call::to_token).collect()),
    ]);
    keccak256(&encoded)
}

/// Parameters to deploy a counterfactual wallet before executing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployData {
    pub factory: Address,
    pub main_module: Address,
    pub image_hash: H256,
}

impl DeployData {
    pub fn new(context: &WalletContext, image_hash: H256) -> Self {
        Self {
            factory: context.factory,
            main_module: context.main_module,
            image_hash,
        }
    }
}

/// A signed bundle ready to be relayed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub chain_id: u64,
    pub wallet: Address,
    pub nonce: U256,
    pub calls: Vec<Call>,
    pub signature: WalletSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployData>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReceipt {
    pub txn_hash: String,
}

/// Submits wallet transaction bundles on one chain.
#[async_trait]
pub trait Relayer: Send + Sync {
    /// Next unused nonce of `wallet`.
    async fn nonce(&self, wallet: Address) -> Result<U256>;

    async fn relay(&self, request: &RelayRequest) -> Result<RelayReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_image_hash_calldata() {
        let wallet = Address::repeat_byte(1);
        let call = Call::update_image_hash(wallet, H256::repeat_byte(0xAB));
        assert_eq!(call.target, wallet);
        assert_eq!(call.data.len(), 4 + 32);
        assert_eq!(&call.data[..4], &selector("updateImageHash(bytes32)"));
        assert!(call.data[4..].iter().all(|b| *b == 0xAB));
    }

    #[test]
    fn test_bundle_digest_binds_nonce_and_calls() {
        let call = Call::update_image_hash(Address::repeat_byte(1), H256::repeat_byte(2));
        let base = bundle_digest(U256::zero(), &[call.clone()]);
        assert_eq!(base, bundle_digest(U256::zero(), &[call.clone()]));
        assert_ne!(base, bundle_digest(U256::one(), &[call.clone()]));

        let other = Call::update_image_hash(Address::repeat_byte(1), H256::repeat_byte(3));
        assert_ne!(base, bundle_digest(U256::zero(), &[other]));
    }
}
