//! Deployment contexts and counterfactual address derivation.
//!
//! A wallet address is a CREATE2 address of the wallet factory, salted with
//! the image hash of the wallet's first configuration.

use std::collections::BTreeMap;
use std::str::FromStr;

use ethers::types::{Address, Bytes, H256};
use ethers::utils::get_create2_address_from_hash;
use serde::{Deserialize, Serialize};

use crate::error::{AccountError, Result};
use crate::utils::{address_word, keccak256_packed};

/// Minimal proxy deployed by the factory for every wallet.
const WALLET_CREATION_CODE: &str =
    "603a600e3d39601a805130553df35a903d363d3d373d3d3d363d30545af43d82803e903d91601857fd5bf3";

/// Deployment parameters of one wallet implementation version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletContext {
    pub version: u16,
    pub factory: Address,
    pub main_module: Address,
    pub main_module_upgradable: Address,
    pub guest_module: Address,
    pub wallet_creation_code: Bytes,
}

impl WalletContext {
    /// Hash of the proxy init code bound to this context's main module.
    pub fn init_code_hash(&self) -> H256 {
        keccak256_packed(&[
            self.wallet_creation_code.as_ref(),
            &address_word(&self.main_module),
        ])
    }

    /// Counterfactual wallet address for an image hash.
    pub fn address_of(&self, image_hash: H256) -> Address {
        get_create2_address_from_hash(self.factory, image_hash.as_bytes(), self.init_code_hash().as_bytes())
    }
}

/// Contexts indexed by wallet version.
pub type VersionedContext = BTreeMap<u16, WalletContext>;

/// Look up a context by version.
pub fn context_for(contexts: &VersionedContext, version: u16) -> Result<&WalletContext> {
    contexts.get(&version).ok_or(AccountError::UnknownContext(version))
}

/// Counterfactual address of `image_hash` under `context`.
pub fn address_of(context: &WalletContext, image_hash: H256) -> Address {
    context.address_of(image_hash)
}

fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s).map_err(|e| AccountError::InvalidInput {
        reason: format!("Invalid address {}: {}", s, e),
    })
}

fn context(
    version: u16,
    factory: &str,
    main_module: &str,
    main_module_upgradable: &str,
    guest_module: &str,
) -> Result<WalletContext> {
    let wallet_creation_code = hex::decode(WALLET_CREATION_CODE)
        .map(Bytes::from)
        .map_err(|e| AccountError::InvalidInput {
            reason: format!("Invalid wallet creation code: {}", e),
        })?;

    Ok(WalletContext {
        version,
        factory: parse_address(factory)?,
        main_module: parse_address(main_module)?,
        main_module_upgradable: parse_address(main_module_upgradable)?,
        guest_module: parse_address(guest_module)?,
        wallet_creation_code,
    })
}

/// Published deployment parameters for wallet versions 1 and 2.
pub fn default_contexts() -> Result<VersionedContext> {
    let mut contexts = BTreeMap::new();
    contexts.insert(
        1,
        context(
            1,
            "0xf9D09D634Fb818b05149329C1dcCFAeA53639d96",
            "0xd01F11855bCcb95f88D7A48492F66410d4637313",
            "0x7EFE6cE415956c5f80C6530cC6cc81b4808F6118",
            "0x02390F3E6E5FD1C6786CB78FD3027C117a9955A7",
        )?,
    );
    contexts.insert(
        2,
        context(
            2,
            "0xFaA5c0b14d1bED5C888Ca655B9a8A5911F78eF4A",
            "0xfBf8f1A5E00034762D928f46d438B947f5d4065d",
            "0x4222dcA3974E39A8b41c411FeDDE3b09a3Ac3BA8",
            "0xfea230Ee243f88BC698dD8f1aE93F8301B6cdfaE",
        )?,
    );
    Ok(contexts)
}
