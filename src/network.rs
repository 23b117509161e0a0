//! Network descriptors.

use serde::{Deserialize, Serialize};

use crate::error::{AccountError, Result};

/// Mainnet chain id.
pub const MAINNET_CHAIN_ID: u64 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeToken {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    pub url: String,
}

/// A chain the account can dispatch witnesses and transactions to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub native_token: NativeToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayer: Option<RelayerConfig>,
}

impl NetworkConfig {
    /// Ethereum mainnet with the given RPC endpoint and optional relayer.
    pub fn ethereum(rpc_url: impl Into<String>, relayer_url: Option<String>) -> Self {
        Self {
            chain_id: MAINNET_CHAIN_ID,
            name: "Ethereum".to_string(),
            rpc_url: rpc_url.into(),
            native_token: NativeToken {
                symbol: "ETH".to_string(),
                name: "Ethereum".to_string(),
                decimals: 18,
            },
            relayer: relayer_url.map(|url| RelayerConfig { url }),
        }
    }
}

/// Find the network for `chain_id`.
pub fn network_for(networks: &[NetworkConfig], chain_id: u64) -> Result<&NetworkConfig> {
    networks
        .iter()
        .find(|n| n.chain_id == chain_id)
        .ok_or(AccountError::UnknownNetwork(chain_id))
}

/// Parse a JSON list of networks.
pub fn networks_from_json(json: &str) -> Result<Vec<NetworkConfig>> {
    Ok(serde_json::from_str(json)?)
}
