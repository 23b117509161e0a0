//! Runtime settings read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `SEQUENCE_TRACKER` | `remote`, needs the `remote` feature (`memory` keeps everything in process) |
//! | `SEQUENCE_TRACKER_URL` | `https://sessions.sequence.app` |
//! | `SEQUENCE_CHAIN_ID` | `1` |
//! | `SEQUENCE_RPC_URL` | `https://nodes.sequence.app/mainnet` |
//! | `SEQUENCE_RELAYER_URL` | `https://relayer.sequence.app/mainnet` (empty disables) |
//! | `SEQUENCE_NETWORKS_FILE` | unset; JSON list of networks replacing the above |

use std::env;
use std::sync::Arc;

use crate::error::{AccountError, Result};
use crate::network::{networks_from_json, NetworkConfig, MAINNET_CHAIN_ID};
use crate::tracker::{ConfigTracker, MemoryTracker};

pub const DEFAULT_TRACKER_URL: &str = "https://sessions.sequence.app";
pub const DEFAULT_RPC_URL: &str = "https://nodes.sequence.app/mainnet";
pub const DEFAULT_RELAYER_URL: &str = "https://relayer.sequence.app/mainnet";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackerKind {
    Remote,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub tracker: TrackerKind,
    pub tracker_url: String,
    pub networks: Vec<NetworkConfig>,
}

impl Settings {
    /// Read settings from `SEQUENCE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tracker = match lookup("SEQUENCE_TRACKER").as_deref() {
            None | Some("") | Some("remote") => TrackerKind::Remote,
            Some("memory") => TrackerKind::Memory,
            Some(other) => {
                return Err(AccountError::InvalidInput {
                    reason: format!("Unknown tracker kind: {}", other),
                })
            }
        };
        #[cfg(not(feature = "remote"))]
        if tracker == TrackerKind::Remote {
            return Err(remote_disabled());
        }
        let tracker_url =
            lookup("SEQUENCE_TRACKER_URL").unwrap_or_else(|| DEFAULT_TRACKER_URL.to_string());

        let networks = match lookup("SEQUENCE_NETWORKS_FILE") {
            Some(path) => {
                let json = std::fs::read_to_string(&path).map_err(|e| AccountError::InvalidInput {
                    reason: format!("Cannot read networks file {}: {}", path, e),
                })?;
                networks_from_json(&json)?
            }
            None => vec![single_network(&lookup)?],
        };

        Ok(Self {
            tracker,
            tracker_url,
            networks,
        })
    }

    /// Tracker selected by these settings.
    pub fn tracker(&self) -> Result<Arc<dyn ConfigTracker>> {
        match self.tracker {
            TrackerKind::Memory => Ok(Arc::new(MemoryTracker::new())),
            #[cfg(feature = "remote")]
            TrackerKind::Remote => Ok(Arc::new(crate::tracker::RemoteTracker::new(
                self.tracker_url.clone(),
            ))),
            #[cfg(not(feature = "remote"))]
            TrackerKind::Remote => Err(remote_disabled()),
        }
    }
}

#[cfg(not(feature = "remote"))]
fn remote_disabled() -> AccountError {
    AccountError::InvalidInput {
        reason: "remote tracker needs the `remote` feature, set SEQUENCE_TRACKER=memory to run offline"
            .into(),
    }
}

fn single_network<F>(lookup: &F) -> Result<NetworkConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let chain_id = match lookup("SEQUENCE_CHAIN_ID") {
        Some(raw) => raw.parse::<u64>().map_err(|e| AccountError::InvalidInput {
            reason: format!("Invalid SEQUENCE_CHAIN_ID {}: {}", raw, e),
        })?,
        None => MAINNET_CHAIN_ID,
    };
    let rpc_url = lookup("SEQUENCE_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
    let relayer_url = match lookup("SEQUENCE_RELAYER_URL") {
        Some(url) if url.is_empty() => None,
        Some(url) => Some(url),
        None => Some(DEFAULT_RELAYER_URL.to_string()),
    };

    let mut network = NetworkConfig::ethereum(rpc_url, relayer_url);
    network.chain_id = chain_id;
    Ok(network)
}
