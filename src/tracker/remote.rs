//! Sessions service client.
//!
//! Every operation is a JSON `POST {base}/rpc/Sessions/<Method>` call.
//! Validation happens server-side.

use async_trait::async_trait;
use ethers::types::{Address, H256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WalletConfig;
use crate::context::WalletContext;
use crate::error::{AccountError, Result};
use crate::signature::hash_set_image_hash;
use crate::tracker::{
    ConfigTracker, CounterfactualWallet, PresignedConfigLink, PresignedConfigUpdate, Witness,
};

/// Config coder version sent with every config.
const CONFIG_VERSION: u16 = 2;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveConfigRequest<'a> {
    version: u16,
    config: &'a WalletConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigRequest {
    image_hash: H256,
}

#[derive(Deserialize)]
struct ConfigResponse {
    config: Option<WalletConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveWalletRequest<'a> {
    version: u16,
    deploy_config: &'a WalletConfig,
    contexts: &'a [WalletContext],
}

#[derive(Serialize)]
struct DeployHashRequest {
    wallet: Address,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployHashResponse {
    deploy_hash: Option<H256>,
    context: Option<WalletContext>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveSignerSignaturesRequest<'a> {
    wallet: Address,
    digest: H256,
    #[serde(rename = "chainID")]
    chain_id: String,
    signature: &'a crate::signature::WalletSignature,
    to_config: &'a WalletConfig,
    to_image_hash: H256,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigUpdatesRequest {
    wallet: Address,
    from_image_hash: H256,
}

#[derive(Deserialize)]
struct ConfigUpdatesResponse {
    updates: Vec<PresignedConfigLink>,
}

#[derive(Serialize)]
struct SaveWitnessesRequest<'a> {
    witness: &'a Witness,
}

#[derive(Serialize)]
struct WitnessesRequest {
    wallet: Address,
}

#[derive(Deserialize)]
struct WitnessesResponse {
    witnesses: Vec<Witness>,
}

/// Tracker backed by a remote sessions service.
#[derive(Clone, Debug)]
pub struct RemoteTracker {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteTracker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/rpc/Sessions/{}", self.base_url.trim_end_matches('/'), method)
    }

    async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.method_url(method);
        debug!(%url, "sessions call");

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AccountError::NetworkError {
                reason: format!("{} returned {}: {}", method, status, body),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ConfigTracker for RemoteTracker {
    async fn save_wallet_config(&self, config: &WalletConfig) -> Result<()> {
        let _: serde_json::Value = self
            .call("SaveConfig", &SaveConfigRequest { version: CONFIG_VERSION, config })
            .await?;
        Ok(())
    }

    async fn config_of_image_hash(&self, image_hash: H256) -> Result<Option<WalletConfig>> {
        let response: ConfigResponse = self.call("Config", &ConfigRequest { image_hash }).await?;
        Ok(response.config)
    }

    async fn save_counterfactual_wallet(
        &self,
        config: &WalletConfig,
        contexts: &[WalletContext],
    ) -> Result<()> {
        let request = SaveWalletRequest {
            version: CONFIG_VERSION,
            deploy_config: config,
            contexts,
        };
        let _: serde_json::Value = self.call("SaveWallet", &request).await?;
        Ok(())
    }

    async fn image_hash_of_counterfactual_wallet(
        &self,
        wallet: Address,
    ) -> Result<Option<CounterfactualWallet>> {
        let response: DeployHashResponse =
            self.call("DeployHash", &DeployHashRequest { wallet }).await?;
        Ok(match (response.deploy_hash, response.context) {
            (Some(image_hash), Some(context)) => Some(CounterfactualWallet { image_hash, context }),
            _ => None,
        })
    }

    async fn save_presigned_configuration(&self, update: &PresignedConfigUpdate) -> Result<()> {
        let to_image_hash = update.next_image_hash();
        let request = SaveSignerSignaturesRequest {
            wallet: update.wallet,
            digest: hash_set_image_hash(to_image_hash),
            chain_id: update.signature.chain_id.to_string(),
            signature: &update.signature,
            to_config: &update.next_config,
            to_image_hash,
        };
        let _: serde_json::Value = self.call("SaveSignerSignatures2", &request).await?;
        Ok(())
    }

    async fn presigned_configurations(
        &self,
        wallet: Address,
        from_image_hash: H256,
    ) -> Result<Vec<PresignedConfigLink>> {
        let response: ConfigUpdatesResponse = self
            .call("ConfigUpdates", &ConfigUpdatesRequest { wallet, from_image_hash })
            .await?;
        Ok(response.updates)
    }

    async fn save_witnesses(&self, witness: &Witness) -> Result<()> {
        let _: serde_json::Value = self
            .call("SaveWitnesses", &SaveWitnessesRequest { witness })
            .await?;
        Ok(())
    }

    async fn witnesses(&self, wallet: Address) -> Result<Vec<Witness>> {
        let response: WitnessesResponse = self.call("Witnesses", &WitnessesRequest { wallet }).await?;
        Ok(response.witnesses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SignerLeaf, SimpleConfig};
    use crate::signature::WalletSignature;

    #[test]
    fn test_method_url() {
        let tracker = RemoteTracker::new("https://sessions.sequence.app/");
        assert_eq!(
            tracker.method_url("SaveConfig"),
            "https://sessions.sequence.app/rpc/Sessions/SaveConfig"
        );
    }

    #[test]
    fn test_presigned_request_shape() {
        let config: WalletConfig =
            SimpleConfig::new(1, 2, vec![SignerLeaf::new(Address::repeat_byte(1), 1)]).into();
        let signature = WalletSignature::new(Address::repeat_byte(2), 0, config.clone());
        let request = SaveSignerSignaturesRequest {
            wallet: Address::repeat_byte(2),
            digest: hash_set_image_hash(config.image_hash()),
            chain_id: "0".into(),
            signature: &signature,
            to_config: &config,
            to_image_hash: config.image_hash(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chainID"], "0");
        assert!(json.get("toImageHash").is_some());
        assert!(json.get("toConfig").is_some());
    }

    #[test]
    fn test_deploy_hash_response_without_wallet() {
        let response: DeployHashResponse = serde_json::from_str("{}").unwrap();
        assert!(response.deploy_hash.is_none());
        assert!(response.context.is_none());
    }
}
