//! JSON-RPC relayer client.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AccountError, Result};
use crate::network::NetworkConfig;
use crate::relayer::{RelayReceipt, RelayRequest, Relayer};

#[derive(Serialize)]
struct NonceRequest {
    wallet: Address,
}

#[derive(Deserialize)]
struct NonceResponse {
    nonce: U256,
}

#[derive(Serialize)]
struct SendMetaTxnRequest<'a> {
    call: &'a RelayRequest,
}

#[derive(Deserialize)]
struct SendMetaTxnResponse {
    status: bool,
    #[serde(rename = "txnHash")]
    txn_hash: String,
}

/// Relayer reached over `POST {url}/rpc/Relayer/<Method>`.
#[derive(Clone, Debug)]
pub struct RpcRelayer {
    url: String,
    client: reqwest::Client,
}

impl RpcRelayer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Relayer configured for `network`.
    pub fn for_network(network: &NetworkConfig) -> Result<Self> {
        network
            .relayer
            .as_ref()
            .map(|r| Self::new(r.url.clone()))
            .ok_or(AccountError::MissingRelayer(network.chain_id))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/rpc/Relayer/{}", self.url.trim_end_matches('/'), method)
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<Resp> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AccountError::NetworkError {
                reason: format!("relayer {} returned {}: {}", method, status, body),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Relayer for RpcRelayer {
    async fn nonce(&self, wallet: Address) -> Result<U256> {
        let response: NonceResponse = self.post("GetMetaTxnNonce", &NonceRequest { wallet }).await?;
        Ok(response.nonce)
    }

    async fn relay(&self, request: &RelayRequest) -> Result<RelayReceipt> {
        let response: SendMetaTxnResponse = self
            .post("SendMetaTxn", &SendMetaTxnRequest { call: request })
            .await?;
        if !response.status {
            return Err(AccountError::NetworkError {
                reason: format!("relayer rejected bundle for {:?}", request.wallet),
            });
        }
        info!(wallet = ?request.wallet, chain_id = request.chain_id, txn = %response.txn_hash, "bundle relayed");
        Ok(RelayReceipt {
            txn_hash: response.txn_hash,
        })
    }
}
