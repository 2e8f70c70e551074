use super::{BlockInfo, BlockTag, ChainClient, WebSocketManager};
use crate::config::RescueConfig;
use crate::errors::BundleError;
use alloy_primitives::{Address, B256, Bytes, U64, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub(crate) const HEAD_CHANNEL_CAPACITY: usize = 100;

/// Consecutive polling failures tolerated before the head stream is closed
const MAX_POLL_FAILURES: u32 = 10;

/// Minimal JSON-RPC client over HTTP
#[derive(Debug, Clone)]
pub struct RpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
}

impl RpcClient {
    pub fn new(rpc_url: String, timeout: Duration) -> Result<Self, BundleError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BundleError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, rpc_url })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, BundleError> {
        let request_body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let response_json: Value = response.json().await?;
        decode_response(method, response_json)
    }
}

/// Extracts `result` from a JSON-RPC response, surfacing `error` as a transport failure.
pub(crate) fn decode_response<T: DeserializeOwned>(method: &str, response: Value) -> Result<T, BundleError> {
    if let Some(error) = response.get("error") {
        return Err(BundleError::Transport(format!("{} RPC error: {}", method, error)));
    }

    let result = response
        .get("result")
        .cloned()
        .ok_or_else(|| BundleError::Transport(format!("Missing result in {} response", method)))?;

    Ok(serde_json::from_value(result)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    number: U64,
    #[serde(default)]
    base_fee_per_gas: Option<U256>,
    #[serde(default)]
    transactions: Vec<B256>,
}

/// `ChainClient` backed by a JSON-RPC node
pub struct EthereumClient {
    rpc: RpcClient,
    websocket: Option<WebSocketManager>,
    poll_interval: Duration,
}

impl EthereumClient {
    pub fn new(rpc: RpcClient, websocket: Option<WebSocketManager>, poll_interval: Duration) -> Self {
        Self { rpc, websocket, poll_interval }
    }

    pub fn from_config(config: &RescueConfig) -> Result<Self, BundleError> {
        let rpc = RpcClient::new(config.rpc_http_url.clone(), config.http_timeout())?;
        let websocket = config.rpc_wss_url.clone().map(|url| {
            WebSocketManager::new(url, config.http_timeout(), 5, Duration::from_secs(2))
        });

        Ok(Self::new(rpc, websocket, config.head_poll_interval()))
    }

    async fn get_block(&self, tag: BlockTag) -> Result<Option<RpcBlock>, BundleError> {
        self.rpc.request("eth_getBlockByNumber", json!([tag.to_param(), false])).await
    }

    fn poll_heads(&self) -> mpsc::Receiver<u64> {
        let (head_tx, head_rx) = mpsc::channel(HEAD_CHANNEL_CAPACITY);
        let rpc = self.rpc.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            info!("Polling {} for new blocks every {:?}", rpc.rpc_url(), poll_interval);
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_seen: Option<u64> = None;
            let mut failures = 0;

            loop {
                tokio::select! {
                    _ = head_tx.closed() => {
                        debug!("Head receiver dropped, stopping poller");
                        break;
                    }
                    _ = ticker.tick() => {
                        match rpc.request::<U64>("eth_blockNumber", json!([])).await {
                            Ok(number) => {
                                failures = 0;
                                let number = number.to::<u64>();
                                if last_seen.is_none_or(|last| number > last) {
                                    last_seen = Some(number);
                                    if head_tx.send(number).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                failures += 1;
                                warn!("Failed to poll block number ({}/{}): {}", failures, MAX_POLL_FAILURES, e);
                                if failures >= MAX_POLL_FAILURES {
                                    error!("Giving up on block polling");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        head_rx
    }
}

#[async_trait]
impl ChainClient for EthereumClient {
    async fn latest_block(&self) -> Result<BlockInfo, BundleError> {
        let block = self
            .get_block(BlockTag::Latest)
            .await?
            .ok_or_else(|| BundleError::Transport("latest block not found".to_string()))?;

        Ok(BlockInfo { number: block.number.to::<u64>(), base_fee_per_gas: block.base_fee_per_gas })
    }

    async fn block_number(&self) -> Result<u64, BundleError> {
        let number: U64 = self.rpc.request("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    async fn block_transaction_hashes(&self, number: u64) -> Result<Option<Vec<B256>>, BundleError> {
        Ok(self.get_block(BlockTag::Number(number)).await?.map(|block| block.transactions))
    }

    async fn transaction_count(&self, address: Address, block: BlockTag) -> Result<u64, BundleError> {
        let count: U64 = self
            .rpc
            .request("eth_getTransactionCount", json!([format!("{:#x}", address), block.to_param()]))
            .await?;
        Ok(count.to::<u64>())
    }

    async fn chain_id(&self) -> Result<u64, BundleError> {
        let chain_id: U64 = self.rpc.request("eth_chainId", json!([])).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, BundleError> {
        let call = json!({ "to": format!("{:#x}", to), "data": data });
        self.rpc.request("eth_call", json!([call, BlockTag::Latest.to_param()])).await
    }

    async fn subscribe_heads(&self) -> Result<mpsc::Receiver<u64>, BundleError> {
        match &self.websocket {
            Some(websocket) => websocket.subscribe_new_heads().await,
            None => Ok(self.poll_heads()),
        }
    }
}
