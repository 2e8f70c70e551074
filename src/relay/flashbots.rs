use super::{BundleSimulation, Relay, SubmissionHandle, TransactionSimulation};
use crate::chain::{BlockTag, ChainClient};
use crate::config::RescueConfig;
use crate::errors::BundleError;
use crate::types::{SignedBundle, SubmissionResolution};
use alloy_primitives::{B256, U256, keccak256};
use alloy_signer::{Signer, SignerSync};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Flashbots-compatible relay client.
///
/// Every request is authenticated with `X-Flashbots-Signature`, an EIP-191 signature
/// over the hex keccak256 of the request body made with the relay signing key.
pub struct FlashbotsRelay<C: ?Sized> {
    http_client: reqwest::Client,
    relay_url: String,
    signer: PrivateKeySigner,
    chain: Arc<C>,
    resolution_timeout: Duration,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallBundleResponse {
    coinbase_diff: String,
    total_gas_used: u64,
    #[serde(default)]
    results: Vec<CallBundleTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallBundleTransaction {
    tx_hash: B256,
    #[serde(default)]
    gas_used: u64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    revert: Option<String>,
}

impl CallBundleResponse {
    fn into_simulation(self) -> Result<BundleSimulation, BundleError> {
        let coinbase_diff = U256::from_str(&self.coinbase_diff)
            .map_err(|e| BundleError::Transport(format!("Invalid coinbaseDiff {}: {}", self.coinbase_diff, e)))?;

        Ok(BundleSimulation {
            coinbase_diff,
            total_gas_used: self.total_gas_used,
            results: self
                .results
                .into_iter()
                .map(|tx| TransactionSimulation {
                    tx_hash: tx.tx_hash,
                    gas_used: tx.gas_used,
                    error: tx.error,
                    revert: tx.revert,
                })
                .collect(),
        })
    }
}

impl<C: ChainClient + ?Sized + 'static> FlashbotsRelay<C> {
    pub fn new(
        relay_url: String,
        signer: PrivateKeySigner,
        chain: Arc<C>,
        http_timeout: Duration,
        resolution_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, BundleError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| BundleError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, relay_url, signer, chain, resolution_timeout, poll_interval })
    }

    pub fn from_config(config: &RescueConfig, chain: Arc<C>) -> Result<Self, BundleError> {
        Self::new(
            config.relay_url.clone(),
            config.relay_signing_key.clone(),
            chain,
            config.http_timeout(),
            config.resolution_timeout(),
            config.head_poll_interval(),
        )
    }

    fn sign_request(&self, body_bytes: &[u8]) -> Result<String, BundleError> {
        let message_hash = keccak256(body_bytes).to_string();
        let signature = self.signer.sign_message_sync(message_hash.as_bytes())?;
        Ok(format!("{}:0x{}", self.signer.address(), hex::encode(signature.as_bytes())))
    }

    /// Posts a JSON-RPC request and returns the raw response object.
    async fn post(&self, method: &str, params: Value) -> Result<Value, BundleError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });
        let body_bytes = serde_json::to_vec(&body)?;
        let sig_header = self.sign_request(&body_bytes)?;

        let response = self
            .http_client
            .post(&self.relay_url)
            .header("Content-Type", "application/json")
            .header(
                "X-Flashbots-Signature",
                HeaderValue::from_str(&sig_header)
                    .map_err(|e| BundleError::Signing(format!("Signature header invalid: {}", e)))?,
            )
            .body(body_bytes)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(relay = %self.relay_url, method, %status, body = %text, "Relay response");

        serde_json::from_str(&text).map_err(|_| {
            BundleError::Transport(format!("Relay returned {} for {}: {}", status, method, text))
        })
    }
}

fn bundle_params(bundle: &SignedBundle, target_block: u64) -> Value {
    json!({
        "txs": bundle.raw_transactions(),
        "blockNumber": format!("0x{:x}", target_block),
    })
}

#[async_trait]
impl<C: ChainClient + ?Sized + 'static> Relay for FlashbotsRelay<C> {
    async fn simulate(&self, bundle: &SignedBundle, target_block: u64) -> Result<BundleSimulation, BundleError> {
        let mut params = bundle_params(bundle, target_block);
        params["stateBlockNumber"] = json!("latest");

        let response = self.post("eth_callBundle", json!([params])).await?;
        if let Some(error) = response.get("error") {
            return Err(BundleError::SimulationFailed(format!("Simulation Error: {}", error)));
        }

        let result = response
            .get("result")
            .cloned()
            .ok_or_else(|| BundleError::Transport("Missing result in eth_callBundle response".to_string()))?;

        serde_json::from_value::<CallBundleResponse>(result)?.into_simulation()
    }

    async fn send_bundle(
        &self,
        bundle: &SignedBundle,
        target_block: u64,
    ) -> Result<Box<dyn SubmissionHandle>, BundleError> {
        let response = self.post("eth_sendBundle", json!([bundle_params(bundle, target_block)])).await?;
        if let Some(error) = response.get("error") {
            return Err(BundleError::Transport(format!("Relay rejected eth_sendBundle: {}", error)));
        }

        let bundle_hash = response
            .get("result")
            .and_then(|result| result.get("bundleHash"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(target_block, bundle_hash, "Bundle submitted");

        Ok(Box::new(FlashbotsSubmission {
            chain: Arc::clone(&self.chain),
            bundle: bundle.clone(),
            target_block,
            timeout: self.resolution_timeout,
            poll_interval: self.poll_interval,
        }))
    }
}

/// Resolves a submission by watching the chain until the target block is mined
pub struct FlashbotsSubmission<C: ?Sized> {
    chain: Arc<C>,
    bundle: SignedBundle,
    target_block: u64,
    timeout: Duration,
    poll_interval: Duration,
}

impl<C: ChainClient + ?Sized> FlashbotsSubmission<C> {
    pub fn new(chain: Arc<C>, bundle: SignedBundle, target_block: u64, timeout: Duration, poll_interval: Duration) -> Self {
        Self { chain, bundle, target_block, timeout, poll_interval }
    }

    async fn wait_for_target(&self) -> Result<(), BundleError> {
        loop {
            if self.chain.block_number().await? >= self.target_block {
                return Ok(());
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl<C: ChainClient + ?Sized + 'static> SubmissionHandle for FlashbotsSubmission<C> {
    fn target_block(&self) -> u64 {
        self.target_block
    }

    async fn wait(&mut self) -> Result<SubmissionResolution, BundleError> {
        match timeout(self.timeout, self.wait_for_target()).await {
            Ok(reached) => reached?,
            Err(_) => {
                warn!(
                    target_block = self.target_block,
                    "Target block not observed within {:?}, treating as not included", self.timeout
                );
                return Ok(SubmissionResolution::BlockPassedWithoutInclusion);
            }
        }

        resolve_inclusion(&*self.chain, &self.bundle, self.target_block).await
    }
}

/// Decides what happened to `bundle` once the chain has reached `target_block`.
///
/// Included when every bundle transaction is in the target block; NonceTooHigh when
/// some sender has already used a nonce the bundle depends on.
pub async fn resolve_inclusion<C: ChainClient + ?Sized>(
    chain: &C,
    bundle: &SignedBundle,
    target_block: u64,
) -> Result<SubmissionResolution, BundleError> {
    let block_hashes = chain.block_transaction_hashes(target_block).await?.unwrap_or_default();
    if bundle.hashes().all(|hash| block_hashes.contains(hash)) {
        return Ok(SubmissionResolution::Included);
    }

    for (sender, nonce) in bundle.lowest_nonces() {
        let current = chain.transaction_count(sender, BlockTag::Latest).await?;
        if current > nonce {
            debug!(%sender, bundle_nonce = nonce, current, "Sender nonce moved past bundle");
            return Ok(SubmissionResolution::NonceTooHigh);
        }
    }

    Ok(SubmissionResolution::BlockPassedWithoutInclusion)
}
