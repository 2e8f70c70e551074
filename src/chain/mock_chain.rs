use super::{BlockInfo, BlockTag, ChainClient};
use crate::errors::BundleError;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// In-memory chain for exercising the bundle lifecycle without a node.
///
/// Each `subscribe_heads` call replays the configured heads and then ends the stream.
/// Without a head interval every head is queued up front; with one, heads arrive one
/// interval apart on the tokio clock.
#[derive(Debug)]
pub struct MockChain {
    state: Mutex<MockChainState>,
    pub latest_block_calls: AtomicUsize,
    pub subscriptions: AtomicUsize,
}

#[derive(Debug, Clone)]
struct MockChainState {
    chain_id: u64,
    block_number: u64,
    base_fee: Option<U256>,
    heads: Vec<u64>,
    head_interval: Option<Duration>,
    blocks: HashMap<u64, Vec<B256>>,
    nonces: HashMap<Address, u64>,
    pending_nonces: HashMap<Address, u64>,
    call_results: HashMap<(Address, Bytes), Bytes>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockChainState {
                chain_id: 1,
                block_number: 0,
                base_fee: None,
                heads: Vec::new(),
                head_interval: None,
                blocks: HashMap::new(),
                nonces: HashMap::new(),
                pending_nonces: HashMap::new(),
                call_results: HashMap::new(),
            }),
            latest_block_calls: AtomicUsize::new(0),
            subscriptions: AtomicUsize::new(0),
        }
    }

    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.update(|state| state.chain_id = chain_id);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.set_block_number(block_number);
        self
    }

    pub fn with_base_fee(self, base_fee: U256) -> Self {
        self.update(|state| state.base_fee = Some(base_fee));
        self
    }

    pub fn with_heads(self, heads: Vec<u64>) -> Self {
        self.update(|state| state.heads = heads);
        self
    }

    pub fn with_head_interval(self, interval: Duration) -> Self {
        self.update(|state| state.head_interval = Some(interval));
        self
    }

    /// Mined transaction count (`latest`); also the pending count unless one is set.
    pub fn with_nonce(self, address: Address, nonce: u64) -> Self {
        self.set_nonce(address, nonce);
        self
    }

    /// Transaction count including the mempool (`pending`).
    pub fn with_pending_nonce(self, address: Address, nonce: u64) -> Self {
        self.update(|state| {
            state.pending_nonces.insert(address, nonce);
        });
        self
    }

    /// Scripts the output of an `eth_call` with exactly this target and calldata.
    pub fn with_call_result(self, to: Address, data: impl Into<Bytes>, output: impl Into<Bytes>) -> Self {
        let (data, output) = (data.into(), output.into());
        self.update(|state| {
            state.call_results.insert((to, data), output);
        });
        self
    }

    pub fn set_block_number(&self, block_number: u64) {
        self.update(|state| state.block_number = block_number);
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.update(|state| {
            state.nonces.insert(address, nonce);
        });
    }

    pub fn include_block(&self, number: u64, hashes: Vec<B256>) {
        self.update(|state| {
            state.blocks.insert(number, hashes);
        });
    }

    fn update(&self, f: impl FnOnce(&mut MockChainState)) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }

    fn snapshot(&self) -> MockChainState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn latest_block(&self) -> Result<BlockInfo, BundleError> {
        self.latest_block_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.snapshot();
        Ok(BlockInfo { number: state.block_number, base_fee_per_gas: state.base_fee })
    }

    async fn block_number(&self) -> Result<u64, BundleError> {
        Ok(self.snapshot().block_number)
    }

    async fn block_transaction_hashes(&self, number: u64) -> Result<Option<Vec<B256>>, BundleError> {
        let state = self.snapshot();
        if number > state.block_number {
            return Ok(None);
        }
        Ok(Some(state.blocks.get(&number).cloned().unwrap_or_default()))
    }

    async fn transaction_count(&self, address: Address, block: BlockTag) -> Result<u64, BundleError> {
        let state = self.snapshot();
        let mined = state.nonces.get(&address).copied().unwrap_or_default();
        match block {
            BlockTag::Pending => Ok(state.pending_nonces.get(&address).copied().unwrap_or(mined)),
            BlockTag::Latest | BlockTag::Number(_) => Ok(mined),
        }
    }

    async fn chain_id(&self) -> Result<u64, BundleError> {
        Ok(self.snapshot().chain_id)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, BundleError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .call_results
            .get(&(to, data))
            .cloned()
            .ok_or_else(|| BundleError::Transport(format!("execution reverted: no mock result for call to {}", to)))
    }

    async fn subscribe_heads(&self) -> Result<mpsc::Receiver<u64>, BundleError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let state = self.snapshot();
        let (head_tx, head_rx) = mpsc::channel(state.heads.len().max(1));

        match state.head_interval {
            None => {
                for head in state.heads {
                    head_tx
                        .try_send(head)
                        .map_err(|e| BundleError::Transport(format!("mock head channel: {}", e)))?;
                }
            }
            Some(interval) => {
                tokio::spawn(async move {
                    for head in state.heads {
                        sleep(interval).await;
                        if head_tx.send(head).await.is_err() {
                            break;
                        }
                    }
                });
            }
        }

        Ok(head_rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pending_count_falls_back_to_mined() {
        let sender = Address::repeat_byte(0x0e);
        let chain = MockChain::new().with_nonce(sender, 3);
        assert_eq!(chain.transaction_count(sender, BlockTag::Pending).await.unwrap(), 3);

        let chain = chain.with_pending_nonce(sender, 4);
        assert_eq!(chain.transaction_count(sender, BlockTag::Latest).await.unwrap(), 3);
        assert_eq!(chain.transaction_count(sender, BlockTag::Pending).await.unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heads_arrive_one_interval_apart() {
        let chain = MockChain::new().with_heads(vec![5, 6]).with_head_interval(Duration::from_secs(12));
        let mut heads = chain.subscribe_heads().await.unwrap();

        let started = tokio::time::Instant::now();
        assert_eq!(heads.recv().await, Some(5));
        assert_eq!(heads.recv().await, Some(6));
        assert_eq!(heads.recv().await, None);
        assert!(started.elapsed() >= Duration::from_secs(24));
    }
}
