/// Chain Access Layer
///
/// Narrow read-only view of the chain the bundle lifecycle depends on:
/// - latest block and base fee for gas pricing
/// - account nonces for signing and for detecting invalidated bundles
/// - block contents for inclusion checks
/// - read-only contract calls for strategies (token balances)
/// - new-head notifications (WebSocket `newHeads` or HTTP polling)

pub mod rpc;
pub mod websocket;
pub mod mock_chain;

use crate::errors::BundleError;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use mock_chain::MockChain;
pub use rpc::{EthereumClient, RpcClient};
pub use websocket::{BlockHeader, WebSocketManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    /// Absent on chains without EIP-1559
    pub base_fee_per_gas: Option<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Pending => "pending".to_string(),
            Self::Number(number) => format!("0x{:x}", number),
        }
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn latest_block(&self) -> Result<BlockInfo, BundleError>;

    async fn block_number(&self) -> Result<u64, BundleError>;

    /// Hashes of the transactions in a block, `None` if the block is unknown.
    async fn block_transaction_hashes(&self, number: u64) -> Result<Option<Vec<B256>>, BundleError>;

    async fn transaction_count(&self, address: Address, block: BlockTag) -> Result<u64, BundleError>;

    async fn chain_id(&self) -> Result<u64, BundleError>;

    /// `eth_call` against the latest state.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, BundleError>;

    /// Stream of new head block numbers. The stream ends when the source gives up.
    async fn subscribe_heads(&self) -> Result<mpsc::Receiver<u64>, BundleError>;
}
