/// Relay Layer
///
/// Private bundle submission to block builders:
/// - dry-run simulation of a signed bundle (`eth_callBundle`)
/// - submission addressed to one target block (`eth_sendBundle`)
/// - resolution of what happened at that block

pub mod flashbots;
pub mod mock_relay;

use crate::errors::BundleError;
use crate::types::{SignedBundle, SubmissionResolution};
use alloy_primitives::{B256, U256};
use async_trait::async_trait;

pub use flashbots::{FlashbotsRelay, FlashbotsSubmission, resolve_inclusion};
pub use mock_relay::MockRelay;

/// Per-transaction outcome of a bundle simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSimulation {
    pub tx_hash: B256,
    pub gas_used: u64,
    pub error: Option<String>,
    pub revert: Option<String>,
}

impl TransactionSimulation {
    pub fn failure(&self) -> Option<&str> {
        self.error.as_deref().or(self.revert.as_deref())
    }
}

/// Raw simulation report as returned by the relay
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BundleSimulation {
    pub coinbase_diff: U256,
    pub total_gas_used: u64,
    pub results: Vec<TransactionSimulation>,
}

#[async_trait]
pub trait Relay: Send + Sync {
    async fn simulate(&self, bundle: &SignedBundle, target_block: u64) -> Result<BundleSimulation, BundleError>;

    async fn send_bundle(
        &self,
        bundle: &SignedBundle,
        target_block: u64,
    ) -> Result<Box<dyn SubmissionHandle>, BundleError>;
}

/// A submitted bundle whose fate at `target_block` is not known yet
#[async_trait]
pub trait SubmissionHandle: Send {
    fn target_block(&self) -> u64;

    async fn wait(&mut self) -> Result<SubmissionResolution, BundleError>;
}
