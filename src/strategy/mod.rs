/// Strategy Layer
///
/// A strategy decides which transactions the executor signs; the bundle lifecycle
/// only needs the ordered list and a human readable description.

pub mod abi;
pub mod scenarios;
pub mod static_strategy;

use crate::types::UnsignedTransaction;
use async_trait::async_trait;

pub use scenarios::{RescueStrategy, StrategyConfig, StrategyFile};
pub use static_strategy::StaticStrategy;

#[async_trait]
pub trait Strategy: Send + Sync {
    /// Transactions the executor should sign, in order. May be empty.
    async fn sponsored_transactions(&self) -> eyre::Result<Vec<UnsignedTransaction>>;

    async fn description(&self) -> String;
}
