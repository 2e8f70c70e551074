use crate::errors::BundleError;
use crate::relay::Relay;
use crate::types::{SignedBundle, SimulationResult};
use crate::utils::gas_price_to_gwei;
use alloy_primitives::U256;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dry-runs signed bundles through the relay and refuses any that revert.
pub struct SimulationGate<R: ?Sized> {
    relay: Arc<R>,
}

impl<R: Relay + ?Sized> SimulationGate<R> {
    pub fn new(relay: Arc<R>) -> Self {
        Self { relay }
    }

    pub async fn simulate(&self, bundle: &SignedBundle, target_block: u64) -> Result<SimulationResult, BundleError> {
        let simulation = self.relay.simulate(bundle, target_block).await?;

        if let Some((index, failure)) =
            simulation.results.iter().enumerate().find_map(|(i, tx)| tx.failure().map(|f| (i, f)))
        {
            warn!(target_block, index, tx_hash = %simulation.results[index].tx_hash, failure, "Bundle simulation reverted");
            return Err(BundleError::SimulationFailed(format!("transaction {} failed: {}", index, failure)));
        }

        let effective_gas_price = if simulation.total_gas_used == 0 {
            U256::ZERO
        } else {
            simulation.coinbase_diff / U256::from(simulation.total_gas_used)
        };
        debug!(
            target_block,
            total_gas_used = simulation.total_gas_used,
            effective_gas_price_gwei = %gas_price_to_gwei(effective_gas_price),
            "Bundle simulation succeeded"
        );

        Ok(SimulationResult {
            effective_gas_price,
            total_gas_used: simulation.total_gas_used,
            coinbase_diff: simulation.coinbase_diff,
        })
    }
}
