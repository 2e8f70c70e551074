use super::builder::BundleBuilder;
use super::gas::GasPricer;
use super::scheduler::SubmissionScheduler;
use super::signer::{Identities, sign_bundle};
use super::simulation::SimulationGate;
use crate::chain::ChainClient;
use crate::config::RescueConfig;
use crate::errors::BundleError;
use crate::relay::Relay;
use crate::strategy::Strategy;
use crate::types::{CycleOutcome, SignerRole};
use crate::utils::{gas_price_to_gwei, log_bundle};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// One full attempt at getting the bundle included.
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run_cycle(&self) -> Result<CycleOutcome, BundleError>;
}

/// strategy -> gas plan -> build -> sign -> simulate -> resubmit per head
pub struct BundlePipeline<C: ?Sized, R: ?Sized> {
    chain: Arc<C>,
    relay: Arc<R>,
    strategy: Arc<dyn Strategy>,
    identities: Identities,
    gas_pricer: GasPricer,
    blocks_in_future: u64,
}

impl<C, R> BundlePipeline<C, R>
where
    C: ChainClient + ?Sized,
    R: Relay + ?Sized,
{
    pub fn new(
        chain: Arc<C>,
        relay: Arc<R>,
        strategy: Arc<dyn Strategy>,
        identities: Identities,
        gas_pricer: GasPricer,
        blocks_in_future: u64,
    ) -> Self {
        Self { chain, relay, strategy, identities, gas_pricer, blocks_in_future }
    }

    pub fn from_config(config: &RescueConfig, chain: Arc<C>, relay: Arc<R>, strategy: Arc<dyn Strategy>) -> Self {
        Self::new(
            chain,
            relay,
            strategy,
            Identities::from_config(config),
            GasPricer::new(config.priority_fee),
            config.blocks_in_future,
        )
    }
}

#[async_trait]
impl<C, R> Cycle for BundlePipeline<C, R>
where
    C: ChainClient + ?Sized + 'static,
    R: Relay + ?Sized + 'static,
{
    async fn run_cycle(&self) -> Result<CycleOutcome, BundleError> {
        let transactions = self.strategy.sponsored_transactions().await?;
        info!("{}", self.strategy.description().await);
        if transactions.is_empty() {
            info!("Strategy produced no transactions, nothing to do");
            return Ok(CycleOutcome::NothingToDo);
        }

        let block = self.chain.latest_block().await?;
        let plan = self.gas_pricer.plan(block.base_fee_per_gas, &transactions)?;
        info!(
            block = block.number,
            total_gas = plan.total_gas,
            gas_price_gwei = %gas_price_to_gwei(plan.gas_price),
            funding_wei = %plan.funding_value(),
            "Gas plan"
        );

        let bundle = BundleBuilder::build(
            &transactions,
            self.identities.address(SignerRole::Sponsor),
            self.identities.address(SignerRole::Executor),
            &plan,
        )?;
        let signed = sign_bundle(&*self.chain, &self.identities, &bundle).await?;
        log_bundle(&bundle, &signed);

        let gate = SimulationGate::new(Arc::clone(&self.relay));
        let simulation = gate.simulate(&signed, block.number + self.blocks_in_future).await?;
        info!(
            "Simulated gas price: {} gwei, requested: {} gwei",
            gas_price_to_gwei(simulation.effective_gas_price),
            gas_price_to_gwei(plan.gas_price)
        );

        let heads = self.chain.subscribe_heads().await?;
        SubmissionScheduler::new(Arc::clone(&self.relay), self.blocks_in_future).run(&signed, heads).await
    }
}
