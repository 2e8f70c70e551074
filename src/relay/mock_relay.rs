use super::{BundleSimulation, Relay, SubmissionHandle, TransactionSimulation};
use crate::errors::BundleError;
use crate::types::{SignedBundle, SubmissionResolution};
use alloy_primitives::U256;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted relay used to drive the scheduler and supervisor in tests.
///
/// Unscripted simulations succeed; unscripted resolutions are
/// `BlockPassedWithoutInclusion`.
#[derive(Debug, Clone, Default)]
pub struct MockRelay {
    inner: Arc<MockRelayInner>,
}

#[derive(Debug, Default)]
struct MockRelayInner {
    simulations: Mutex<VecDeque<Result<BundleSimulation, String>>>,
    resolutions: Mutex<VecDeque<Result<SubmissionResolution, String>>>,
    send_failures: Mutex<VecDeque<String>>,
    submitted_targets: Mutex<Vec<u64>>,
    simulated_targets: Mutex<Vec<u64>>,
    wait_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_simulation(&self, simulation: BundleSimulation) -> &Self {
        lock(&self.inner.simulations).push_back(Ok(simulation));
        self
    }

    /// Next simulation reports a revert inside the bundle.
    pub fn push_revert(&self, reason: &str) -> &Self {
        let simulation = BundleSimulation {
            coinbase_diff: U256::ZERO,
            total_gas_used: 21_000,
            results: vec![TransactionSimulation {
                tx_hash: Default::default(),
                gas_used: 21_000,
                error: None,
                revert: Some(reason.to_string()),
            }],
        };
        lock(&self.inner.simulations).push_back(Ok(simulation));
        self
    }

    /// Next simulation call fails at the transport level.
    pub fn push_simulation_error(&self, message: &str) -> &Self {
        lock(&self.inner.simulations).push_back(Err(message.to_string()));
        self
    }

    pub fn push_resolution(&self, resolution: SubmissionResolution) -> &Self {
        lock(&self.inner.resolutions).push_back(Ok(resolution));
        self
    }

    pub fn push_resolution_error(&self, message: &str) -> &Self {
        lock(&self.inner.resolutions).push_back(Err(message.to_string()));
        self
    }

    pub fn fail_next_send(&self, message: &str) -> &Self {
        lock(&self.inner.send_failures).push_back(message.to_string());
        self
    }

    pub fn set_wait_delay(&self, delay: Duration) -> &Self {
        *lock(&self.inner.wait_delay) = Some(delay);
        self
    }

    pub fn simulate_calls(&self) -> usize {
        lock(&self.inner.simulated_targets).len()
    }

    pub fn send_calls(&self) -> usize {
        lock(&self.inner.submitted_targets).len()
    }

    pub fn submitted_targets(&self) -> Vec<u64> {
        lock(&self.inner.submitted_targets).clone()
    }

    pub fn simulated_targets(&self) -> Vec<u64> {
        lock(&self.inner.simulated_targets).clone()
    }

    /// Highest number of submissions awaiting resolution at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn default_simulation(bundle: &SignedBundle) -> BundleSimulation {
        let gas_used = 21_000u64;
        BundleSimulation {
            coinbase_diff: U256::from(gas_used) * U256::from(bundle.transactions.len() as u64),
            total_gas_used: gas_used * bundle.transactions.len() as u64,
            results: bundle
                .transactions
                .iter()
                .map(|tx| TransactionSimulation { tx_hash: tx.hash, gas_used, error: None, revert: None })
                .collect(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Relay for MockRelay {
    async fn simulate(&self, bundle: &SignedBundle, target_block: u64) -> Result<BundleSimulation, BundleError> {
        lock(&self.inner.simulated_targets).push(target_block);
        match lock(&self.inner.simulations).pop_front() {
            Some(Ok(simulation)) => Ok(simulation),
            Some(Err(message)) => Err(BundleError::Transport(message)),
            None => Ok(Self::default_simulation(bundle)),
        }
    }

    async fn send_bundle(
        &self,
        _bundle: &SignedBundle,
        target_block: u64,
    ) -> Result<Box<dyn SubmissionHandle>, BundleError> {
        lock(&self.inner.submitted_targets).push(target_block);
        if let Some(message) = lock(&self.inner.send_failures).pop_front() {
            return Err(BundleError::Transport(message));
        }

        let in_flight = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        Ok(Box::new(MockSubmission { relay: self.clone(), target_block, finished: false }))
    }
}

struct MockSubmission {
    relay: MockRelay,
    target_block: u64,
    finished: bool,
}

#[async_trait]
impl SubmissionHandle for MockSubmission {
    fn target_block(&self) -> u64 {
        self.target_block
    }

    async fn wait(&mut self) -> Result<SubmissionResolution, BundleError> {
        let delay = *lock(&self.relay.inner.wait_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.finished {
            self.finished = true;
            self.relay.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        match lock(&self.relay.inner.resolutions).pop_front() {
            Some(Ok(resolution)) => Ok(resolution),
            Some(Err(message)) => Err(BundleError::Transport(message)),
            None => Ok(SubmissionResolution::BlockPassedWithoutInclusion),
        }
    }
}
