use super::simulation::SimulationGate;
use crate::errors::BundleError;
use crate::relay::Relay;
use crate::types::{CycleOutcome, SignedBundle, SubmissionResolution};
use crate::utils::gas_price_to_gwei;
use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Simulating,
    Submitting,
    AwaitingResolution,
    Done,
    Failed,
}

/// Resubmits one signed bundle on every new head until it resolves decisively.
///
/// At most one submission is ever in flight. Heads that arrive while a submission is
/// awaiting resolution queue up in the channel; once it resolves, the backlog is drained
/// and only the newest head is targeted.
pub struct SubmissionScheduler<R: ?Sized> {
    relay: Arc<R>,
    gate: SimulationGate<R>,
    blocks_in_future: u64,
    state: SchedulerState,
    last_head: Option<u64>,
}

impl<R: Relay + ?Sized> SubmissionScheduler<R> {
    pub fn new(relay: Arc<R>, blocks_in_future: u64) -> Self {
        Self {
            gate: SimulationGate::new(Arc::clone(&relay)),
            relay,
            blocks_in_future,
            state: SchedulerState::Idle,
            last_head: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Drives the bundle until a terminal resolution. The head stream ending first is a transport failure.
    pub async fn run(
        &mut self,
        bundle: &SignedBundle,
        mut heads: mpsc::Receiver<u64>,
    ) -> Result<CycleOutcome, BundleError> {
        while let Some(mut head) = heads.recv().await {
            while let Ok(newer) = heads.try_recv() {
                debug!(skipped = head, newer, "Skipping queued head");
                head = head.max(newer);
            }
            if let Some(outcome) = self.on_head(bundle, head).await? {
                return Ok(outcome);
            }
        }

        self.state = SchedulerState::Failed;
        error!(last_head = ?self.last_head, "Head stream ended before the bundle resolved");
        Err(BundleError::Transport("head stream ended".to_string()))
    }

    /// Processes one head. `Ok(None)` means the bundle missed its block and the scheduler is idle again.
    pub async fn on_head(&mut self, bundle: &SignedBundle, head: u64) -> Result<Option<CycleOutcome>, BundleError> {
        if matches!(self.state, SchedulerState::Done | SchedulerState::Failed) {
            return Err(BundleError::Transport(format!("scheduler already {}", self.state)));
        }
        if matches!(self.last_head, Some(last) if head <= last) {
            debug!(head, last_head = ?self.last_head, "Dropping stale head");
            return Ok(None);
        }
        self.last_head = Some(head);

        let target_block = head + self.blocks_in_future;

        self.state = SchedulerState::Simulating;
        let simulation = self.gate.simulate(bundle, target_block).await.inspect_err(|_| self.fail())?;
        info!(
            "Current Block: {}. Target Block: {}. gasPrice: {} gwei",
            head,
            target_block,
            gas_price_to_gwei(simulation.effective_gas_price)
        );

        self.state = SchedulerState::Submitting;
        let mut submission = self.relay.send_bundle(bundle, target_block).await.inspect_err(|_| self.fail())?;

        self.state = SchedulerState::AwaitingResolution;
        let resolution = submission.wait().await.inspect_err(|_| self.fail())?;

        match resolution {
            SubmissionResolution::Included => {
                self.state = SchedulerState::Done;
                info!("Congrats, included in {}", submission.target_block());
                Ok(Some(CycleOutcome::Included { block: submission.target_block() }))
            }
            SubmissionResolution::NonceTooHigh => {
                self.state = SchedulerState::Done;
                warn!("Nonce too high, bailing (target block {})", submission.target_block());
                Ok(Some(CycleOutcome::NonceTooHigh { block: submission.target_block() }))
            }
            SubmissionResolution::BlockPassedWithoutInclusion => {
                self.state = SchedulerState::Idle;
                info!("Not included in {}", submission.target_block());
                Ok(None)
            }
        }
    }

    fn fail(&mut self) {
        self.state = SchedulerState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::MockRelay;
    use std::time::Duration;
    use tokio::time::sleep;

    fn bundle() -> SignedBundle {
        SignedBundle { transactions: vec![] }
    }

    fn heads(numbers: &[u64]) -> mpsc::Receiver<u64> {
        let (tx, rx) = mpsc::channel(numbers.len().max(1));
        for number in numbers {
            tx.try_send(*number).unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn test_block_passed_returns_to_idle() {
        let relay = Arc::new(MockRelay::new());
        let mut scheduler = SubmissionScheduler::new(Arc::clone(&relay), 2);

        let outcome = scheduler.on_head(&bundle(), 100).await.unwrap();
        assert_eq!(outcome, None);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(relay.submitted_targets(), vec![102]);
        assert_eq!(relay.simulated_targets(), vec![102]);
    }

    #[tokio::test]
    async fn test_stale_heads_are_dropped() {
        let relay = Arc::new(MockRelay::new());
        relay
            .push_resolution(SubmissionResolution::BlockPassedWithoutInclusion)
            .push_resolution(SubmissionResolution::Included);
        let mut scheduler = SubmissionScheduler::new(Arc::clone(&relay), 2);

        assert_eq!(scheduler.on_head(&bundle(), 10).await.unwrap(), None);
        assert_eq!(scheduler.on_head(&bundle(), 10).await.unwrap(), None);
        assert_eq!(scheduler.on_head(&bundle(), 9).await.unwrap(), None);
        assert_eq!(relay.send_calls(), 1);

        let outcome = scheduler.on_head(&bundle(), 11).await.unwrap();
        assert_eq!(outcome, Some(CycleOutcome::Included { block: 13 }));
        assert_eq!(relay.submitted_targets(), vec![12, 13]);
        assert_eq!(scheduler.state(), SchedulerState::Done);
    }

    #[tokio::test]
    async fn test_queued_heads_collapse_to_newest() {
        let relay = Arc::new(MockRelay::new());
        relay.push_resolution(SubmissionResolution::Included);
        let mut scheduler = SubmissionScheduler::new(Arc::clone(&relay), 2);

        let outcome = scheduler.run(&bundle(), heads(&[10, 12, 11])).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Included { block: 14 });
        assert_eq!(relay.simulated_targets(), vec![14]);
        assert_eq!(relay.submitted_targets(), vec![14]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heads_behind_a_slow_resolution_are_skipped() {
        let relay = Arc::new(MockRelay::new());
        relay
            .set_wait_delay(Duration::from_secs(30))
            .push_resolution(SubmissionResolution::BlockPassedWithoutInclusion)
            .push_resolution(SubmissionResolution::Included);
        let mut scheduler = SubmissionScheduler::new(Arc::clone(&relay), 2);

        let (head_tx, head_rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for head in 20..24 {
                if head_tx.send(head).await.is_err() {
                    break;
                }
                sleep(Duration::from_secs(12)).await;
            }
        });

        // 20 resolves at t=30 while 21 and 22 are queued; 22 wins
        let outcome = scheduler.run(&bundle(), head_rx).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Included { block: 24 });
        assert_eq!(relay.submitted_targets(), vec![22, 24]);
        assert_eq!(relay.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_nonce_too_high_stops_immediately() {
        let relay = Arc::new(MockRelay::new());
        relay.push_resolution(SubmissionResolution::NonceTooHigh);
        let mut scheduler = SubmissionScheduler::new(Arc::clone(&relay), 1);

        let outcome = scheduler.run(&bundle(), heads(&[50, 51, 52])).await.unwrap();
        assert_eq!(outcome, CycleOutcome::NonceTooHigh { block: 53 });
        assert_eq!(relay.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_end_of_head_stream_is_transport_failure() {
        let relay = Arc::new(MockRelay::new());
        let mut scheduler = SubmissionScheduler::new(Arc::clone(&relay), 2);

        let error = scheduler.run(&bundle(), heads(&[7])).await.unwrap_err();
        assert!(matches!(error, BundleError::Transport(_)));
        assert_eq!(scheduler.state(), SchedulerState::Failed);
        assert_eq!(relay.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_simulation_failure_skips_submission() {
        let relay = Arc::new(MockRelay::new());
        relay.push_revert("execution reverted");
        let mut scheduler = SubmissionScheduler::new(Arc::clone(&relay), 2);

        let error = scheduler.on_head(&bundle(), 7).await.unwrap_err();
        assert!(matches!(error, BundleError::SimulationFailed(_)));
        assert_eq!(scheduler.state(), SchedulerState::Failed);
        assert_eq!(relay.send_calls(), 0);

        assert!(scheduler.on_head(&bundle(), 8).await.is_err());
        assert_eq!(relay.simulate_calls(), 1);
    }

    #[tokio::test]
    async fn test_relay_rejection_fails() {
        let relay = Arc::new(MockRelay::new());
        relay.fail_next_send("bundle rejected");
        let mut scheduler = SubmissionScheduler::new(Arc::clone(&relay), 2);

        let error = scheduler.run(&bundle(), heads(&[7, 8])).await.unwrap_err();
        assert!(matches!(error, BundleError::Transport(_)));
        assert_eq!(relay.send_calls(), 1);
    }
}
