use super::pipeline::Cycle;
use crate::config::RescueConfig;
use crate::errors::BundleError;
use crate::types::CycleOutcome;
use crate::utils::constants::DEFAULT_RETRY_DELAY_MS;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS), max_attempts: None }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RescueConfig) -> Self {
        Self { delay: config.retry_delay(), max_attempts: None }
    }

    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self { delay, max_attempts: Some(max_attempts) }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Restarts the whole cycle from the strategy query after every recoverable failure.
pub struct OuterSupervisor<P> {
    cycle: P,
    policy: RetryPolicy,
}

impl<P: Cycle> OuterSupervisor<P> {
    pub fn new(cycle: P, policy: RetryPolicy) -> Self {
        Self { cycle, policy }
    }

    pub async fn run(&self) -> Result<CycleOutcome, BundleError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.cycle.run_cycle().await {
                Ok(outcome) => {
                    info!(attempt, ?outcome, "Cycle finished");
                    return Ok(outcome);
                }
                Err(BundleError::EmptyWork) => {
                    info!(attempt, "Nothing to rescue, exiting");
                    return Ok(CycleOutcome::NothingToDo);
                }
                Err(e) if !e.is_recoverable() => {
                    error!(attempt, error = %e, "Unrecoverable error, giving up");
                    return Err(e);
                }
                Err(e) if self.policy.exhausted(attempt) => {
                    error!(attempt, error = %e, "Retry attempts exhausted");
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Cycle failed, restarting in {:?}", self.policy.delay);
                    sleep(self.policy.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned cycle results in order
    struct ScriptedCycle {
        results: Mutex<VecDeque<Result<CycleOutcome, BundleError>>>,
        runs: Mutex<u32>,
    }

    impl ScriptedCycle {
        fn new(results: Vec<Result<CycleOutcome, BundleError>>) -> Self {
            Self { results: Mutex::new(results.into()), runs: Mutex::new(0) }
        }

        fn runs(&self) -> u32 {
            *self.runs.lock().unwrap()
        }
    }

    #[async_trait]
    impl Cycle for ScriptedCycle {
        async fn run_cycle(&self) -> Result<CycleOutcome, BundleError> {
            *self.runs.lock().unwrap() += 1;
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BundleError::Transport("script exhausted".to_string())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_work_is_nothing_to_do() {
        let supervisor = OuterSupervisor::new(
            ScriptedCycle::new(vec![Err(BundleError::Transport("timeout".to_string())), Err(BundleError::EmptyWork)]),
            RetryPolicy::bounded(Duration::from_secs(1), 5),
        );

        let outcome = supervisor.run().await.unwrap();
        assert_eq!(outcome, CycleOutcome::NothingToDo);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(supervisor.cycle.runs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_returns_last_error() {
        let supervisor = OuterSupervisor::new(
            ScriptedCycle::new(vec![
                Err(BundleError::Transport("first".to_string())),
                Err(BundleError::SimulationFailed("second".to_string())),
            ]),
            RetryPolicy::bounded(Duration::from_secs(1), 2),
        );

        let error = supervisor.run().await.unwrap_err();
        assert!(matches!(error, BundleError::SimulationFailed(_)));
        assert_eq!(supervisor.cycle.runs(), 2);
    }
}
