use super::Strategy;
use crate::types::UnsignedTransaction;
use async_trait::async_trait;
use eyre::{Result, eyre};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Strategy returning a fixed list of transactions.
///
/// Scripted failures are consumed one per call before the list is returned.
#[derive(Debug, Default)]
pub struct StaticStrategy {
    transactions: Vec<UnsignedTransaction>,
    failures: Mutex<VecDeque<String>>,
    pub calls: AtomicUsize,
}

impl StaticStrategy {
    pub fn new(transactions: Vec<UnsignedTransaction>) -> Self {
        Self { transactions, ..Default::default() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fail_next(self, message: &str) -> Self {
        self.failures.lock().unwrap_or_else(|e| e.into_inner()).push_back(message.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Strategy for StaticStrategy {
    async fn sponsored_transactions(&self) -> Result<Vec<UnsignedTransaction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            return Err(eyre!(message));
        }
        Ok(self.transactions.clone())
    }

    async fn description(&self) -> String {
        format!("Static list of {} transaction(s)", self.transactions.len())
    }
}
