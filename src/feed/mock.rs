//! In-memory balance source for paper runs and tests.

use super::BalanceSource;
use crate::pool::BalanceReport;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Balance source whose reports are set directly by the caller.
#[derive(Debug, Default)]
pub struct MockBalanceSource {
    balances: RwLock<HashMap<String, BalanceReport>>,
    fail_next: AtomicBool,
    fetch_count: AtomicU64,
}

impl MockBalanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the report returned for a pool.
    pub async fn set_balance(&self, pool_id: &str, report: BalanceReport) {
        self.balances.write().await.insert(pool_id.to_string(), report);
    }

    /// Make the next fetch fail, simulating a venue outage.
    pub fn fail_next_fetch(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of fetch attempts so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceSource for MockBalanceSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_balances(&self) -> Result<HashMap<String, BalanceReport>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("simulated balance fetch failure");
        }
        Ok(self.balances.read().await.clone())
    }
}
