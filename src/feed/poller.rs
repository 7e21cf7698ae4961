//! Pushes fetched balances into the controller.

use super::BalanceSource;
use crate::controller::AllocationController;
use crate::error::{AllocatorError, ConfigWarning};
use crate::pool::PoolId;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// What one polling pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Pools whose balances were replaced
    pub updated: Vec<PoolId>,
    /// Clamping warnings raised while ingesting
    pub warnings: Vec<ConfigWarning>,
    /// Pool ids reported by a source but not configured
    pub unknown_pools: Vec<String>,
    /// Sources whose fetch failed
    pub failed_sources: Vec<String>,
}

/// Polls balance sources and ingests their reports.
pub struct BalancePoller {
    controller: Arc<AllocationController>,
    sources: Vec<Arc<dyn BalanceSource>>,
}

impl BalancePoller {
    pub fn new(controller: Arc<AllocationController>) -> Self {
        Self {
            controller,
            sources: Vec::new(),
        }
    }

    /// Add a source; later sources win when two report the same pool.
    pub fn with_source(mut self, source: Arc<dyn BalanceSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Fetch from every source once and ingest the results.
    ///
    /// A failing source or an unconfigured pool never aborts the pass; both
    /// are collected in the report so the remaining pools still update.
    #[instrument(skip(self), name = "balance_poll")]
    pub async fn poll_once(&self) -> PollReport {
        let mut report = PollReport::default();

        for source in &self.sources {
            let balances = match source.fetch_balances().await {
                Ok(balances) => balances,
                Err(e) => {
                    error!(source = source.name(), "Balance fetch failed: {:#}", e);
                    report.failed_sources.push(source.name().to_string());
                    continue;
                }
            };

            let mut entries: Vec<_> = balances.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            for (pool_id, balance) in entries {
                match self.controller.ingest_balance(&pool_id, balance) {
                    Ok(warnings) => {
                        if let Ok(id) = self.controller.resolve(&pool_id) {
                            report.updated.push(id);
                        }
                        report.warnings.extend(warnings);
                    }
                    Err(AllocatorError::UnknownPool { pool_id }) => {
                        warn!(source = source.name(), pool = %pool_id, "Balance for unknown pool ignored");
                        report.unknown_pools.push(pool_id);
                    }
                    Err(e) => {
                        error!(source = source.name(), pool = %pool_id, "Balance ingest failed: {}", e);
                    }
                }
            }
        }

        debug!(
            updated = report.updated.len(),
            unknown = report.unknown_pools.len(),
            failed = report.failed_sources.len(),
            "Balance poll complete"
        );
        report
    }
}
