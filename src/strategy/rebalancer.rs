//! Cross-pool rebalance suggestions.
//!
//! Transfers between venues are manual; this only proposes one.

use super::PoolAllocation;
use crate::pool::PoolId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Proposed manual transfer between two pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceSuggestion {
    pub from_pool: PoolId,
    pub to_pool: PoolId,
    /// Equals the over-allocated pool's drift
    pub amount: Decimal,
}

/// Proposes a transfer when a pool drifts too far above its target.
#[derive(Debug, Clone)]
pub struct RebalanceAdvisor {
    drift_threshold: Decimal,
}

impl RebalanceAdvisor {
    pub fn new(drift_threshold: Decimal) -> Self {
        Self { drift_threshold }
    }

    pub fn drift_threshold(&self) -> Decimal {
        self.drift_threshold
    }

    /// Suggest moving the largest positive drift to the lowest-drift pool.
    ///
    /// The receiver need not be under target: with a reserve held inside the
    /// pools every drift can be positive, and the lowest one is still the
    /// best place for the funds. Returns `None` when no pool is over target
    /// by more than the threshold, or when there is only one pool. Ties go
    /// to the pool that sorts first.
    pub fn suggest(&self, allocations: &[PoolAllocation]) -> Option<RebalanceSuggestion> {
        let over = allocations
            .iter()
            .reduce(|best, a| if a.drift > best.drift { a } else { best })?;

        if over.drift <= self.drift_threshold {
            debug!(
                pool = %over.pool_id,
                drift = %over.drift,
                threshold = %self.drift_threshold,
                "Drift within threshold, no rebalance"
            );
            return None;
        }

        let under = allocations
            .iter()
            .filter(|a| a.pool_id != over.pool_id)
            .reduce(|best, a| if a.drift < best.drift { a } else { best })?;

        info!(
            from = %over.pool_id,
            to = %under.pool_id,
            amount = %over.drift,
            "Rebalance suggested"
        );

        Some(RebalanceSuggestion {
            from_pool: over.pool_id.clone(),
            to_pool: under.pool_id.clone(),
            amount: over.drift,
        })
    }
}
