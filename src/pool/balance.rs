//! Balance ingestion from external venue fetchers.

use super::{PoolId, ResourcePool};
use crate::error::{AllocatorError, BalanceField, ConfigWarning};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Funds reported by a venue balance fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceReport {
    /// Free funds that can back a new trade
    pub available: Decimal,
    /// Funds currently committed to open positions
    #[serde(default)]
    pub in_positions: Decimal,
    /// Funds in flight (deposits, withdrawals, unsettled)
    #[serde(default)]
    pub pending: Decimal,
}

impl BalanceReport {
    pub fn new(available: Decimal, in_positions: Decimal, pending: Decimal) -> Self {
        Self {
            available,
            in_positions,
            pending,
        }
    }

    /// Sum of all three fields, `None` if it does not fit in a `Decimal`.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.available
            .checked_add(self.in_positions)?
            .checked_add(self.pending)
    }

    /// Replace negative fields with zero, reporting each replacement.
    fn clamped(self, pool_id: &PoolId) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let mut clamp = |field: BalanceField, value: Decimal| {
            if value < Decimal::ZERO {
                warnings.push(ConfigWarning::NegativeBalanceClamped {
                    pool_id: pool_id.to_string(),
                    field,
                    value,
                });
                Decimal::ZERO
            } else {
                value
            }
        };

        let report = Self {
            available: clamp(BalanceField::Available, self.available),
            in_positions: clamp(BalanceField::InPositions, self.in_positions),
            pending: clamp(BalanceField::Pending, self.pending),
        };
        (report, warnings)
    }
}

impl ResourcePool {
    /// Replace the balance fields wholesale and recompute the total.
    ///
    /// Negative inputs are clamped to zero; the returned warnings describe
    /// every clamp that happened. A report whose total overflows is rejected
    /// and leaves the pool untouched.
    pub(crate) fn apply_balance(
        &mut self,
        report: BalanceReport,
        at: DateTime<Utc>,
    ) -> Result<Vec<ConfigWarning>, AllocatorError> {
        let (report, warnings) = report.clamped(&self.id);
        let total = report
            .checked_total()
            .ok_or_else(|| AllocatorError::AmountOverflow {
                pool_id: self.id.to_string(),
                field: "total",
            })?;

        self.available = report.available;
        self.in_positions = report.in_positions;
        self.pending = report.pending;
        self.total = total;
        self.last_updated = Some(at);

        debug!(
            pool = %self.id,
            available = %self.available,
            in_positions = %self.in_positions,
            pending = %self.pending,
            total = %self.total,
            "Balance applied"
        );

        Ok(warnings)
    }

    /// True when the pool was never fed or its last update is older than `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_updated {
            Some(at) => now - at > max_age,
            None => true,
        }
    }
}
