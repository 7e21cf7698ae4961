//! Trade outcome accounting.
//!
//! Outcomes are append-only. A correction is recorded as a compensating
//! outcome; the only way back to zero is an explicit operator reset.

use super::ResourcePool;
use crate::error::AllocatorError;
use crate::utils::decimal::safe_div;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};

/// Cumulative performance for a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub pnl: Decimal,
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
    /// Percentage of winning trades (0-100), zero when no trades were recorded
    pub win_rate: Decimal,
}

impl ResourcePool {
    /// Record one closed trade as exactly one win or loss.
    ///
    /// All counters are computed before any is written, so an overflow
    /// leaves the pool unchanged.
    pub(crate) fn record_outcome(&mut self, pnl: Decimal, is_win: bool) -> Result<(), AllocatorError> {
        let overflow = |field| AllocatorError::AmountOverflow {
            pool_id: self.id.to_string(),
            field,
        };

        let cumulative_pnl = self
            .cumulative_pnl
            .checked_add(pnl)
            .ok_or_else(|| overflow("cumulative_pnl"))?;
        let total_trades = self
            .total_trades
            .checked_add(1)
            .ok_or_else(|| overflow("total_trades"))?;
        let (wins, losses) = if is_win {
            (self.wins.checked_add(1).ok_or_else(|| overflow("wins"))?, self.losses)
        } else {
            (self.wins, self.losses.checked_add(1).ok_or_else(|| overflow("losses"))?)
        };

        self.cumulative_pnl = cumulative_pnl;
        self.total_trades = total_trades;
        self.wins = wins;
        self.losses = losses;

        info!(
            pool = %self.id,
            %pnl,
            is_win,
            cumulative_pnl = %self.cumulative_pnl,
            trades = self.total_trades,
            "Trade outcome recorded"
        );
        Ok(())
    }

    /// Current performance counters and win rate.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pnl: self.cumulative_pnl,
            trades: self.total_trades,
            wins: self.wins,
            losses: self.losses,
            win_rate: safe_div(
                Decimal::from(self.wins) * dec!(100),
                Decimal::from(self.total_trades),
            ),
        }
    }

    /// Zero all performance counters. Balances are untouched.
    pub(crate) fn reset_stats(&mut self) {
        warn!(
            pool = %self.id,
            pnl = %self.cumulative_pnl,
            trades = self.total_trades,
            "Resetting performance counters"
        );
        self.cumulative_pnl = Decimal::ZERO;
        self.total_trades = 0;
        self.wins = 0;
        self.losses = 0;
    }
}
