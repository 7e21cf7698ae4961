//! Per-venue fund pools.
//!
//! A pool is one independently funded venue account. Its balance fields are
//! replaced wholesale by [`balance`] ingestion and its performance counters
//! advance only through [`performance`] outcome recording.

mod balance;
mod performance;

pub use balance::BalanceReport;
pub use performance::PoolStats;

use crate::error::AllocatorError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Validated pool identifier (e.g. "kalshi", "crypto").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    /// Create a pool id, trimming surrounding whitespace.
    pub fn new(id: impl AsRef<str>) -> Result<Self, AllocatorError> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(AllocatorError::InvalidPoolId);
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PoolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Funds snapshot and cumulative performance for a single venue.
#[derive(Debug, Clone, Serialize)]
pub struct ResourcePool {
    id: PoolId,
    available: Decimal,
    in_positions: Decimal,
    pending: Decimal,
    /// Always `available + in_positions + pending`.
    total: Decimal,
    last_updated: Option<DateTime<Utc>>,
    cumulative_pnl: Decimal,
    total_trades: u64,
    wins: u64,
    losses: u64,
}

impl ResourcePool {
    /// Create an empty pool with zero balances and counters.
    pub fn new(id: PoolId) -> Self {
        Self {
            id,
            available: Decimal::ZERO,
            in_positions: Decimal::ZERO,
            pending: Decimal::ZERO,
            total: Decimal::ZERO,
            last_updated: None,
            cumulative_pnl: Decimal::ZERO,
            total_trades: 0,
            wins: 0,
            losses: 0,
        }
    }

    pub fn id(&self) -> &PoolId {
        &self.id
    }

    pub fn available(&self) -> Decimal {
        self.available
    }

    pub fn in_positions(&self) -> Decimal {
        self.in_positions
    }

    pub fn pending(&self) -> Decimal {
        self.pending
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Time of the most recent balance ingestion, `None` if never fed.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn cumulative_pnl(&self) -> Decimal {
        self.cumulative_pnl
    }

    pub fn total_trades(&self) -> u64 {
        self.total_trades
    }

    pub fn wins(&self) -> u64 {
        self.wins
    }

    pub fn losses(&self) -> u64 {
        self.losses
    }

    /// Export the full pool state for caller-side persistence.
    pub fn to_record(&self) -> PoolRecord {
        PoolRecord {
            pool_id: self.id.clone(),
            available: self.available,
            in_positions: self.in_positions,
            pending: self.pending,
            last_updated: self.last_updated,
            cumulative_pnl: self.cumulative_pnl,
            total_trades: self.total_trades,
            wins: self.wins,
            losses: self.losses,
        }
    }

    /// Rebuild a pool from a persisted record.
    ///
    /// Rejects records that break the pool invariants instead of repairing
    /// them, since a bad record means the store is corrupt.
    pub fn from_record(record: PoolRecord) -> Result<Self, AllocatorError> {
        let inconsistent = |reason: String| AllocatorError::InconsistentRecord {
            pool_id: record.pool_id.to_string(),
            reason,
        };

        if record.wins.checked_add(record.losses) != Some(record.total_trades) {
            return Err(inconsistent(format!(
                "wins ({}) + losses ({}) != total_trades ({})",
                record.wins, record.losses, record.total_trades
            )));
        }

        for (name, value) in [
            ("available", record.available),
            ("in_positions", record.in_positions),
            ("pending", record.pending),
        ] {
            if value < Decimal::ZERO {
                return Err(inconsistent(format!("negative {name}: {value}")));
            }
        }

        let total = record
            .available
            .checked_add(record.in_positions)
            .and_then(|sum| sum.checked_add(record.pending))
            .ok_or_else(|| inconsistent("total overflows".to_string()))?;

        Ok(Self {
            total,
            id: record.pool_id,
            available: record.available,
            in_positions: record.in_positions,
            pending: record.pending,
            last_updated: record.last_updated,
            cumulative_pnl: record.cumulative_pnl,
            total_trades: record.total_trades,
            wins: record.wins,
            losses: record.losses,
        })
    }
}

/// Persistable form of a [`ResourcePool`]. `total` is derived on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub pool_id: PoolId,
    pub available: Decimal,
    pub in_positions: Decimal,
    pub pending: Decimal,
    pub last_updated: Option<DateTime<Utc>>,
    pub cumulative_pnl: Decimal,
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
}
