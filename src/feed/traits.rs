//! Venue-agnostic trait for balance fetchers.

use crate::pool::BalanceReport;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Anything that can report current funds for one or more pools.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Fetch balances keyed by raw pool id.
    ///
    /// Pools the source knows nothing about are simply absent from the map.
    async fn fetch_balances(&self) -> Result<HashMap<String, BalanceReport>>;
}
