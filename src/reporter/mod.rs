//! Read-only status snapshots for dashboards and the CLI.

use crate::pool::{PoolId, PoolStats, ResourcePool};
use crate::strategy::{
    measure, total_funds, AdmissionController, AllocationPolicy, RebalanceAdvisor,
    RebalanceSuggestion,
};
use crate::utils::decimal::{round_cents, share_percent};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Point-in-time view of every pool, the policy and the current suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub generated_at: DateTime<Utc>,
    pub total_funds: Decimal,
    pub total_available: Decimal,
    pub reserve_percent: Decimal,
    pub reserve_amount: Decimal,
    pub combined_pnl: Decimal,
    pub combined_trades: u64,
    pub pools: Vec<PoolStatus>,
    /// `None` means "checked, nothing to move"
    pub suggestion: Option<RebalanceSuggestion>,
}

/// One pool's row in a [`StatusSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    pub pool_id: PoolId,
    pub available: Decimal,
    pub in_positions: Decimal,
    pub pending: Decimal,
    pub total: Decimal,
    pub weight: Decimal,
    pub target: Decimal,
    pub drift: Decimal,
    /// Share of total funds currently held by this pool, in percent
    pub allocation_percent: Decimal,
    /// Trade bound at the configured default per-trade ceiling
    pub max_trade_amount: Decimal,
    pub last_updated: Option<DateTime<Utc>>,
    pub stale: bool,
    pub stats: PoolStats,
}

/// Assembles snapshots from controller state. Never mutates anything.
pub struct StatusReporter<'a> {
    pub policy: &'a AllocationPolicy,
    pub admission: &'a AdmissionController,
    pub advisor: &'a RebalanceAdvisor,
    pub stale_after: Duration,
}

impl StatusReporter<'_> {
    pub fn snapshot(&self, pools: &BTreeMap<PoolId, ResourcePool>, now: DateTime<Utc>) -> StatusSnapshot {
        let total = total_funds(pools);
        let default_cap = self.admission.config().max_per_trade;

        let mut allocations = Vec::with_capacity(pools.len());
        let mut rows = Vec::with_capacity(pools.len());
        for pool in pools.values() {
            let allocation = measure(pool, self.policy, total);
            let stale = pool.is_stale(now, self.stale_after);
            if stale {
                warn!(pool = %pool.id(), last_updated = ?pool.last_updated(), "Pool balance is stale");
            }
            rows.push(PoolStatus {
                pool_id: pool.id().clone(),
                available: pool.available(),
                in_positions: pool.in_positions(),
                pending: pool.pending(),
                total: pool.total(),
                weight: self.policy.weight(pool.id().as_str()),
                target: allocation.target,
                drift: allocation.drift,
                allocation_percent: share_percent(pool.total(), total),
                max_trade_amount: self.admission.max_trade_amount(&allocation, default_cap),
                last_updated: pool.last_updated(),
                stale,
                stats: pool.stats(),
            });
            allocations.push(allocation);
        }

        StatusSnapshot {
            generated_at: now,
            total_funds: total,
            total_available: pools.values().map(ResourcePool::available).sum(),
            reserve_percent: self.policy.reserve_percent(),
            reserve_amount: self.policy.reserve_amount(total),
            combined_pnl: pools.values().map(ResourcePool::cumulative_pnl).sum(),
            combined_trades: pools.values().map(ResourcePool::total_trades).sum(),
            pools: rows,
            suggestion: self.advisor.suggest(&allocations),
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 Capital Summary")?;
        writeln!(f, "   ├─ Total Funds:      ${:.2}", round_cents(self.total_funds))?;
        writeln!(f, "   ├─ Total Available:  ${:.2}", round_cents(self.total_available))?;
        writeln!(
            f,
            "   ├─ Reserve:          ${:.2} ({}%)",
            round_cents(self.reserve_amount),
            self.reserve_percent
        )?;
        writeln!(
            f,
            "   ├─ Combined P&L:     ${:.2} ({} trades)",
            round_cents(self.combined_pnl),
            self.combined_trades
        )?;
        writeln!(f, "   └─ Generated:        {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;

        for pool in &self.pools {
            writeln!(f)?;
            let marker = if pool.stale { " (stale)" } else { "" };
            writeln!(f, "   ┌─ {}{}", pool.pool_id, marker)?;
            writeln!(
                f,
                "   ├─ Balance:  ${:.2} total / ${:.2} available / ${:.2} in positions / ${:.2} pending",
                round_cents(pool.total),
                round_cents(pool.available),
                round_cents(pool.in_positions),
                round_cents(pool.pending)
            )?;
            writeln!(
                f,
                "   ├─ Target:   ${:.2} ({}% weight), drift {:+.2}, holding {:.1}%",
                round_cents(pool.target),
                pool.weight,
                round_cents(pool.drift),
                pool.allocation_percent
            )?;
            writeln!(f, "   ├─ Max Trade: ${:.2}", round_cents(pool.max_trade_amount))?;
            writeln!(
                f,
                "   └─ P&L:      ${:.2}, {} trades ({}W/{}L, {:.1}% win rate)",
                round_cents(pool.stats.pnl),
                pool.stats.trades,
                pool.stats.wins,
                pool.stats.losses,
                pool.stats.win_rate
            )?;
        }

        writeln!(f)?;
        match &self.suggestion {
            Some(s) => writeln!(
                f,
                "🔁 Suggested transfer: ${:.2} from {} to {}",
                round_cents(s.amount),
                s.from_pool,
                s.to_pool
            ),
            None => writeln!(f, "✅ No rebalance needed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdmissionConfig;
    use crate::pool::BalanceReport;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn fixture() -> (BTreeMap<PoolId, ResourcePool>, AllocationPolicy) {
        let ids = vec![PoolId::new("crypto").unwrap(), PoolId::new("kalshi").unwrap()];
        let weights: HashMap<String, Decimal> =
            [("kalshi".to_string(), dec!(40)), ("crypto".to_string(), dec!(50))].into();
        let (policy, _) = AllocationPolicy::build(&ids, &weights, dec!(10));

        let mut pools: BTreeMap<PoolId, ResourcePool> =
            ids.into_iter().map(|id| (id.clone(), ResourcePool::new(id))).collect();
        let kalshi = pools.get_mut("kalshi").unwrap();
        kalshi
            .apply_balance(BalanceReport::new(dec!(1000), Decimal::ZERO, Decimal::ZERO), Utc::now())
            .unwrap();
        kalshi.record_outcome(dec!(12), true).unwrap();
        (pools, policy)
    }

    #[test]
    fn test_snapshot_totals_and_suggestion() {
        let (pools, policy) = fixture();
        let admission = AdmissionController::new(AdmissionConfig::default());
        let advisor = RebalanceAdvisor::new(dec!(50));
        let reporter = StatusReporter {
            policy: &policy,
            admission: &admission,
            advisor: &advisor,
            stale_after: Duration::seconds(300),
        };

        let snapshot = reporter.snapshot(&pools, Utc::now());

        assert_eq!(snapshot.total_funds, dec!(1000));
        assert_eq!(snapshot.reserve_amount, dec!(100));
        assert_eq!(snapshot.combined_pnl, dec!(12));
        assert_eq!(snapshot.pools.len(), 2);

        let crypto = &snapshot.pools[0];
        assert_eq!(crypto.pool_id.as_str(), "crypto");
        assert!(crypto.stale);
        assert_eq!(crypto.drift, dec!(-500));

        let kalshi = &snapshot.pools[1];
        assert_eq!(kalshi.target, dec!(400));
        assert_eq!(kalshi.allocation_percent, dec!(100));
        assert_eq!(kalshi.max_trade_amount, dec!(25));
        assert!(!kalshi.stale);

        let suggestion = snapshot.suggestion.as_ref().unwrap();
        assert_eq!(suggestion.from_pool.as_str(), "kalshi");
        assert_eq!(suggestion.amount, dec!(600));
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let (pools, policy) = fixture();
        let admission = AdmissionController::new(AdmissionConfig::default());
        let advisor = RebalanceAdvisor::new(dec!(10_000));
        let snapshot = StatusReporter {
            policy: &policy,
            admission: &admission,
            advisor: &advisor,
            stale_after: Duration::seconds(300),
        }
        .snapshot(&pools, Utc::now());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["suggestion"].is_null());
        assert_eq!(json["pools"][1]["stats"]["wins"], 1);

        let text = snapshot.to_string();
        assert!(text.contains("kalshi"));
        assert!(text.contains("No rebalance needed"));
    }
}
