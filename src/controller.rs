//! The allocation controller: the in-process API over all pools.
//!
//! Pool state and the allocation policy live together behind a single
//! read/write lock. Writers (balance ingestion, outcome recording, policy
//! replacement) are serialized; every reader holds one read guard for its
//! whole computation, so drift is never computed from a half-applied balance
//! or a torn policy.

use crate::config::Config;
use crate::error::{self, AllocatorError, ConfigWarning};
use crate::pool::{BalanceReport, PoolId, PoolRecord, PoolStats, ResourcePool};
use crate::reporter::{StatusReporter, StatusSnapshot};
use crate::strategy::{
    measure, measure_all, total_funds, AdmissionController, AdmissionDecision, AllocationPolicy,
    PoolAllocation, RebalanceAdvisor, RebalanceSuggestion, TradeAdmission, TradeAdmissionRequest,
};
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

struct Ledger {
    pools: BTreeMap<PoolId, ResourcePool>,
    policy: AllocationPolicy,
}

impl Ledger {
    fn pool(&self, pool_id: &str) -> Result<&ResourcePool, AllocatorError> {
        self.pools
            .get(pool_id)
            .ok_or_else(|| AllocatorError::unknown_pool(pool_id))
    }

    fn pool_mut(&mut self, pool_id: &str) -> Result<&mut ResourcePool, AllocatorError> {
        self.pools
            .get_mut(pool_id)
            .ok_or_else(|| AllocatorError::unknown_pool(pool_id))
    }

    fn allocation(&self, pool_id: &str) -> Result<PoolAllocation, AllocatorError> {
        let pool = self.pool(pool_id)?;
        Ok(measure(pool, &self.policy, total_funds(&self.pools)))
    }

    /// Store an updated pool, rejecting it if a cross-pool sum would overflow.
    fn commit(&mut self, pool: ResourcePool) -> Result<(), AllocatorError> {
        let overflow = |field| AllocatorError::AmountOverflow {
            pool_id: pool.id().to_string(),
            field,
        };
        let others = || self.pools.values().filter(|other| other.id() != pool.id());

        others()
            .map(ResourcePool::total)
            .try_fold(pool.total(), Decimal::checked_add)
            .ok_or_else(|| overflow("total funds"))?;
        others()
            .map(ResourcePool::cumulative_pnl)
            .try_fold(pool.cumulative_pnl(), Decimal::checked_add)
            .ok_or_else(|| overflow("combined pnl"))?;
        others()
            .map(ResourcePool::total_trades)
            .try_fold(pool.total_trades(), u64::checked_add)
            .ok_or_else(|| overflow("combined trades"))?;

        self.pools.insert(pool.id().clone(), pool);
        Ok(())
    }
}

/// Tracks capital across a fixed set of pools and admits trades against the
/// allocation policy.
///
/// Share it between tasks as `Arc<AllocationController>`.
pub struct AllocationController {
    pool_ids: Vec<PoolId>,
    ledger: RwLock<Ledger>,
    admission: AdmissionController,
    advisor: RebalanceAdvisor,
    stale_after: Duration,
}

impl AllocationController {
    /// Build a controller for the configured pools with empty balances.
    ///
    /// Fails only on an unusable pool set (empty, blank or duplicate ids).
    /// Policy problems come back as warnings.
    pub fn new(config: &Config) -> Result<(Self, Vec<ConfigWarning>), AllocatorError> {
        if config.pools.is_empty() {
            return Err(AllocatorError::NoPools);
        }

        let mut pools = BTreeMap::new();
        let mut pool_ids = Vec::with_capacity(config.pools.len());
        for raw in &config.pools {
            let id = PoolId::new(raw)?;
            if pools.contains_key(&id) {
                return Err(AllocatorError::DuplicatePool {
                    pool_id: id.to_string(),
                });
            }
            pools.insert(id.clone(), ResourcePool::new(id.clone()));
            pool_ids.push(id);
        }

        let (policy, warnings) = AllocationPolicy::build(
            &pool_ids,
            &config.allocation.weights,
            config.allocation.reserve_percent,
        );

        info!(
            pools = ?pool_ids.iter().map(PoolId::as_str).collect::<Vec<_>>(),
            reserve_percent = %policy.reserve_percent(),
            "Allocation controller initialized"
        );

        let controller = Self {
            pool_ids,
            ledger: RwLock::new(Ledger { pools, policy }),
            admission: AdmissionController::new(config.admission.clone()),
            advisor: RebalanceAdvisor::new(config.rebalance.drift_threshold),
            stale_after: Duration::seconds(
                i64::try_from(config.balances.stale_after_secs).unwrap_or(i64::MAX),
            ),
        };
        Ok((controller, error::surface(warnings)))
    }

    /// Configured pools, in configuration order.
    pub fn pool_ids(&self) -> &[PoolId] {
        &self.pool_ids
    }

    /// Validate a raw pool id against the configured set.
    pub fn resolve(&self, pool_id: &str) -> Result<PoolId, AllocatorError> {
        let trimmed = pool_id.trim();
        self.pool_ids
            .iter()
            .find(|id| id.as_str() == trimmed)
            .cloned()
            .ok_or_else(|| AllocatorError::unknown_pool(pool_id))
    }

    /// Default per-trade ceiling from configuration.
    pub fn default_max_per_trade(&self) -> Decimal {
        self.admission.config().max_per_trade
    }

    // =========================================================================
    // Writers
    // =========================================================================

    /// Replace a pool's balances. Negative inputs are clamped to zero and
    /// reported in the returned warnings.
    pub fn update_balance(
        &self,
        pool_id: &str,
        available: Decimal,
        in_positions: Decimal,
        pending: Decimal,
    ) -> Result<Vec<ConfigWarning>, AllocatorError> {
        self.ingest_balance(pool_id, BalanceReport::new(available, in_positions, pending))
    }

    /// Replace a pool's balances from a fetcher report.
    ///
    /// A report that would overflow the pool or cross-pool totals is
    /// rejected and leaves every pool unchanged.
    pub fn ingest_balance(
        &self,
        pool_id: &str,
        report: BalanceReport,
    ) -> Result<Vec<ConfigWarning>, AllocatorError> {
        let id = self.resolve(pool_id)?;
        let warnings = {
            let mut ledger = self.ledger.write();
            let mut pool = ledger.pool(id.as_str())?.clone();
            let warnings = pool.apply_balance(report, Utc::now())?;
            ledger.commit(pool)?;
            warnings
        };
        Ok(error::surface(warnings))
    }

    /// Record a closed trade as a win or a loss with its signed P&L.
    pub fn record_trade_outcome(
        &self,
        pool_id: &str,
        pnl: Decimal,
        is_win: bool,
    ) -> Result<(), AllocatorError> {
        let id = self.resolve(pool_id)?;
        let mut ledger = self.ledger.write();
        let mut pool = ledger.pool(id.as_str())?.clone();
        pool.record_outcome(pnl, is_win)?;
        ledger.commit(pool)
    }

    /// Replace the allocation policy atomically. Never fails; problems are
    /// returned as warnings.
    pub fn set_policy(
        &self,
        weights: &HashMap<String, Decimal>,
        reserve_percent: Decimal,
    ) -> Vec<ConfigWarning> {
        let (policy, warnings) = AllocationPolicy::build(&self.pool_ids, weights, reserve_percent);

        info!(
            weights = ?policy.weights(),
            reserve_percent = %policy.reserve_percent(),
            "Allocation policy replaced"
        );
        self.ledger.write().policy = policy;

        error::surface(warnings)
    }

    /// Zero a pool's performance counters (operator action).
    pub fn reset_stats(&self, pool_id: &str) -> Result<(), AllocatorError> {
        let id = self.resolve(pool_id)?;
        self.ledger.write().pool_mut(id.as_str())?.reset_stats();
        Ok(())
    }

    /// Replace a pool's full state from a persisted record.
    pub fn restore_pool(&self, record: PoolRecord) -> Result<(), AllocatorError> {
        let id = self.resolve(record.pool_id.as_str())?;
        let pool = ResourcePool::from_record(PoolRecord {
            pool_id: id.clone(),
            ..record
        })?;

        info!(
            pool = %id,
            total = %pool.total(),
            trades = pool.total_trades(),
            "Pool restored"
        );
        self.ledger.write().commit(pool)
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Copy of one pool's current state.
    pub fn pool(&self, pool_id: &str) -> Result<ResourcePool, AllocatorError> {
        self.ledger.read().pool(pool_id.trim()).cloned()
    }

    /// Cumulative performance for a pool.
    pub fn stats(&self, pool_id: &str) -> Result<PoolStats, AllocatorError> {
        Ok(self.ledger.read().pool(pool_id.trim())?.stats())
    }

    /// Copy of the active policy.
    pub fn policy(&self) -> AllocationPolicy {
        self.ledger.read().policy.clone()
    }

    /// Policy target for a pool given current funds across all pools.
    pub fn target_amount(&self, pool_id: &str) -> Result<Decimal, AllocatorError> {
        Ok(self.allocation(pool_id)?.target)
    }

    /// `total - target` for a pool; positive means over-allocated.
    pub fn allocation_drift(&self, pool_id: &str) -> Result<Decimal, AllocatorError> {
        Ok(self.allocation(pool_id)?.drift)
    }

    /// Funds, target and drift of one pool, read atomically.
    pub fn allocation(&self, pool_id: &str) -> Result<PoolAllocation, AllocatorError> {
        self.ledger.read().allocation(pool_id.trim())
    }

    /// Funds, target and drift of every pool, read atomically.
    pub fn allocations(&self) -> Vec<PoolAllocation> {
        let ledger = self.ledger.read();
        measure_all(&ledger.pools, &ledger.policy)
    }

    /// Largest trade the pool may place right now.
    pub fn max_trade_amount(
        &self,
        pool_id: &str,
        max_per_trade: Decimal,
    ) -> Result<Decimal, AllocatorError> {
        let allocation = self.allocation(pool_id)?;
        Ok(self.admission.max_trade_amount(&allocation, max_per_trade))
    }

    /// Whether a trade with this opportunity score may proceed.
    pub fn should_admit(
        &self,
        pool_id: &str,
        opportunity_score: Decimal,
    ) -> Result<bool, AllocatorError> {
        Ok(self.evaluate_admission(pool_id, opportunity_score)?.admitted)
    }

    /// Admission decision together with the rule that produced it.
    pub fn evaluate_admission(
        &self,
        pool_id: &str,
        opportunity_score: Decimal,
    ) -> Result<AdmissionDecision, AllocatorError> {
        let allocation = self.allocation(pool_id)?;
        Ok(self.admission.evaluate(&allocation, opportunity_score))
    }

    /// Decide a proposed trade and bound its size.
    pub fn review_trade(
        &self,
        request: &TradeAdmissionRequest,
    ) -> Result<TradeAdmission, AllocatorError> {
        let allocation = self.allocation(&request.pool_id)?;
        self.admission.review(&allocation, request)
    }

    /// Current rebalance suggestion, `None` when no transfer is needed.
    pub fn suggestion(&self) -> Option<RebalanceSuggestion> {
        self.advisor.suggest(&self.allocations())
    }

    /// Read-only snapshot of totals, per-pool status and the suggestion.
    pub fn snapshot(&self) -> StatusSnapshot {
        let ledger = self.ledger.read();
        StatusReporter {
            policy: &ledger.policy,
            admission: &self.admission,
            advisor: &self.advisor,
            stale_after: self.stale_after,
        }
        .snapshot(&ledger.pools, Utc::now())
    }

    /// Every pool's state for caller-side persistence.
    pub fn export_pools(&self) -> Vec<PoolRecord> {
        self.ledger
            .read()
            .pools
            .values()
            .map(ResourcePool::to_record)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::AdmissionRule;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::thread;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn test_controller() -> AllocationController {
        let (controller, warnings) = AllocationController::new(&Config::default()).unwrap();
        assert!(warnings.is_empty());
        controller
    }

    /// kalshi holds everything, crypto nothing (40/50 + 10 reserve).
    fn lopsided_controller() -> AllocationController {
        let controller = test_controller();
        controller
            .update_balance("kalshi", dec!(1000), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        controller
    }

    // =========================================================================
    // Construction Tests
    // =========================================================================

    #[test]
    fn test_rejects_empty_and_duplicate_pools() {
        let empty = Config {
            pools: vec![],
            ..Config::default()
        };
        assert!(matches!(
            AllocationController::new(&empty),
            Err(AllocatorError::NoPools)
        ));

        let duplicate = Config {
            pools: vec!["kalshi".into(), "kalshi".into()],
            ..Config::default()
        };
        assert!(matches!(
            AllocationController::new(&duplicate),
            Err(AllocatorError::DuplicatePool { .. })
        ));
    }

    #[test]
    fn test_third_venue_needs_only_configuration() {
        let mut config = Config::default();
        config.pools.push("sports".to_string());
        config.allocation.weights = HashMap::from([
            ("kalshi".to_string(), dec!(30)),
            ("crypto".to_string(), dec!(30)),
            ("sports".to_string(), dec!(30)),
        ]);
        let (controller, warnings) = AllocationController::new(&config).unwrap();
        assert!(warnings.is_empty());

        controller
            .update_balance("sports", dec!(900), Decimal::ZERO, Decimal::ZERO)
            .unwrap();

        assert_eq!(controller.target_amount("sports").unwrap(), dec!(270));
        assert_eq!(controller.allocation_drift("sports").unwrap(), dec!(630));
    }

    #[test]
    fn test_independent_controllers_do_not_share_state() {
        let a = test_controller();
        let b = test_controller();
        a.update_balance("kalshi", dec!(10), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        assert_eq!(b.pool("kalshi").unwrap().total(), Decimal::ZERO);
    }

    // =========================================================================
    // Unknown Pool Tests
    // =========================================================================

    #[test]
    fn test_unknown_pool_is_surfaced_everywhere() {
        let c = test_controller();
        let unknown = || AllocatorError::unknown_pool("binance");

        assert_eq!(
            c.update_balance("binance", dec!(1), dec!(1), dec!(1)),
            Err(unknown())
        );
        assert_eq!(c.record_trade_outcome("binance", dec!(1), true), Err(unknown()));
        assert_eq!(c.stats("binance"), Err(unknown()));
        assert_eq!(c.max_trade_amount("binance", dec!(25)), Err(unknown()));
        assert_eq!(c.should_admit("binance", dec!(99)), Err(unknown()));
        assert_eq!(c.reset_stats("binance"), Err(unknown()));
    }

    // =========================================================================
    // Scenario Tests
    // =========================================================================

    #[test]
    fn test_over_allocated_pool_scenario() {
        let c = lopsided_controller();

        assert_eq!(c.target_amount("kalshi").unwrap(), dec!(400));
        assert_eq!(c.allocation_drift("kalshi").unwrap(), dec!(600));
        // The worked scenario for this state lists 0 here, which conflicts
        // with the slack formula: max(0, 1000 - 600) = 400, capped at 25.
        // The formula wins; see test_over_allocated_pool_with_committed_funds
        // for the case that really bottoms out at 0.
        assert_eq!(c.max_trade_amount("kalshi", dec!(25)).unwrap(), dec!(25));
        assert!(c.should_admit("kalshi", dec!(90)).unwrap());
        assert!(!c.should_admit("kalshi", dec!(80)).unwrap());
    }

    #[test]
    fn test_over_allocated_pool_with_committed_funds() {
        let c = test_controller();
        c.update_balance("kalshi", dec!(300), dec!(700), Decimal::ZERO)
            .unwrap();

        assert_eq!(c.allocation_drift("kalshi").unwrap(), dec!(600));
        assert_eq!(c.max_trade_amount("kalshi", dec!(25)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_under_allocated_pool_admits_lower_scores() {
        let c = lopsided_controller();
        c.update_balance("crypto", dec!(100), Decimal::ZERO, Decimal::ZERO)
            .unwrap();

        assert_eq!(
            c.evaluate_admission("crypto", dec!(62)).unwrap().rule,
            AdmissionRule::UnderAllocated
        );
        assert_eq!(c.max_trade_amount("crypto", dec!(25)).unwrap(), dec!(25));
    }

    #[test]
    fn test_trade_outcome_scenario() {
        let c = test_controller();
        for (pnl, win) in [(dec!(10), true), (dec!(5), true), (dec!(9), true), (dec!(-4), false)] {
            c.record_trade_outcome("kalshi", pnl, win).unwrap();
        }

        c.record_trade_outcome("kalshi", dec!(-12.5), false).unwrap();

        let stats = c.stats("kalshi").unwrap();
        assert_eq!(stats.trades, 5);
        assert_eq!(stats.wins, 3);
        assert_eq!(stats.losses, 2);
        assert_eq!(stats.pnl, dec!(7.5));
        assert_eq!(stats.win_rate, dec!(60));
    }

    #[test]
    fn test_review_trade() {
        let c = lopsided_controller();
        let request = TradeAdmissionRequest::new("kalshi", dec!(100), dec!(92), dec!(25));

        let verdict = c.review_trade(&request).unwrap();

        assert!(verdict.admitted);
        assert_eq!(verdict.approved_amount, dec!(25));
    }

    // =========================================================================
    // Policy Tests
    // =========================================================================

    #[test]
    fn test_set_policy_warns_but_applies() {
        let c = lopsided_controller();
        let warnings = c.set_policy(
            &HashMap::from([("kalshi".to_string(), dec!(50)), ("crypto".to_string(), dec!(50))]),
            dec!(10),
        );

        assert_eq!(
            warnings,
            vec![ConfigWarning::WeightsDoNotSumTo100 { sum: dec!(110) }]
        );
        assert_eq!(c.target_amount("kalshi").unwrap(), dec!(450));
    }

    #[test]
    fn test_targets_plus_reserve_equal_total() {
        let c = test_controller();
        c.set_policy(
            &HashMap::from([("kalshi".to_string(), dec!(33)), ("crypto".to_string(), dec!(12))]),
            dec!(15),
        );
        c.update_balance("kalshi", dec!(321.45), dec!(10), Decimal::ZERO)
            .unwrap();
        c.update_balance("crypto", dec!(77.7), Decimal::ZERO, dec!(3))
            .unwrap();

        let snapshot = c.snapshot();
        let targets: Decimal = snapshot.pools.iter().map(|p| p.target).sum();
        let diff = (targets + snapshot.reserve_amount - snapshot.total_funds).abs();
        assert!(diff < dec!(0.000001));
    }

    // =========================================================================
    // Suggestion / Snapshot Tests
    // =========================================================================

    #[test]
    fn test_suggestion_present_and_absent() {
        let c = lopsided_controller();
        let suggestion = c.suggestion().unwrap();
        assert_eq!(suggestion.from_pool.as_str(), "kalshi");
        assert_eq!(suggestion.to_pool.as_str(), "crypto");
        assert_eq!(suggestion.amount, dec!(600));

        // 900 total: targets 360/450, drifts 40/50, neither beyond $50
        c.update_balance("kalshi", dec!(400), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        c.update_balance("crypto", dec!(450), dec!(50), Decimal::ZERO)
            .unwrap();
        assert_eq!(c.suggestion(), None);
    }

    #[test]
    fn test_suggestion_when_every_pool_is_over_target() {
        let c = test_controller();
        c.update_balance("kalshi", dec!(900), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        c.update_balance("crypto", dec!(1100), Decimal::ZERO, Decimal::ZERO)
            .unwrap();

        // 2000 total: targets 800/1000, both pools 100 over thanks to the reserve
        assert_eq!(c.allocation_drift("kalshi").unwrap(), dec!(100));
        assert_eq!(c.allocation_drift("crypto").unwrap(), dec!(100));

        let suggestion = c.suggestion().unwrap();
        assert_eq!(suggestion.from_pool.as_str(), "crypto");
        assert_eq!(suggestion.to_pool.as_str(), "kalshi");
        assert_eq!(suggestion.amount, dec!(100));
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let c = lopsided_controller();
        c.record_trade_outcome("kalshi", dec!(3), true).unwrap();

        let before = c.export_pools();
        let first = c.snapshot();
        let second = c.snapshot();

        assert_eq!(before, c.export_pools());
        assert_eq!(first.pools, second.pools);
        assert_eq!(first.suggestion, second.suggestion);
    }

    // =========================================================================
    // Overflow Tests
    // =========================================================================

    #[test]
    fn test_overflowing_balance_rejected_and_state_kept() {
        let c = lopsided_controller();

        let err = c
            .update_balance("kalshi", Decimal::MAX, Decimal::MAX, Decimal::ZERO)
            .unwrap_err();

        assert!(matches!(err, AllocatorError::AmountOverflow { .. }));
        let pool = c.pool("kalshi").unwrap();
        assert_eq!(pool.available(), dec!(1000));
        assert_eq!(pool.in_positions(), Decimal::ZERO);
        assert_eq!(pool.total(), pool.available() + pool.in_positions() + pool.pending());
    }

    #[test]
    fn test_cross_pool_overflow_rejected() {
        let c = test_controller();
        c.update_balance("kalshi", Decimal::MAX, Decimal::ZERO, Decimal::ZERO)
            .unwrap();

        let err = c
            .update_balance("crypto", dec!(1), Decimal::ZERO, Decimal::ZERO)
            .unwrap_err();

        assert_eq!(
            err,
            AllocatorError::AmountOverflow {
                pool_id: "crypto".to_string(),
                field: "total funds",
            }
        );
        assert_eq!(c.pool("crypto").unwrap().total(), Decimal::ZERO);
        assert_eq!(c.snapshot().total_funds, Decimal::MAX);
    }

    #[test]
    fn test_combined_pnl_overflow_rejected() {
        let c = test_controller();
        c.record_trade_outcome("kalshi", Decimal::MAX, true).unwrap();

        assert!(c.record_trade_outcome("crypto", dec!(1), true).is_err());
        assert!(c.record_trade_outcome("kalshi", dec!(1), true).is_err());

        assert_eq!(c.stats("crypto").unwrap().trades, 0);
        assert_eq!(c.stats("kalshi").unwrap().trades, 1);
        assert_eq!(c.snapshot().combined_pnl, Decimal::MAX);
    }

    // =========================================================================
    // Persistence Hook Tests
    // =========================================================================

    #[test]
    fn test_export_and_restore() {
        let source = lopsided_controller();
        source.record_trade_outcome("kalshi", dec!(4), true).unwrap();

        let target = test_controller();
        for record in source.export_pools() {
            target.restore_pool(record).unwrap();
        }

        assert_eq!(target.export_pools(), source.export_pools());
        assert_eq!(target.allocation_drift("kalshi").unwrap(), dec!(600));
    }

    #[test]
    fn test_restore_unknown_pool_rejected() {
        let c = test_controller();
        let mut record = c.pool("kalshi").unwrap().to_record();
        record.pool_id = PoolId::new("binance").unwrap();
        assert!(matches!(
            c.restore_pool(record),
            Err(AllocatorError::UnknownPool { .. })
        ));
    }

    // =========================================================================
    // Concurrency Tests
    // =========================================================================

    #[test]
    fn test_concurrent_writers_and_readers_keep_invariants() {
        let c = Arc::new(test_controller());

        let writers: Vec<_> = ["kalshi", "crypto"]
            .into_iter()
            .map(|pool| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for i in 0..200u32 {
                        let amount = Decimal::from(i);
                        c.update_balance(pool, amount, amount * dec!(2), dec!(1))
                            .unwrap();
                        c.record_trade_outcome(pool, dec!(1), i % 2 == 0).unwrap();
                    }
                })
            })
            .collect();

        let policy_writer = {
            let c = Arc::clone(&c);
            thread::spawn(move || {
                for i in 0..200u32 {
                    let (kalshi, crypto, reserve) = if i % 2 == 0 {
                        (dec!(20), dec!(60), dec!(20))
                    } else {
                        (dec!(40), dec!(50), dec!(10))
                    };
                    let weights = HashMap::from([
                        ("kalshi".to_string(), kalshi),
                        ("crypto".to_string(), crypto),
                    ]);
                    assert!(c.set_policy(&weights, reserve).is_empty());
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = c.snapshot();

                        let weights: Vec<Decimal> = snapshot.pools.iter().map(|p| p.weight).collect();
                        let policy = (weights[0], weights[1], snapshot.reserve_percent);
                        assert!(
                            policy == (dec!(60), dec!(20), dec!(20))
                                || policy == (dec!(50), dec!(40), dec!(10)),
                            "torn policy {policy:?}"
                        );

                        let targets: Decimal = snapshot.pools.iter().map(|p| p.target).sum();
                        let diff = (targets + snapshot.reserve_amount - snapshot.total_funds).abs();
                        assert!(diff < dec!(0.000001), "targets off by {diff}");

                        for pool in snapshot.pools {
                            assert_eq!(pool.total, pool.available + pool.in_positions + pool.pending);
                            assert_eq!(pool.stats.wins + pool.stats.losses, pool.stats.trades);
                            assert!(pool.max_trade_amount <= pool.available);
                        }
                        let amount = c.max_trade_amount("kalshi", dec!(25)).unwrap();
                        assert!(amount <= dec!(25));
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers).chain([policy_writer]) {
            handle.join().unwrap();
        }

        assert_eq!(c.stats("kalshi").unwrap().trades, 200);
        assert_eq!(c.stats("crypto").unwrap().wins, 100);
    }
}
