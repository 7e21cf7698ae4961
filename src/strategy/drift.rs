//! Allocation drift: how far each pool sits from its policy target.

use super::AllocationPolicy;
use crate::pool::{PoolId, ResourcePool};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// A pool's funds measured against its policy target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolAllocation {
    pub pool_id: PoolId,
    pub available: Decimal,
    pub total: Decimal,
    pub target: Decimal,
    /// `total - target`: positive = over-allocated, negative = under-allocated
    pub drift: Decimal,
}

/// Sum of every pool's total funds.
pub fn total_funds(pools: &BTreeMap<PoolId, ResourcePool>) -> Decimal {
    pools.values().map(ResourcePool::total).sum()
}

/// Measure one pool against the policy, using funds across all pools.
pub fn measure(
    pool: &ResourcePool,
    policy: &AllocationPolicy,
    total_funds: Decimal,
) -> PoolAllocation {
    let target = policy.target_amount(pool.id().as_str(), total_funds);
    PoolAllocation {
        pool_id: pool.id().clone(),
        available: pool.available(),
        total: pool.total(),
        target,
        drift: pool.total() - target,
    }
}

/// Measure every pool, in pool id order.
pub fn measure_all(
    pools: &BTreeMap<PoolId, ResourcePool>,
    policy: &AllocationPolicy,
) -> Vec<PoolAllocation> {
    let total = total_funds(pools);
    pools
        .values()
        .map(|pool| measure(pool, policy, total))
        .collect()
}
