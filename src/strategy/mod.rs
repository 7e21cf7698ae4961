//! Allocation strategy.
//!
//! Contains the decision logic for:
//! - Target allocation policy across pools
//! - Drift measurement against policy targets
//! - Trade admission and sizing
//! - Cross-pool rebalance suggestions

mod admission;
mod drift;
mod policy;
mod rebalancer;

pub use admission::{
    AdmissionController, AdmissionDecision, AdmissionRule, TradeAdmission, TradeAdmissionRequest,
};
pub use drift::{measure, measure_all, total_funds, PoolAllocation};
pub use policy::AllocationPolicy;
pub use rebalancer::{RebalanceAdvisor, RebalanceSuggestion};
