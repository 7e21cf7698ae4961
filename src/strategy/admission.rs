//! Trade admission: whether a proposed trade may proceed, and how large.

use super::PoolAllocation;
use crate::config::AdmissionConfig;
use crate::error::AllocatorError;
use crate::pool::PoolId;
use crate::utils::decimal::clamp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A proposed trade awaiting admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeAdmissionRequest {
    pub pool_id: String,
    /// Notional the caller would like to trade (must be positive)
    pub requested_amount: Decimal,
    /// Externally computed quality signal, 0-100
    pub opportunity_score: Decimal,
    /// Per-trade ceiling
    pub max_per_trade: Decimal,
}

impl TradeAdmissionRequest {
    pub fn new(
        pool_id: impl Into<String>,
        requested_amount: Decimal,
        opportunity_score: Decimal,
        max_per_trade: Decimal,
    ) -> Self {
        Self {
            pool_id: pool_id.into(),
            requested_amount,
            opportunity_score,
            max_per_trade,
        }
    }
}

/// The admission rule that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionRule {
    /// Pool below target; lower score bar
    UnderAllocated,
    /// Pool close to target
    NearTarget,
    /// Pool above target; only exceptional opportunities pass
    OverAllocated,
    /// Too little available to act on
    InsufficientFunds,
    /// No earlier rule applied
    Fallback,
}

/// Outcome of the admission rules for one pool and score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub admitted: bool,
    pub rule: AdmissionRule,
}

impl AdmissionDecision {
    fn new(admitted: bool, rule: AdmissionRule) -> Self {
        Self { admitted, rule }
    }
}

/// Full verdict on a [`TradeAdmissionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeAdmission {
    pub pool_id: PoolId,
    pub admitted: bool,
    pub rule: AdmissionRule,
    pub drift: Decimal,
    pub requested_amount: Decimal,
    /// Upper bound the pool can fund right now
    pub max_trade_amount: Decimal,
    /// Amount authorized; zero when not admitted
    pub approved_amount: Decimal,
}

/// Applies the admission rules and trade size bounds.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Largest trade the pool may place, never above `available` or
    /// `max_per_trade` and never negative.
    ///
    /// An under-target pool may use all its available funds. A pool at or
    /// over target may only use what is left after subtracting its drift.
    pub fn max_trade_amount(&self, allocation: &PoolAllocation, max_per_trade: Decimal) -> Decimal {
        let available = allocation.available.max(Decimal::ZERO);
        let cap = max_per_trade.max(Decimal::ZERO);

        let usable = if allocation.drift < Decimal::ZERO {
            available
        } else {
            (available - allocation.drift).max(Decimal::ZERO)
        };

        let amount = usable.min(cap).min(available);

        debug!(
            pool = %allocation.pool_id,
            drift = %allocation.drift,
            %available,
            %max_per_trade,
            %amount,
            "Max trade amount"
        );
        amount
    }

    /// Ordered admission rules; the first one that applies decides.
    ///
    /// Scores outside 0..=100 are clamped into range. Pure: the result
    /// depends only on the arguments.
    pub fn evaluate(&self, allocation: &PoolAllocation, opportunity_score: Decimal) -> AdmissionDecision {
        let score = clamp(opportunity_score, Decimal::ZERO, dec!(100));
        let drift = allocation.drift;
        let t = &self.config.thresholds;

        if drift < Decimal::ZERO && score >= t.under_allocated {
            return AdmissionDecision::new(true, AdmissionRule::UnderAllocated);
        }
        if drift.abs() < self.config.near_target_band && score >= t.near_target {
            return AdmissionDecision::new(true, AdmissionRule::NearTarget);
        }
        if drift > Decimal::ZERO {
            return AdmissionDecision::new(score >= t.over_allocated, AdmissionRule::OverAllocated);
        }
        if allocation.available < self.config.min_available {
            return AdmissionDecision::new(false, AdmissionRule::InsufficientFunds);
        }
        AdmissionDecision::new(score >= t.fallback, AdmissionRule::Fallback)
    }

    /// Decide a full trade request against the pool's current allocation.
    pub fn review(
        &self,
        allocation: &PoolAllocation,
        request: &TradeAdmissionRequest,
    ) -> Result<TradeAdmission, AllocatorError> {
        if request.requested_amount <= Decimal::ZERO {
            return Err(AllocatorError::InvalidAmount {
                field: "requested_amount",
                value: request.requested_amount,
            });
        }

        let decision = self.evaluate(allocation, request.opportunity_score);
        let bound = self.max_trade_amount(allocation, request.max_per_trade);
        let admitted = decision.admitted && bound > Decimal::ZERO;
        let approved_amount = if admitted {
            request.requested_amount.min(bound)
        } else {
            Decimal::ZERO
        };

        info!(
            pool = %allocation.pool_id,
            score = %request.opportunity_score,
            rule = ?decision.rule,
            admitted,
            requested = %request.requested_amount,
            approved = %approved_amount,
            "Trade reviewed"
        );

        Ok(TradeAdmission {
            pool_id: allocation.pool_id.clone(),
            admitted,
            rule: decision.rule,
            drift: allocation.drift,
            requested_amount: request.requested_amount,
            max_trade_amount: bound,
            approved_amount,
        })
    }
}
