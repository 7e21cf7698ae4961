//! Target allocation policy across pools.

use crate::error::ConfigWarning;
use crate::pool::PoolId;
use crate::utils::decimal::{clamp, mul_div, percent_of, safe_div};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Target percentage split across pools plus a held-back reserve.
///
/// Weights are used as relative proportions of the investable (non-reserve)
/// funds, so a policy whose weights and reserve do not add up to 100 still
/// produces targets that, together with the reserve, sum to total funds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPolicy {
    weights: BTreeMap<PoolId, Decimal>,
    reserve_percent: Decimal,
    #[serde(skip)]
    weight_sum: Decimal,
}

impl AllocationPolicy {
    /// Build a policy for the configured `pools`.
    ///
    /// Never fails: unknown pools are dropped, missing pools get weight 0,
    /// weights and the reserve are clamped into 0..=100, and keys are
    /// trimmed with the first of any duplicates kept.
    /// Every such repair is reported in the returned warnings.
    pub fn build(
        pools: &[PoolId],
        weights: &HashMap<String, Decimal>,
        reserve_percent: Decimal,
    ) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();

        // Trim keys once; an exact key beats a padded one naming the same pool
        let mut keys: Vec<&String> = weights.keys().collect();
        keys.sort_by(|a, b| {
            (a.trim() != a.as_str(), a.as_str()).cmp(&(b.trim() != b.as_str(), b.as_str()))
        });
        let mut normalized: BTreeMap<&str, Decimal> = BTreeMap::new();
        for key in keys {
            let trimmed = key.trim();
            if normalized.contains_key(trimmed) {
                warnings.push(ConfigWarning::DuplicatePoolWeight {
                    pool_id: trimmed.to_string(),
                    ignored_key: key.clone(),
                });
            } else {
                normalized.insert(trimmed, weights[key]);
            }
        }

        warnings.extend(
            normalized
                .keys()
                .filter(|id| !pools.iter().any(|pool| pool.as_str() == **id))
                .map(|id| ConfigWarning::UnknownPoolWeight {
                    pool_id: id.to_string(),
                }),
        );

        let mut resolved = BTreeMap::new();
        for pool in pools {
            let weight = match normalized.get(pool.as_str()).copied() {
                Some(w) if w < Decimal::ZERO => {
                    warnings.push(ConfigWarning::NegativeWeightClamped {
                        pool_id: pool.to_string(),
                        weight: w,
                    });
                    Decimal::ZERO
                }
                Some(w) if w > dec!(100) => {
                    warnings.push(ConfigWarning::ExcessWeightClamped {
                        pool_id: pool.to_string(),
                        weight: w,
                    });
                    dec!(100)
                }
                Some(w) => w,
                None => {
                    warnings.push(ConfigWarning::MissingPoolWeight {
                        pool_id: pool.to_string(),
                    });
                    Decimal::ZERO
                }
            };
            resolved.insert(pool.clone(), weight);
        }

        let reserve = clamp(reserve_percent, Decimal::ZERO, dec!(100));
        if reserve != reserve_percent {
            warnings.push(ConfigWarning::ReserveOutOfRange { reserve_percent });
        }

        let weight_sum: Decimal = resolved.values().copied().sum();
        if weight_sum == Decimal::ZERO {
            warnings.push(ConfigWarning::NoPositiveWeights);
        }
        if weight_sum + reserve != dec!(100) {
            warnings.push(ConfigWarning::WeightsDoNotSumTo100 {
                sum: weight_sum + reserve,
            });
        }

        let policy = Self {
            weights: resolved,
            reserve_percent: reserve,
            weight_sum,
        };
        (policy, warnings)
    }

    /// Configured weight for a pool, zero if the pool is not in the policy.
    pub fn weight(&self, pool_id: &str) -> Decimal {
        self.weights.get(pool_id).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn weights(&self) -> &BTreeMap<PoolId, Decimal> {
        &self.weights
    }

    pub fn reserve_percent(&self) -> Decimal {
        self.reserve_percent
    }

    /// Portion of `total_funds` held back from every pool.
    pub fn reserve_amount(&self, total_funds: Decimal) -> Decimal {
        percent_of(total_funds, self.reserve_percent)
    }

    /// Funds left for pool targets after the reserve.
    pub fn investable(&self, total_funds: Decimal) -> Decimal {
        total_funds - self.reserve_amount(total_funds)
    }

    /// Effective share of total funds targeted at a pool, in percent.
    pub fn effective_percent(&self, pool_id: &str) -> Decimal {
        safe_div(
            (dec!(100) - self.reserve_percent) * self.weight(pool_id),
            self.weight_sum,
        )
    }

    /// Target amount for a pool given the total funds across all pools.
    pub fn target_amount(&self, pool_id: &str, total_funds: Decimal) -> Decimal {
        let investable = self.investable(total_funds);
        let target = mul_div(investable, self.weight(pool_id), self.weight_sum);

        debug!(
            pool = pool_id,
            %total_funds,
            %investable,
            %target,
            "Target computed"
        );
        target
    }
}
