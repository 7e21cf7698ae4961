//! Error and warning types for the allocation controller.
//!
//! Errors are always returned to the caller. Warnings never stop an
//! operation: they are logged and handed back alongside the result so a
//! misbehaving balance feed or a typo in the weights cannot halt admission
//! decisions for the rest of the system.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by the controller API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    #[error("unknown pool: {pool_id}")]
    UnknownPool { pool_id: String },

    #[error("at least one pool must be configured")]
    NoPools,

    #[error("pool configured more than once: {pool_id}")]
    DuplicatePool { pool_id: String },

    #[error("pool id must not be blank")]
    InvalidPoolId,

    #[error("invalid {field}: {value}")]
    InvalidAmount { field: &'static str, value: Decimal },

    #[error("{field} would overflow for pool {pool_id}")]
    AmountOverflow { pool_id: String, field: &'static str },

    #[error("inconsistent record for pool {pool_id}: {reason}")]
    InconsistentRecord { pool_id: String, reason: String },
}

impl AllocatorError {
    pub(crate) fn unknown_pool(pool_id: &str) -> Self {
        Self::UnknownPool {
            pool_id: pool_id.to_string(),
        }
    }
}

/// Balance field names, used when reporting clamped inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceField {
    Available,
    InPositions,
    Pending,
}

impl fmt::Display for BalanceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceField::Available => write!(f, "available"),
            BalanceField::InPositions => write!(f, "in_positions"),
            BalanceField::Pending => write!(f, "pending"),
        }
    }
}

/// Non-fatal configuration or input problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigWarning {
    /// Pool weights plus reserve do not add up to 100; weights are used as
    /// relative proportions instead.
    WeightsDoNotSumTo100 { sum: Decimal },
    /// Every pool weight is zero, so no pool has a tradable target.
    NoPositiveWeights,
    /// A weight was supplied for a pool that is not configured; it is ignored.
    UnknownPoolWeight { pool_id: String },
    /// A configured pool has no weight; it is treated as zero.
    MissingPoolWeight { pool_id: String },
    /// A negative weight was replaced with zero.
    NegativeWeightClamped { pool_id: String, weight: Decimal },
    /// A weight above 100 was replaced with 100.
    ExcessWeightClamped { pool_id: String, weight: Decimal },
    /// Two weight keys name the same pool once trimmed; the later one is ignored.
    DuplicatePoolWeight { pool_id: String, ignored_key: String },
    /// Reserve outside 0..=100 was clamped into range.
    ReserveOutOfRange { reserve_percent: Decimal },
    /// A negative balance from an upstream feed was replaced with zero.
    NegativeBalanceClamped {
        pool_id: String,
        field: BalanceField,
        value: Decimal,
    },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::WeightsDoNotSumTo100 { sum } => {
                write!(f, "pool weights plus reserve sum to {sum}, not 100; normalizing")
            }
            ConfigWarning::NoPositiveWeights => {
                write!(f, "no pool has a positive weight; all targets are zero")
            }
            ConfigWarning::UnknownPoolWeight { pool_id } => {
                write!(f, "weight given for unconfigured pool {pool_id}; ignored")
            }
            ConfigWarning::MissingPoolWeight { pool_id } => {
                write!(f, "no weight given for pool {pool_id}; using 0")
            }
            ConfigWarning::NegativeWeightClamped { pool_id, weight } => {
                write!(f, "negative weight {weight} for pool {pool_id}; using 0")
            }
            ConfigWarning::ExcessWeightClamped { pool_id, weight } => {
                write!(f, "weight {weight} for pool {pool_id} above 100; using 100")
            }
            ConfigWarning::DuplicatePoolWeight {
                pool_id,
                ignored_key,
            } => write!(f, "weight key {ignored_key:?} repeats pool {pool_id}; ignored"),
            ConfigWarning::ReserveOutOfRange { reserve_percent } => {
                write!(f, "reserve {reserve_percent}% outside 0..=100; clamped")
            }
            ConfigWarning::NegativeBalanceClamped {
                pool_id,
                field,
                value,
            } => write!(f, "negative {field} {value} for pool {pool_id}; clamped to 0"),
        }
    }
}

/// Log each warning at `warn!` level and hand them back.
pub(crate) fn surface(warnings: Vec<ConfigWarning>) -> Vec<ConfigWarning> {
    for warning in &warnings {
        tracing::warn!(%warning, "Configuration warning");
    }
    warnings
}
