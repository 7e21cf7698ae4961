//! Configuration management for the venue allocator.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pool (venue) identifiers, fixed for the process lifetime
    #[serde(default = "default_pools")]
    pub pools: Vec<String>,
    /// Initial target allocation policy
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Trade admission parameters
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Rebalance suggestion parameters
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    /// Balance feed parameters
    #[serde(default)]
    pub balances: BalanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Target weight per pool, in percent of total funds
    #[serde(default = "default_weights")]
    pub weights: HashMap<String, Decimal>,
    /// Percent of total funds held back from every pool
    #[serde(default = "default_reserve_percent")]
    pub reserve_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Default per-trade ceiling in USD
    #[serde(default = "default_max_per_trade")]
    pub max_per_trade: Decimal,
    /// Pools with less available than this (USD) reject trades that no
    /// earlier rule admitted
    #[serde(default = "default_min_available")]
    pub min_available: Decimal,
    /// Absolute drift (USD) considered "near target"
    #[serde(default = "default_near_target_band")]
    pub near_target_band: Decimal,
    /// Minimum opportunity scores per admission rule
    #[serde(default)]
    pub thresholds: ScoreThresholds,
}

/// Minimum opportunity scores (0-100) used by the admission rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreThresholds {
    /// Pool below target
    #[serde(default = "default_under_allocated_score")]
    pub under_allocated: Decimal,
    /// Pool within `near_target_band` of target
    #[serde(default = "default_near_target_score")]
    pub near_target: Decimal,
    /// Pool above target
    #[serde(default = "default_over_allocated_score")]
    pub over_allocated: Decimal,
    /// Anything no other rule decided
    #[serde(default = "default_fallback_score")]
    pub fallback: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Drift (USD) a pool must exceed before a transfer is suggested
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// Seconds after which a pool's balance is reported as stale
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

// Default value functions
fn default_pools() -> Vec<String> {
    vec!["kalshi".to_string(), "crypto".to_string()]
}

fn default_weights() -> HashMap<String, Decimal> {
    HashMap::from([
        ("kalshi".to_string(), Decimal::new(40, 0)),
        ("crypto".to_string(), Decimal::new(50, 0)),
    ])
}

fn default_reserve_percent() -> Decimal {
    Decimal::new(10, 0) // 10%
}

fn default_max_per_trade() -> Decimal {
    Decimal::new(25, 0) // $25
}

fn default_min_available() -> Decimal {
    Decimal::new(5, 0) // $5
}

fn default_near_target_band() -> Decimal {
    Decimal::new(20, 0) // $20
}

fn default_under_allocated_score() -> Decimal {
    Decimal::new(60, 0)
}

fn default_near_target_score() -> Decimal {
    Decimal::new(70, 0)
}

fn default_over_allocated_score() -> Decimal {
    Decimal::new(85, 0)
}

fn default_fallback_score() -> Decimal {
    Decimal::new(75, 0)
}

fn default_drift_threshold() -> Decimal {
    Decimal::new(50, 0) // $50
}

fn default_stale_after_secs() -> u64 {
    300
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("VALLOC"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    ///
    /// Weight sums are deliberately not checked here; the policy normalizes
    /// them and reports a warning instead.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.pools.is_empty(), "at least one pool must be configured");

        let mut seen = HashSet::new();
        for pool in &self.pools {
            anyhow::ensure!(!pool.trim().is_empty(), "pool ids must not be blank");
            anyhow::ensure!(seen.insert(pool.trim()), "duplicate pool id: {}", pool);
        }

        anyhow::ensure!(
            self.admission.max_per_trade >= Decimal::ZERO,
            "max_per_trade must not be negative"
        );
        anyhow::ensure!(
            self.admission.min_available >= Decimal::ZERO,
            "min_available must not be negative"
        );
        anyhow::ensure!(
            self.admission.near_target_band >= Decimal::ZERO,
            "near_target_band must not be negative"
        );
        anyhow::ensure!(
            self.rebalance.drift_threshold >= Decimal::ZERO,
            "drift_threshold must not be negative"
        );

        let hundred = Decimal::ONE_HUNDRED;
        let t = &self.admission.thresholds;
        for (name, score) in [
            ("under_allocated", t.under_allocated),
            ("near_target", t.near_target),
            ("over_allocated", t.over_allocated),
            ("fallback", t.fallback),
        ] {
            anyhow::ensure!(
                score >= Decimal::ZERO && score <= hundred,
                "{} score threshold must be between 0 and 100",
                name
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pools: default_pools(),
            allocation: AllocationConfig::default(),
            admission: AdmissionConfig::default(),
            rebalance: RebalanceConfig::default(),
            balances: BalanceConfig::default(),
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            reserve_percent: default_reserve_percent(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_per_trade: default_max_per_trade(),
            min_available: default_min_available(),
            near_target_band: default_near_target_band(),
            thresholds: ScoreThresholds::default(),
        }
    }
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            under_allocated: default_under_allocated_score(),
            near_target: default_near_target_score(),
            over_allocated: default_over_allocated_score(),
            fallback: default_fallback_score(),
        }
    }
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            drift_threshold: default_drift_threshold(),
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
        }
    }
}
