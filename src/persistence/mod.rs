//! SQLite persistence for controller state.
//!
//! The controller itself keeps everything in memory; durability is the
//! host's job. This store lets the CLI survive restarts:
//! - Pool balances and performance counters
//! - The active allocation policy
//! - Trade outcome history (append-only)
//! - Periodic status snapshots

use crate::pool::{PoolId, PoolRecord};
use crate::reporter::StatusSnapshot;
use crate::strategy::AllocationPolicy;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Persisted allocation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedPolicy {
    pub weights: HashMap<String, Decimal>,
    pub reserve_percent: Decimal,
    pub saved_at: DateTime<Utc>,
}

/// One entry of the trade outcome log.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedOutcome {
    pub timestamp: DateTime<Utc>,
    pub pool_id: String,
    pub pnl: Decimal,
    pub is_win: bool,
}

/// SQLite-based persistence manager.
pub struct PersistenceManager {
    conn: Connection,
}

fn parse_decimal(idx: usize, raw: String) -> rusqlite::Result<Decimal> {
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_time(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_pool_id(idx: usize, raw: String) -> rusqlite::Result<PoolId> {
    PoolId::new(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl PersistenceManager {
    /// Create a new persistence manager, initializing the database if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let manager = Self { conn };
        manager.init_schema()?;

        info!("Persistence manager initialized at {:?}", db_path.as_ref());
        Ok(manager)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Pool balances and counters
            CREATE TABLE IF NOT EXISTS pools (
                pool_id TEXT PRIMARY KEY,
                available TEXT NOT NULL,
                in_positions TEXT NOT NULL,
                pending TEXT NOT NULL,
                last_updated TEXT,
                cumulative_pnl TEXT NOT NULL,
                total_trades INTEGER NOT NULL,
                wins INTEGER NOT NULL,
                losses INTEGER NOT NULL
            );

            -- Active policy (singleton row) and its weights
            CREATE TABLE IF NOT EXISTS policy (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                reserve_percent TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS policy_weights (
                pool_id TEXT PRIMARY KEY,
                weight TEXT NOT NULL
            );

            -- Trade outcome history
            CREATE TABLE IF NOT EXISTS trade_outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                pool_id TEXT NOT NULL,
                pnl TEXT NOT NULL,
                is_win INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_outcomes_timestamp ON trade_outcomes(timestamp);
            CREATE INDEX IF NOT EXISTS idx_outcomes_pool ON trade_outcomes(pool_id);

            -- Status snapshots
            CREATE TABLE IF NOT EXISTS status_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                total_funds TEXT NOT NULL,
                total_available TEXT NOT NULL,
                combined_pnl TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_timestamp ON status_snapshots(timestamp);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Save every pool record, replacing what was stored.
    pub fn save_pools(&self, records: &[PoolRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM pools", [])?;
        for record in records {
            tx.execute(
                r#"
                INSERT INTO pools (pool_id, available, in_positions, pending, last_updated,
                                   cumulative_pnl, total_trades, wins, losses)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    record.pool_id.as_str(),
                    record.available.to_string(),
                    record.in_positions.to_string(),
                    record.pending.to_string(),
                    record.last_updated.map(|at| at.to_rfc3339()),
                    record.cumulative_pnl.to_string(),
                    record.total_trades,
                    record.wins,
                    record.losses,
                ],
            )?;
        }

        tx.commit()?;
        debug!(pools = records.len(), "Pools saved to database");
        Ok(())
    }

    /// Load every stored pool record, ordered by pool id.
    pub fn load_pools(&self) -> Result<Vec<PoolRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT pool_id, available, in_positions, pending, last_updated,
                   cumulative_pnl, total_trades, wins, losses
            FROM pools
            ORDER BY pool_id
            "#,
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(PoolRecord {
                    pool_id: parse_pool_id(0, row.get(0)?)?,
                    available: parse_decimal(1, row.get(1)?)?,
                    in_positions: parse_decimal(2, row.get(2)?)?,
                    pending: parse_decimal(3, row.get(3)?)?,
                    last_updated: row
                        .get::<_, Option<String>>(4)?
                        .map(|raw| parse_time(4, raw))
                        .transpose()?,
                    cumulative_pnl: parse_decimal(5, row.get(5)?)?,
                    total_trades: row.get(6)?,
                    wins: row.get(7)?,
                    losses: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load pool records")?;

        Ok(records)
    }

    /// Save the active policy, replacing any stored one.
    pub fn save_policy(&self, policy: &AllocationPolicy) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO policy (id, reserve_percent, saved_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                reserve_percent = ?1,
                saved_at = ?2
            "#,
            params![policy.reserve_percent().to_string(), Utc::now().to_rfc3339()],
        )?;

        tx.execute("DELETE FROM policy_weights", [])?;
        for (pool_id, weight) in policy.weights() {
            tx.execute(
                "INSERT INTO policy_weights (pool_id, weight) VALUES (?1, ?2)",
                params![pool_id.as_str(), weight.to_string()],
            )?;
        }

        tx.commit()?;
        debug!(reserve_percent = %policy.reserve_percent(), "Policy saved to database");
        Ok(())
    }

    /// Load the stored policy, if one was ever saved.
    pub fn load_policy(&self) -> Result<Option<PersistedPolicy>> {
        let header: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT reserve_percent, saved_at FROM policy WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((reserve_percent, saved_at)) = header else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare("SELECT pool_id, weight FROM policy_weights")?;
        let weights = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, parse_decimal(1, row.get(1)?)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .context("Failed to load policy weights")?;

        Ok(Some(PersistedPolicy {
            weights,
            reserve_percent: parse_decimal(0, reserve_percent)?,
            saved_at: parse_time(1, saved_at)?,
        }))
    }

    /// Append a trade outcome to the history log.
    pub fn record_trade_outcome(&self, pool_id: &str, pnl: Decimal, is_win: bool) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO trade_outcomes (timestamp, pool_id, pnl, is_win)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![Utc::now().to_rfc3339(), pool_id, pnl.to_string(), is_win as i32],
        )?;
        Ok(())
    }

    /// Most recent trade outcomes, newest first.
    pub fn recent_outcomes(&self, limit: usize) -> Result<Vec<PersistedOutcome>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT timestamp, pool_id, pnl, is_win
            FROM trade_outcomes
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let outcomes = stmt
            .query_map([limit], |row| {
                Ok(PersistedOutcome {
                    timestamp: parse_time(0, row.get(0)?)?,
                    pool_id: row.get(1)?,
                    pnl: parse_decimal(2, row.get(2)?)?,
                    is_win: row.get::<_, i32>(3)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load trade outcomes")?;

        Ok(outcomes)
    }

    /// Record a status snapshot.
    pub fn record_snapshot(&self, snapshot: &StatusSnapshot) -> Result<()> {
        let payload =
            serde_json::to_string(snapshot).context("Failed to serialize status snapshot")?;

        self.conn.execute(
            r#"
            INSERT INTO status_snapshots (timestamp, total_funds, total_available,
                                          combined_pnl, payload)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                snapshot.generated_at.to_rfc3339(),
                snapshot.total_funds.to_string(),
                snapshot.total_available.to_string(),
                snapshot.combined_pnl.to_string(),
                payload,
            ],
        )?;
        Ok(())
    }

    /// Number of stored snapshots.
    pub fn snapshot_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM status_snapshots", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Clear all data (for testing or reset).
    pub fn clear_all(&self) -> Result<()> {
        warn!("Clearing all persistence data");
        self.conn.execute_batch(
            r#"
            DELETE FROM pools;
            DELETE FROM policy;
            DELETE FROM policy_weights;
            DELETE FROM trade_outcomes;
            DELETE FROM status_snapshots;
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::controller::AllocationController;
    use rust_decimal_macros::dec;

    fn record(pool: &str) -> PoolRecord {
        PoolRecord {
            pool_id: PoolId::new(pool).unwrap(),
            available: dec!(950.25),
            in_positions: dec!(40),
            pending: Decimal::ZERO,
            last_updated: Some(Utc::now()),
            cumulative_pnl: dec!(-12.5),
            total_trades: 5,
            wins: 3,
            losses: 2,
        }
    }

    #[test]
    fn test_save_and_load_pools() {
        let manager = PersistenceManager::new(":memory:").unwrap();
        let mut never_fed = record("crypto");
        never_fed.last_updated = None;

        manager.save_pools(&[record("kalshi"), never_fed]).unwrap();
        let loaded = manager.load_pools().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].pool_id.as_str(), "crypto");
        assert!(loaded[0].last_updated.is_none());
        assert_eq!(loaded[1].available, dec!(950.25));
        assert_eq!(loaded[1].cumulative_pnl, dec!(-12.5));
        assert_eq!(loaded[1].wins + loaded[1].losses, loaded[1].total_trades);
    }

    #[test]
    fn test_save_and_load_policy() {
        let manager = PersistenceManager::new(":memory:").unwrap();
        assert!(manager.load_policy().unwrap().is_none());

        let (controller, _) = AllocationController::new(&Config::default()).unwrap();
        manager.save_policy(&controller.policy()).unwrap();

        let loaded = manager.load_policy().unwrap().unwrap();
        assert_eq!(loaded.reserve_percent, dec!(10));
        assert_eq!(loaded.weights["kalshi"], dec!(40));
        assert_eq!(loaded.weights["crypto"], dec!(50));
    }

    #[test]
    fn test_restore_controller_from_store() {
        let manager = PersistenceManager::new(":memory:").unwrap();
        let (original, _) = AllocationController::new(&Config::default()).unwrap();
        original
            .update_balance("kalshi", dec!(1000), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        original.record_trade_outcome("kalshi", dec!(20), true).unwrap();
        manager.save_pools(&original.export_pools()).unwrap();

        let (restored, _) = AllocationController::new(&Config::default()).unwrap();
        for record in manager.load_pools().unwrap() {
            restored.restore_pool(record).unwrap();
        }

        assert_eq!(restored.export_pools(), original.export_pools());
    }

    #[test]
    fn test_trade_outcome_log() {
        let manager = PersistenceManager::new(":memory:").unwrap();
        manager.record_trade_outcome("kalshi", dec!(4), true).unwrap();
        manager.record_trade_outcome("crypto", dec!(-1.5), false).unwrap();

        let outcomes = manager.recent_outcomes(10).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].pool_id, "crypto");
        assert!(!outcomes[0].is_win);
        assert_eq!(outcomes[1].pnl, dec!(4));
    }

    #[test]
    fn test_snapshots_and_clear() {
        let manager = PersistenceManager::new(":memory:").unwrap();
        let (controller, _) = AllocationController::new(&Config::default()).unwrap();

        manager.record_snapshot(&controller.snapshot()).unwrap();
        manager.save_pools(&controller.export_pools()).unwrap();
        assert_eq!(manager.snapshot_count().unwrap(), 1);

        manager.clear_all().unwrap();
        assert_eq!(manager.snapshot_count().unwrap(), 0);
        assert!(manager.load_pools().unwrap().is_empty());
    }
}
