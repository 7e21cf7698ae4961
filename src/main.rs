//! Venue Allocator - Main Entry Point
//!
//! Operator CLI over the allocation controller. Every command restores the
//! controller from the SQLite store, applies one action and saves it back.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use venue_allocator::config::Config;
use venue_allocator::feed::{BalancePoller, FileBalanceSource};
use venue_allocator::persistence::PersistenceManager;
use venue_allocator::strategy::TradeAdmissionRequest;
use venue_allocator::{AllocationController, AllocatorError, ConfigWarning};

/// Venue Allocator CLI
#[derive(Parser)]
#[command(name = "venue-allocator")]
#[command(version, about = "Cross-venue capital allocation and trade admission")]
struct Cli {
    /// Path to SQLite database
    #[arg(short, long, global = true, default_value = "data/allocator.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show balances, targets, drift and performance for every pool
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a pool's balances
    Balance {
        /// Pool identifier
        pool: String,

        /// Free funds
        #[arg(allow_negative_numbers = true)]
        available: Decimal,

        /// Funds committed to open positions
        #[arg(default_value = "0", allow_negative_numbers = true)]
        in_positions: Decimal,

        /// Funds in transit
        #[arg(default_value = "0", allow_negative_numbers = true)]
        pending: Decimal,
    },

    /// Record a closed trade
    Record {
        /// Pool identifier
        pool: String,

        /// Signed realized P&L
        #[arg(allow_negative_numbers = true)]
        pnl: Decimal,

        /// The trade was a win
        #[arg(long, conflicts_with = "loss", required_unless_present = "loss")]
        win: bool,

        /// The trade was a loss
        #[arg(long)]
        loss: bool,
    },

    /// Ask whether a trade may proceed
    Check {
        /// Pool identifier
        pool: String,

        /// Opportunity score (0-100)
        score: Decimal,

        /// Requested trade size; bounds and approves an amount when given
        #[arg(short, long)]
        amount: Option<Decimal>,

        /// Per-trade ceiling (default: admission.max_per_trade)
        #[arg(short, long)]
        max_per_trade: Option<Decimal>,
    },

    /// Show the current rebalance suggestion
    Suggest,

    /// Show or replace the allocation policy
    Policy {
        /// Target weight as POOL=PERCENT (repeatable)
        #[arg(short, long = "weight", value_parser = parse_weight)]
        weights: Vec<(String, Decimal)>,

        /// Reserve percent
        #[arg(short, long)]
        reserve: Option<Decimal>,
    },

    /// Zero a pool's performance counters
    ResetStats {
        /// Pool identifier
        pool: String,
    },

    /// Poll a balances file and keep the store current
    Watch {
        /// JSON file mapping pool ids to balance reports
        #[arg(short, long)]
        balances: PathBuf,

        /// Seconds between polls
        #[arg(short, long, default_value = "30")]
        interval: u64,
    },
}

fn parse_weight(raw: &str) -> std::result::Result<(String, Decimal), String> {
    let (pool, weight) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected POOL=PERCENT, got '{}'", raw))?;
    let weight = weight
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("invalid weight '{}': {}", weight, e))?;
    Ok((pool.trim().to_string(), weight))
}

/// Controller restored from the store, plus the store itself.
struct Session {
    controller: Arc<AllocationController>,
    persistence: PersistenceManager,
}

impl Session {
    fn open(db_path: &str) -> Result<Self> {
        let config = Config::load()?;
        config.validate()?;
        log_config(&config);

        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }
        let persistence = PersistenceManager::new(db_path)?;

        let (controller, warnings) = AllocationController::new(&config)?;
        print_warnings(&warnings);

        if let Some(policy) = persistence.load_policy()? {
            info!("📂 [PERSISTENCE] Restoring policy saved at {}", policy.saved_at);
            let warnings = controller.set_policy(&policy.weights, policy.reserve_percent);
            print_warnings(&warnings);
        }

        for record in persistence.load_pools()? {
            match controller.restore_pool(record) {
                Ok(()) => {}
                Err(AllocatorError::UnknownPool { pool_id }) => {
                    warn!(
                        "⚠️  [PERSISTENCE] Skipping stored pool '{}' (no longer configured)",
                        pool_id
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self {
            controller: Arc::new(controller),
            persistence,
        })
    }

    fn save(&self) -> Result<()> {
        self.persistence
            .save_pools(&self.controller.export_pools())?;
        debug!("💾 [PERSISTENCE] Pool state saved");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize comprehensive logging
    init_logging()?;

    let session = Session::open(&cli.db)?;

    match cli.command {
        Commands::Status { json } => show_status(&session, json),
        Commands::Balance {
            pool,
            available,
            in_positions,
            pending,
        } => {
            let warnings = session
                .controller
                .update_balance(&pool, available, in_positions, pending)?;
            print_warnings(&warnings);
            session.save()?;

            let allocation = session.controller.allocation(&pool)?;
            println!("✅ {} balance updated", allocation.pool_id);
            println!("   ├─ Total:   ${:.2}", allocation.total);
            println!("   ├─ Target:  ${:.2}", allocation.target);
            println!("   └─ Drift:   ${:+.2}", allocation.drift);
            Ok(())
        }
        Commands::Record { pool, pnl, win, .. } => {
            session.controller.record_trade_outcome(&pool, pnl, win)?;
            session
                .persistence
                .record_trade_outcome(pool.trim(), pnl, win)?;
            session.save()?;

            let stats = session.controller.stats(&pool)?;
            println!("✅ Outcome recorded for {}", pool.trim());
            println!("   ├─ Cumulative P&L: ${:.2}", stats.pnl);
            println!(
                "   ├─ Trades:         {} ({}W / {}L)",
                stats.trades, stats.wins, stats.losses
            );
            println!("   └─ Win Rate:       {:.1}%", stats.win_rate);
            Ok(())
        }
        Commands::Check {
            pool,
            score,
            amount,
            max_per_trade,
        } => {
            let max_per_trade =
                max_per_trade.unwrap_or_else(|| session.controller.default_max_per_trade());
            check_trade(&session.controller, &pool, score, amount, max_per_trade)
        }
        Commands::Suggest => {
            match session.controller.suggestion() {
                Some(s) => println!(
                    "🔄 Move ${:.2} from {} to {}",
                    s.amount, s.from_pool, s.to_pool
                ),
                None => println!("✅ No rebalance needed"),
            }
            Ok(())
        }
        Commands::Policy { weights, reserve } => update_policy(&session, weights, reserve),
        Commands::ResetStats { pool } => {
            session.controller.reset_stats(&pool)?;
            session.save()?;
            println!("✅ Performance counters reset for {}", pool.trim());
            Ok(())
        }
        Commands::Watch { balances, interval } => watch(&session, balances, interval).await,
    }
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "venue-allocator.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("venue_allocator=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stderr.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Pools: {}", config.pools.join(", "));
    for pool in &config.pools {
        let weight = config
            .allocation
            .weights
            .get(pool)
            .copied()
            .unwrap_or(Decimal::ZERO);
        info!("   Weight {}: {}%", pool, weight);
    }
    info!("   Reserve: {}%", config.allocation.reserve_percent);
    info!("   Max Per Trade: ${}", config.admission.max_per_trade);
    info!("   Min Available: ${}", config.admission.min_available);
    info!("   Near-Target Band: ${}", config.admission.near_target_band);
    info!("   Drift Threshold: ${}", config.rebalance.drift_threshold);
    info!("   Stale After: {}s", config.balances.stale_after_secs);
}

fn print_warnings(warnings: &[ConfigWarning]) {
    for warning in warnings {
        println!("⚠️  {}", warning);
    }
}

fn show_status(session: &Session, json: bool) -> Result<()> {
    let snapshot = session.controller.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              VENUE ALLOCATOR STATUS                        ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    print!("{}", snapshot);

    let outcomes = session.persistence.recent_outcomes(5)?;
    if !outcomes.is_empty() {
        println!("\n🧾 Recent Outcomes");
        for (i, outcome) in outcomes.iter().enumerate() {
            let branch = if i + 1 == outcomes.len() { "└─" } else { "├─" };
            println!(
                "   {} {} {} ${:+.2} ({})",
                branch,
                outcome.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                outcome.pool_id,
                outcome.pnl,
                if outcome.is_win { "win" } else { "loss" }
            );
        }
    }

    Ok(())
}

fn verdict_label(admitted: bool) -> (&'static str, &'static str) {
    if admitted {
        ("✅", "ADMIT")
    } else {
        ("❌", "REJECT")
    }
}

fn check_trade(
    controller: &AllocationController,
    pool: &str,
    score: Decimal,
    amount: Option<Decimal>,
    max_per_trade: Decimal,
) -> Result<()> {
    match amount {
        Some(requested) => {
            let request = TradeAdmissionRequest::new(pool, requested, score, max_per_trade);
            let verdict = controller.review_trade(&request)?;
            let (icon, label) = verdict_label(verdict.admitted);
            println!("{} {} trade on {}", icon, label, verdict.pool_id);
            println!("   ├─ Rule:        {:?}", verdict.rule);
            println!("   ├─ Drift:       ${:+.2}", verdict.drift);
            println!("   ├─ Requested:   ${:.2}", verdict.requested_amount);
            println!("   ├─ Max Trade:   ${:.2}", verdict.max_trade_amount);
            println!("   └─ Approved:    ${:.2}", verdict.approved_amount);
        }
        None => {
            let decision = controller.evaluate_admission(pool, score)?;
            let max_trade = controller.max_trade_amount(pool, max_per_trade)?;
            let (icon, label) = verdict_label(decision.admitted);
            println!("{} {} (score {})", icon, label, score);
            println!("   ├─ Rule:        {:?}", decision.rule);
            println!("   └─ Max Trade:   ${:.2}", max_trade);
        }
    }
    Ok(())
}

fn update_policy(
    session: &Session,
    weights: Vec<(String, Decimal)>,
    reserve: Option<Decimal>,
) -> Result<()> {
    if !weights.is_empty() || reserve.is_some() {
        let current = session.controller.policy();
        let mut merged: HashMap<String, Decimal> = current
            .weights()
            .iter()
            .map(|(pool, weight)| (pool.to_string(), *weight))
            .collect();
        merged.extend(weights);

        let reserve = reserve.unwrap_or_else(|| current.reserve_percent());
        let warnings = session.controller.set_policy(&merged, reserve);
        print_warnings(&warnings);
        session.persistence.save_policy(&session.controller.policy())?;
        println!("✅ Policy updated");
    }

    let policy = session.controller.policy();
    println!("📐 Allocation Policy");
    for (pool, weight) in policy.weights() {
        println!(
            "   ├─ {}: {}% (effective {:.2}%)",
            pool,
            weight,
            policy.effective_percent(pool.as_str())
        );
    }
    println!("   └─ Reserve: {}%", policy.reserve_percent());
    Ok(())
}

async fn watch(session: &Session, balances: PathBuf, interval_secs: u64) -> Result<()> {
    anyhow::ensure!(interval_secs > 0, "interval must be at least one second");

    let poller = BalancePoller::new(session.controller.clone())
        .with_source(Arc::new(FileBalanceSource::new(balances)));
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));

    info!("🚀 Watching balances every {}s", interval_secs);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = poller.poll_once().await;
                for source in &report.failed_sources {
                    error!("❌ [FEED] Source {} failed", source);
                }
                for pool in &report.unknown_pools {
                    warn!("⚠️  [FEED] Ignoring unconfigured pool '{}'", pool);
                }
                info!("📡 [FEED] Updated {} pools", report.updated.len());

                if let Err(e) = session.save() {
                    warn!("⚠️  [PERSISTENCE] Failed to save pools: {}", e);
                }
                let snapshot = session.controller.snapshot();
                if let Err(e) = session.persistence.record_snapshot(&snapshot) {
                    warn!("⚠️  [PERSISTENCE] Failed to record snapshot: {}", e);
                }
                if let Some(s) = &snapshot.suggestion {
                    info!(
                        "🔄 [REBALANCE] Move ${:.2} from {} to {}",
                        s.amount, s.from_pool, s.to_pool
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Shutdown signal received");
                break;
            }
        }
    }

    session.save()
}
