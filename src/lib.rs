//! # Venue Allocator
//!
//! Capital allocation and trade admission across independent trading
//! venues. Each venue is a pool of funds; the controller keeps the pools
//! near a target split, decides whether proposed trades may proceed, bounds
//! their size and suggests manual transfers when pools drift too far.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `controller`: The shared, thread-safe allocation controller
//! - `error`: Domain errors and non-fatal configuration warnings
//! - `feed`: Balance sources and the poller that ingests them
//! - `persistence`: SQLite-based state persistence
//! - `pool`: Per-venue balances and performance counters
//! - `reporter`: Status snapshots and their text rendering
//! - `strategy`: Allocation policy, drift, admission and rebalancing
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod controller;
pub mod error;
pub mod feed;
pub mod persistence;
pub mod pool;
pub mod reporter;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use controller::AllocationController;
pub use error::{AllocatorError, ConfigWarning};
