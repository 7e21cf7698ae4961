//! Balance source backed by a JSON file written by an external fetcher.

use super::BalanceSource;
use crate::pool::BalanceReport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Reads `{"pool_id": {"available": .., "in_positions": .., "pending": ..}}`.
#[derive(Debug, Clone)]
pub struct FileBalanceSource {
    path: PathBuf,
}

impl FileBalanceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BalanceSource for FileBalanceSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_balances(&self) -> Result<HashMap<String, BalanceReport>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read balances from {:?}", self.path))?;

        let balances: HashMap<String, BalanceReport> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse balances in {:?}", self.path))?;

        debug!(path = ?self.path, pools = balances.len(), "Balances read from file");
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_balances_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"kalshi": {{"available": 120.5, "in_positions": 30}}, "crypto": {{"available": "7", "pending": "1.25"}}}}"#
        )
        .unwrap();

        let balances = FileBalanceSource::new(file.path()).fetch_balances().await.unwrap();

        assert_eq!(balances.len(), 2);
        assert_eq!(balances["kalshi"].available, dec!(120.5));
        assert_eq!(balances["kalshi"].in_positions, dec!(30));
        assert_eq!(balances["crypto"].pending, dec!(1.25));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let source = FileBalanceSource::new("/nonexistent/balances.json");
        assert!(source.fetch_balances().await.is_err());
    }
}
