//! Yahoo Finance price snapshots

use crate::cache::{CacheKey, TtlCache};
use crate::error::{BriefError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

/// Daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Latest close and day-over-day move for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub symbol: String,
    pub close: f64,
    /// Percent change against the previous close, when there is one
    pub change_pct: Option<f64>,
    pub as_of: DateTime<Utc>,
}

impl StockSnapshot {
    /// Build a snapshot from daily bars in chronological order
    pub fn from_quotes(symbol: &str, quotes: &[Quote]) -> Result<Self> {
        let Some(last) = quotes.last() else {
            return Err(BriefError::MarketData {
                symbol: symbol.to_string(),
                reason: "no quotes returned".to_string(),
            });
        };

        let change_pct = quotes
            .len()
            .checked_sub(2)
            .map(|i| quotes[i].close)
            .filter(|previous| *previous > 0.0)
            .map(|previous| (last.close - previous) / previous * 100.0);

        Ok(Self {
            symbol: symbol.to_string(),
            close: last.close,
            change_pct,
            as_of: last.timestamp,
        })
    }

    /// One-line summary for the brief context ("TSM closed at 182.40 (+1.25%)")
    pub fn line(&self) -> String {
        match self.change_pct {
            Some(change) => format!("{} closed at {:.2} ({change:+.2}%)", self.symbol, self.close),
            None => format!("{} closed at {:.2}", self.symbol, self.close),
        }
    }
}

/// Source of price snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn snapshot(&self, symbol: &str) -> Result<StockSnapshot>;
}

/// Yahoo Finance backed [`MarketData`] with a short-lived cache
#[derive(Clone)]
pub struct YahooMarketData {
    cache: TtlCache<StockSnapshot>,
}

impl YahooMarketData {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(cache_ttl),
        }
    }

    fn connector(symbol: &str) -> Result<yahoo::YahooConnector> {
        yahoo::YahooConnector::new().map_err(|e| market_error(symbol, e))
    }

    /// Daily bars for the last five sessions
    async fn recent_quotes(&self, symbol: &str) -> Result<Vec<Quote>> {
        let provider = Self::connector(symbol)?;

        let response = provider
            .get_quote_range(symbol, "1d", "5d")
            .await
            .map_err(|e| market_error(symbol, e))?;

        let quotes = response.quotes().map_err(|e| market_error(symbol, e))?;
        Ok(quotes.iter().map(convert_quote).collect())
    }
}

#[async_trait]
impl MarketData for YahooMarketData {
    #[instrument(skip(self))]
    async fn snapshot(&self, symbol: &str) -> Result<StockSnapshot> {
        self.cache
            .get_or_fetch(CacheKey::new("yahoo-snapshot", symbol), || async move {
                let quotes = self.recent_quotes(symbol).await?;
                debug!(bars = quotes.len(), "fetched recent quotes");
                StockSnapshot::from_quotes(symbol, &quotes)
            })
            .await
    }
}

fn convert_quote(q: &yahoo::Quote) -> Quote {
    Quote {
        timestamp: DateTime::from_timestamp(q.timestamp as i64, 0).unwrap_or_else(Utc::now),
        open: q.open,
        high: q.high,
        low: q.low,
        close: q.close,
        volume: q.volume,
    }
}

fn market_error(symbol: &str, reason: impl ToString) -> BriefError {
    BriefError::MarketData {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    }
}
