//! Earnings calendar scraping and surprise lines

use crate::cache::{CacheKey, TtlCache};
use crate::composer::format_pct;
use crate::error::{BriefError, Result};
use crate::exposure::earnings_surprise;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, instrument};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// Summary used when the calendar has no parsable rows
pub const NO_SURPRISES: &str = "No significant earnings surprises found.";

/// Reported EPS against consensus for one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsSurprise {
    pub company: String,
    pub estimate_eps: f64,
    pub actual_eps: f64,
    /// `(actual - estimate) / estimate * 100`, two decimals
    pub surprise_pct: f64,
}

impl EarningsSurprise {
    pub fn new(company: impl Into<String>, estimate_eps: f64, actual_eps: f64) -> Result<Self> {
        Ok(Self {
            company: company.into(),
            estimate_eps,
            actual_eps,
            surprise_pct: earnings_surprise(actual_eps, estimate_eps)?,
        })
    }

    /// "TSMC beat estimates by 4.0%" / "Nike missed estimates by 12.5%"
    pub fn line(&self) -> String {
        let magnitude = format_pct(self.surprise_pct.abs());
        if self.surprise_pct > 0.0 {
            format!("{} beat estimates by {magnitude}%", self.company)
        } else if self.surprise_pct < 0.0 {
            format!("{} missed estimates by {magnitude}%", self.company)
        } else {
            format!("{} met estimates", self.company)
        }
    }
}

/// Join surprise lines into one paragraph
pub fn summarize(surprises: &[EarningsSurprise]) -> String {
    if surprises.is_empty() {
        return NO_SURPRISES.to_string();
    }
    let lines: Vec<String> = surprises.iter().map(EarningsSurprise::line).collect();
    format!("{}.", lines.join(". "))
}

/// Source of recent earnings results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EarningsSource: Send + Sync {
    async fn latest(&self) -> Result<Vec<EarningsSurprise>>;
}

static TBODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tbody[^>]*>(.*?)</tbody>").expect("valid tbody regex"));
static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("valid row regex"));
static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("valid cell regex"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

/// Extract earnings surprises from an earnings calendar table
///
/// Looks at the first `limit` body rows. Column 1 is the company, columns 4
/// and 5 the EPS estimate and actual. Rows with fewer than six cells or
/// non-numeric EPS are skipped.
pub fn parse_earnings_table(html: &str, limit: usize) -> Vec<EarningsSurprise> {
    let body = TBODY
        .captures(html)
        .and_then(|c| c.get(1))
        .map_or(html, |m| m.as_str());

    ROW.captures_iter(body)
        .filter_map(|row| row.get(1))
        .take(limit)
        .filter_map(|row| {
            let cells: Vec<String> = CELL
                .captures_iter(row.as_str())
                .filter_map(|c| c.get(1))
                .map(|c| cell_text(c.as_str()))
                .collect();
            if cells.len() < 6 {
                return None;
            }

            let estimate = parse_eps(&cells[4])?;
            let actual = parse_eps(&cells[5])?;
            match EarningsSurprise::new(cells[1].clone(), estimate, actual) {
                Ok(surprise) => Some(surprise),
                Err(e) => {
                    debug!(company = %cells[1], error = %e, "skipping earnings row");
                    None
                }
            }
        })
        .collect()
}

fn cell_text(raw: &str) -> String {
    let text = TAG.replace_all(raw, "");
    text.replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

fn parse_eps(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && *c != '+').collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Rate-limited, cached scraper for the Yahoo Finance earnings calendar
#[derive(Clone)]
pub struct EarningsScraper {
    client: Client,
    url: String,
    limit: usize,
    rate_limiter: SharedRateLimiter,
    cache: TtlCache<Vec<EarningsSurprise>>,
}

impl EarningsScraper {
    pub fn new(
        url: impl Into<String>,
        limit: usize,
        requests_per_minute: u32,
        cache_ttl: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()?;

        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            url: url.into(),
            limit,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            cache: TtlCache::new(cache_ttl),
        })
    }

    async fn fetch_page(&self) -> Result<String> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| BriefError::external("earnings calendar", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BriefError::external(
                "earnings calendar",
                format!("HTTP {}", status.as_u16()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| BriefError::external("earnings calendar", e))
    }
}

#[async_trait]
impl EarningsSource for EarningsScraper {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn latest(&self) -> Result<Vec<EarningsSurprise>> {
        self.cache
            .get_or_fetch(CacheKey::new("earnings-calendar", self.url.clone()), || async move {
                let html = self.fetch_page().await?;
                let surprises = parse_earnings_table(&html, self.limit);
                debug!(rows = surprises.len(), "parsed earnings calendar");
                Ok(surprises)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALENDAR: &str = r#"
        <table>
          <thead><tr><th>Symbol</th><th>Company</th><th>Call Time</th><th>Date</th><th>EPS Estimate</th><th>Reported EPS</th><th>Surprise</th></tr></thead>
          <tbody>
            <tr><td><a href="/quote/TSM">TSM</a></td><td>Taiwan Semiconductor</td><td>BMO</td><td>Oct 16</td><td>1.75</td><td>1.82</td><td>+4.00</td></tr>
            <tr><td>NKE</td><td>Nike &amp; Co</td><td>AMC</td><td>Oct 16</td><td>0.80</td><td>0.70</td><td>-12.50</td></tr>
            <tr><td>XYZ</td><td>No Report Inc</td><td>TAS</td><td>Oct 16</td><td>0.40</td><td>-</td><td>-</td></tr>
            <tr><td>SHORT</td><td>Too Few Cells</td></tr>
            <tr><td>ABC</td><td>Flat Corp</td><td>AMC</td><td>Oct 16</td><td>1.00</td><td>1.00</td><td>0</td></tr>
            <tr><td>LATE</td><td>Sixth Row Ltd</td><td>AMC</td><td>Oct 16</td><td>1.00</td><td>2.00</td><td>100</td></tr>
          </tbody>
        </table>"#;

    #[test]
    fn test_parse_earnings_table() {
        let surprises = parse_earnings_table(CALENDAR, 5);

        assert_eq!(surprises.len(), 3);
        assert_eq!(surprises[0].company, "Taiwan Semiconductor");
        assert_eq!(surprises[0].surprise_pct, 4.0);
        assert_eq!(surprises[1].company, "Nike & Co");
        assert_eq!(surprises[1].surprise_pct, -12.5);
        assert_eq!(surprises[2].company, "Flat Corp");
    }

    #[test]
    fn test_parse_respects_row_limit() {
        assert_eq!(parse_earnings_table(CALENDAR, 1).len(), 1);
        assert_eq!(parse_earnings_table(CALENDAR, 10).len(), 4);
        assert!(parse_earnings_table("<html>maintenance</html>", 5).is_empty());
    }

    #[test]
    fn test_surprise_lines() {
        let surprises = parse_earnings_table(CALENDAR, 5);
        assert_eq!(surprises[0].line(), "Taiwan Semiconductor beat estimates by 4.0%");
        assert_eq!(surprises[1].line(), "Nike & Co missed estimates by 12.5%");
        assert_eq!(surprises[2].line(), "Flat Corp met estimates");

        assert_eq!(
            summarize(&surprises[..2]),
            "Taiwan Semiconductor beat estimates by 4.0%. Nike & Co missed estimates by 12.5%."
        );
        assert_eq!(summarize(&[]), NO_SURPRISES);
    }

    #[test]
    fn test_zero_estimate_row_is_skipped() {
        let html = "<tbody><tr><td>Z</td><td>Zero Est</td><td></td><td></td><td>0.00</td><td>0.10</td></tr></tbody>";
        assert!(parse_earnings_table(html, 5).is_empty());
        assert!(EarningsSurprise::new("Zero Est", 0.0, 0.1).is_err());
    }

    #[test]
    fn test_parse_eps() {
        assert_eq!(parse_eps("+1.25"), Some(1.25));
        assert_eq!(parse_eps("1,234.5"), Some(1234.5));
        assert_eq!(parse_eps("-0.30"), Some(-0.3));
        assert_eq!(parse_eps("-"), None);
        assert_eq!(parse_eps("N/A"), None);
    }

    #[tokio::test]
    async fn test_mock_source() {
        let mut source = MockEarningsSource::new();
        source
            .expect_latest()
            .returning(|| Err(BriefError::external("earnings calendar", "HTTP 403")));

        let err = source.latest().await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_scrape() {
        let scraper = EarningsScraper::new(
            crate::config::DEFAULT_EARNINGS_URL,
            5,
            6,
            Duration::from_secs(60),
            Duration::from_secs(30),
        )
        .unwrap();
        let surprises = scraper.latest().await.unwrap();
        assert!(surprises.len() <= 5);
    }
}
