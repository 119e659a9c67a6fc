//! Allocation exposure, day-over-day trend, and earnings surprise math

use crate::error::{BriefError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A change above this many percentage points is "significant"
pub const SIGNIFICANT_CHANGE_PCT: f64 = 2.0;

/// Qualitative label for a day-over-day exposure change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    IncreasedSignificantly,
    SlightlyIncreased,
    RemainedSteady,
    SlightlyDecreased,
    DecreasedSignificantly,
}

impl TrendLabel {
    /// Label a change measured in percentage points (already rounded)
    pub fn classify(delta_pct: f64) -> Self {
        if delta_pct > SIGNIFICANT_CHANGE_PCT {
            Self::IncreasedSignificantly
        } else if delta_pct > 0.0 {
            Self::SlightlyIncreased
        } else if delta_pct < -SIGNIFICANT_CHANGE_PCT {
            Self::DecreasedSignificantly
        } else if delta_pct < 0.0 {
            Self::SlightlyDecreased
        } else {
            Self::RemainedSteady
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncreasedSignificantly => "increased significantly",
            Self::SlightlyIncreased => "slightly increased",
            Self::RemainedSteady => "remained steady",
            Self::SlightlyDecreased => "slightly decreased",
            Self::DecreasedSignificantly => "decreased significantly",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exposure today vs. yesterday, in percent of AUM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureReport {
    pub today_pct: f64,
    pub yesterday_pct: f64,
    /// `today_pct - yesterday_pct`, rounded to two decimals
    pub delta_pct: f64,
    pub trend: TrendLabel,
}

/// Compare two exposure fractions (0.12 means 12% of AUM)
///
/// Non-finite inputs, and inputs too large to express as percentages, are
/// rejected; values outside `[0, 1]` are reported as given.
pub fn compute_trend(today: f64, yesterday: f64) -> Result<ExposureReport> {
    if !today.is_finite() || !yesterday.is_finite() {
        return Err(BriefError::InvalidInput(format!(
            "exposure values must be finite numbers (today: {today}, yesterday: {yesterday})"
        )));
    }

    let today_pct = today * 100.0;
    let yesterday_pct = yesterday * 100.0;
    let delta_pct = round2(today_pct - yesterday_pct);

    if !today_pct.is_finite() || !yesterday_pct.is_finite() || !delta_pct.is_finite() {
        return Err(BriefError::InvalidInput(format!(
            "exposure values overflow when expressed as percentages (today: {today}, yesterday: {yesterday})"
        )));
    }

    Ok(ExposureReport {
        today_pct,
        yesterday_pct,
        delta_pct,
        trend: TrendLabel::classify(delta_pct),
    })
}

/// Round to two decimals on the exact binary value, normalising `-0.0`
///
/// `-11.995` is stored as `-11.99499..` and becomes `-11.99`.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let rounded = format!("{value:.2}").parse::<f64>().unwrap_or(value);
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// A single position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Holding name, prefixed by its category ("AsiaTech_TSM")
    pub name: String,
    /// Market value in portfolio currency
    pub value: f64,
}

impl Holding {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self { holdings }
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn total_value(&self) -> f64 {
        self.holdings.iter().map(|h| h.value).sum()
    }

    /// Fraction of total value held in names starting with `category_prefix`
    ///
    /// Matching is case-insensitive.
    pub fn exposure(&self, category_prefix: &str) -> Result<f64> {
        if let Some(bad) = self.holdings.iter().find(|h| !h.value.is_finite()) {
            return Err(BriefError::InvalidInput(format!(
                "holding {} has a non-finite value",
                bad.name
            )));
        }

        let total = self.total_value();
        if total <= 0.0 {
            return Err(BriefError::InvalidInput(
                "portfolio total value must be positive".to_string(),
            ));
        }

        let prefix = category_prefix.to_lowercase();
        let category: f64 = self
            .holdings
            .iter()
            .filter(|h| h.name.to_lowercase().starts_with(&prefix))
            .map(|h| h.value)
            .sum();

        Ok(category / total)
    }
}

/// Earnings surprise in percent: `(actual - estimate) / estimate * 100`
pub fn earnings_surprise(actual: f64, estimate: f64) -> Result<f64> {
    if !actual.is_finite() || !estimate.is_finite() {
        return Err(BriefError::InvalidInput(
            "EPS values must be finite numbers".to_string(),
        ));
    }
    if estimate == 0.0 {
        return Err(BriefError::InvalidInput(
            "EPS estimate of zero has no defined surprise".to_string(),
        ));
    }

    Ok(round2((actual - estimate) / estimate * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(TrendLabel::classify(2.00), TrendLabel::SlightlyIncreased);
        assert_eq!(TrendLabel::classify(2.01), TrendLabel::IncreasedSignificantly);
        assert_eq!(TrendLabel::classify(0.01), TrendLabel::SlightlyIncreased);
        assert_eq!(TrendLabel::classify(0.0), TrendLabel::RemainedSteady);
        assert_eq!(TrendLabel::classify(-0.01), TrendLabel::SlightlyDecreased);
        assert_eq!(TrendLabel::classify(-2.00), TrendLabel::SlightlyDecreased);
        assert_eq!(TrendLabel::classify(-2.01), TrendLabel::DecreasedSignificantly);
    }

    #[test]
    fn test_trend_two_points_up_is_slight() {
        let report = compute_trend(0.12, 0.10).unwrap();
        assert_eq!(report.delta_pct, 2.0);
        assert_eq!(report.trend, TrendLabel::SlightlyIncreased);
        assert_eq!(report.trend.to_string(), "slightly increased");
        assert_eq!(round2(report.today_pct), 12.0);
        assert_eq!(round2(report.yesterday_pct), 10.0);
    }

    #[test]
    fn test_trend_just_over_two_points() {
        let report = compute_trend(0.1201, 0.10).unwrap();
        assert_eq!(report.delta_pct, 2.01);
        assert_eq!(report.trend, TrendLabel::IncreasedSignificantly);

        let report = compute_trend(0.10, 0.1201).unwrap();
        assert_eq!(report.delta_pct, -2.01);
        assert_eq!(report.trend, TrendLabel::DecreasedSignificantly);
    }

    #[test]
    fn test_trend_down_and_steady() {
        let report = compute_trend(0.10, 0.12).unwrap();
        assert_eq!(report.delta_pct, -2.0);
        assert_eq!(report.trend, TrendLabel::SlightlyDecreased);

        let report = compute_trend(0.15, 0.15).unwrap();
        assert_eq!(report.delta_pct, 0.0);
        assert!(report.delta_pct.is_sign_positive());
        assert_eq!(report.trend, TrendLabel::RemainedSteady);

        // below a hundredth of a point rounds to steady
        let report = compute_trend(0.150_000_1, 0.15).unwrap();
        assert_eq!(report.trend, TrendLabel::RemainedSteady);
    }

    #[test]
    fn test_trend_rejects_non_finite() {
        assert!(matches!(
            compute_trend(f64::NAN, 0.1),
            Err(BriefError::InvalidInput(_))
        ));
        assert!(compute_trend(0.1, f64::INFINITY).is_err());
        // out-of-range fractions are accepted as given
        assert!(compute_trend(1.5, -0.2).is_ok());
    }

    #[test]
    fn test_trend_rejects_percentage_overflow() {
        assert!(matches!(
            compute_trend(1e307, 0.0),
            Err(BriefError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_trend(1e306, -1e306),
            Err(BriefError::InvalidInput(_))
        ));
        assert!(compute_trend(1e300, 0.0).is_ok());
    }

    #[test]
    fn test_round2_uses_exact_binary_value() {
        // 0.005 - 12.0 is stored just above -11.995
        assert_eq!(compute_trend(0.00005, 0.12).unwrap().delta_pct, -11.99);
        assert_eq!(round2(12.346), 12.35);
        assert_eq!(round2(-0.001), 0.0);
        assert!(round2(-0.001).is_sign_positive());
    }

    #[test]
    fn test_trend_is_pure() {
        assert_eq!(compute_trend(0.22, 0.18).unwrap(), compute_trend(0.22, 0.18).unwrap());
    }

    #[test]
    fn test_portfolio_exposure() {
        let portfolio = Portfolio::new(vec![
            Holding::new("AsiaTech_TSM", 60.0),
            Holding::new("asiatech_samsung", 40.0),
            Holding::new("US_Bonds", 300.0),
        ]);

        assert_eq!(portfolio.total_value(), 400.0);
        assert_eq!(portfolio.exposure("AsiaTech").unwrap(), 0.25);
        assert_eq!(portfolio.exposure("Europe").unwrap(), 0.0);
    }

    #[test]
    fn test_portfolio_exposure_rejects_bad_totals() {
        assert!(Portfolio::default().exposure("AsiaTech").is_err());
        assert!(
            Portfolio::new(vec![Holding::new("AsiaTech_TSM", f64::NAN)])
                .exposure("AsiaTech")
                .is_err()
        );
    }

    #[test]
    fn test_earnings_surprise() {
        assert_eq!(earnings_surprise(1.10, 1.00).unwrap(), 10.0);
        assert_eq!(earnings_surprise(0.90, 1.00).unwrap(), -10.0);
        assert_eq!(earnings_surprise(-0.5, -1.0).unwrap(), -50.0);
        assert!(earnings_surprise(1.0, 0.0).is_err());
        assert!(earnings_surprise(f64::NAN, 1.0).is_err());
    }
}
