//! Brief text assembly
//!
//! The brief has three newline-separated parts:
//!
//! 1. allocation and trend sentence
//! 2. regional sentiment sentence (only when sentiment is known)
//! 3. one `Relevant Info: ` line per retrieved document, in rank order

use crate::exposure::{ExposureReport, TrendLabel, round2};
use crate::sentiment::Sentiment;
use crate::store::Document;

/// Marker that starts every retrieved-document line
pub const RELEVANT_INFO_PREFIX: &str = "Relevant Info: ";

#[derive(Debug, Clone)]
pub struct BriefComposer {
    allocation_label: String,
}

impl Default for BriefComposer {
    fn default() -> Self {
        Self::new("Asia tech")
    }
}

impl BriefComposer {
    /// `allocation_label` names the tracked allocation ("Asia tech")
    pub fn new(allocation_label: impl Into<String>) -> Self {
        Self {
            allocation_label: allocation_label.into(),
        }
    }

    pub fn compose(
        &self,
        report: &ExposureReport,
        retrieved: &[Document],
        sentiment: Option<&Sentiment>,
    ) -> String {
        let mut lines = vec![self.allocation_sentence(report)];

        if let Some(sentiment) = sentiment {
            lines.push(format!(
                "Regional sentiment is {} due to {}.",
                sentiment.label, sentiment.reason
            ));
        }

        lines.extend(
            retrieved
                .iter()
                .map(|doc| format!("{RELEVANT_INFO_PREFIX}{}", doc.content)),
        );

        lines.join("\n")
    }

    fn allocation_sentence(&self, report: &ExposureReport) -> String {
        let direction = if report.delta_pct > 0.0 {
            "up from"
        } else if report.delta_pct < 0.0 {
            "down from"
        } else {
            "unchanged from"
        };

        let movement = match report.trend {
            TrendLabel::RemainedSteady => "The allocation has remained steady.".to_string(),
            trend => format!(
                "The allocation has {trend} by {}%.",
                format_pct(report.delta_pct.abs())
            ),
        };

        format!(
            "Your {} allocation is {}% of AUM, {direction} {}% yesterday. {movement}",
            self.allocation_label,
            format_pct(report.today_pct),
            format_pct(report.yesterday_pct),
        )
    }
}

/// Percentage rounded to two decimals; whole numbers keep one decimal ("10.0")
pub fn format_pct(value: f64) -> String {
    let rounded = round2(value);
    if rounded.fract() == 0.0 {
        format!("{rounded:.1}")
    } else {
        format!("{rounded}")
    }
}
