//! Regional sentiment classification over retrieved news text
//!
//! A [`PolarityScorer`] maps text to a score in `[-1, 1]` plus the words that
//! drove it; [`SentimentClassifier`] turns that into a label with fixed
//! thresholds.

use crate::error::{BriefError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Polarity above `positive` is positive, below `negative` is negative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentThresholds {
    pub positive: f64,
    pub negative: f64,
}

impl Default for SentimentThresholds {
    fn default() -> Self {
        Self {
            positive: 0.1,
            negative: -0.1,
        }
    }
}

impl SentimentThresholds {
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (-1.0..=1.0).contains(&v);
        if !in_range(self.positive) || !in_range(self.negative) || self.negative > self.positive {
            return Err(BriefError::Configuration(format!(
                "sentiment thresholds must satisfy -1 <= negative ({}) <= positive ({}) <= 1",
                self.negative, self.positive
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        })
    }
}

/// Classified sentiment with a short human-readable justification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub reason: String,
}

/// Raw scorer output
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polarity {
    /// Score in `[-1, 1]`
    pub score: f64,
    /// Words that contributed, in order of first appearance
    pub drivers: Vec<String>,
}

/// Text to polarity
pub trait PolarityScorer: Send + Sync {
    fn polarity(&self, text: &str) -> Polarity;
}

/// Finance-flavoured word list scorer
///
/// Each known word contributes its weight; a preceding negator flips and
/// halves it, a preceding intensifier scales it up. The score is the mean
/// contribution, clamped to `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    lexicon: HashMap<&'static str, f64>,
}

const LEXICON: &[(&str, f64)] = &[
    ("surged", 0.8),
    ("surge", 0.7),
    ("soared", 0.8),
    ("rally", 0.6),
    ("rallied", 0.6),
    ("gain", 0.5),
    ("gains", 0.5),
    ("gained", 0.5),
    ("rose", 0.5),
    ("rise", 0.4),
    ("higher", 0.4),
    ("strong", 0.6),
    ("stronger", 0.6),
    ("robust", 0.6),
    ("beat", 0.5),
    ("beats", 0.5),
    ("growth", 0.5),
    ("favorable", 0.6),
    ("upgrade", 0.5),
    ("record", 0.4),
    ("demand", 0.3),
    ("optimism", 0.6),
    ("boost", 0.5),
    ("outperform", 0.6),
    ("positive", 0.5),
    ("weak", -0.6),
    ("weaker", -0.6),
    ("fell", -0.5),
    ("fall", -0.4),
    ("drop", -0.5),
    ("dropped", -0.5),
    ("decline", -0.5),
    ("declined", -0.5),
    ("lower", -0.4),
    ("plunged", -0.8),
    ("slump", -0.7),
    ("selloff", -0.6),
    ("missed", -0.5),
    ("miss", -0.5),
    ("loss", -0.5),
    ("losses", -0.6),
    ("downgrade", -0.5),
    ("concerns", -0.4),
    ("fears", -0.6),
    ("tariffs", -0.4),
    ("risk", -0.3),
    ("volatile", -0.3),
    ("negative", -0.5),
];

const NEGATORS: &[&str] = &["not", "no", "never", "without", "didn't", "failed"];
const INTENSIFIERS: &[&str] = &["very", "highly", "sharply", "strongly", "significantly"];

impl Default for LexiconScorer {
    fn default() -> Self {
        Self {
            lexicon: LEXICON.iter().copied().collect(),
        }
    }
}

impl PolarityScorer for LexiconScorer {
    fn polarity(&self, text: &str) -> Polarity {
        let words: Vec<String> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase().replace('-', ""))
            .collect();

        let mut total = 0.0;
        let mut matched = 0_usize;
        let mut drivers: Vec<String> = Vec::new();

        for (i, word) in words.iter().enumerate() {
            let Some(&weight) = self.lexicon.get(word.as_str()) else {
                continue;
            };

            let previous = i.checked_sub(1).map(|p| words[p].as_str());
            let contribution = match previous {
                Some(p) if NEGATORS.contains(&p) => -0.5 * weight,
                Some(p) if INTENSIFIERS.contains(&p) => 1.3 * weight,
                _ => weight,
            };

            total += contribution;
            matched += 1;
            if !drivers.contains(word) {
                drivers.push(word.clone());
            }
        }

        let score = if matched == 0 {
            0.0
        } else {
            (total / matched as f64).clamp(-1.0, 1.0)
        };

        Polarity { score, drivers }
    }
}

/// Labels text using a scorer and thresholds
#[derive(Clone)]
pub struct SentimentClassifier {
    scorer: Arc<dyn PolarityScorer>,
    thresholds: SentimentThresholds,
}

const MAX_REASON_TERMS: usize = 3;

impl SentimentClassifier {
    pub fn new(scorer: Arc<dyn PolarityScorer>, thresholds: SentimentThresholds) -> Self {
        Self { scorer, thresholds }
    }

    /// Lexicon scorer with default thresholds
    pub fn lexicon() -> Self {
        Self::new(Arc::new(LexiconScorer::default()), SentimentThresholds::default())
    }

    pub fn thresholds(&self) -> SentimentThresholds {
        self.thresholds
    }

    pub fn classify(&self, text: &str) -> Sentiment {
        let polarity = self.scorer.polarity(text);

        let label = if polarity.score > self.thresholds.positive {
            SentimentLabel::Positive
        } else if polarity.score < self.thresholds.negative {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        Sentiment {
            label,
            reason: reason_from(&polarity.drivers),
        }
    }
}

fn reason_from(drivers: &[String]) -> String {
    let terms: Vec<&str> = drivers
        .iter()
        .take(MAX_REASON_TERMS)
        .map(String::as_str)
        .collect();

    match terms.as_slice() {
        [] => "mixed factors".to_string(),
        [only] => format!("mentions of {only}"),
        [init @ .., last] => format!("mentions of {} and {last}", init.join(", ")),
    }
}
