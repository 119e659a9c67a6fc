//! Request handling
//!
//! A request is `{query, asia_tech_today, asia_tech_yesterday}`. Invalid
//! input fails the request; retrieval, market data, earnings and language
//! model problems only add warnings.

use crate::api::summarize;
use crate::context::BriefContext;
use crate::error::{BriefError, Result};
use crate::exposure::{ExposureReport, compute_trend};
use crate::sentiment::Sentiment;
use crate::store::Document;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Inbound request; exposures are fractions of AUM (`0.12` is 12%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefRequest {
    pub query: String,
    pub asia_tech_today: f64,
    pub asia_tech_yesterday: f64,
}

impl BriefRequest {
    pub fn new(query: impl Into<String>, today: f64, yesterday: f64) -> Self {
        Self {
            query: query.into(),
            asia_tech_today: today,
            asia_tech_yesterday: yesterday,
        }
    }
}

/// Wire response: `{"result": ..., "warnings": [...]}` or `{"error": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BriefResponse {
    Success {
        result: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Failure {
        error: String,
    },
}

impl BriefResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<Brief>> for BriefResponse {
    fn from(outcome: Result<Brief>) -> Self {
        match outcome {
            Ok(brief) => Self::Success {
                result: brief.text,
                warnings: brief.warnings,
            },
            Err(e) => Self::Failure {
                error: e.to_string(),
            },
        }
    }
}

/// Everything produced while answering one request
#[derive(Debug, Clone, Serialize)]
pub struct Brief {
    pub text: String,
    pub report: ExposureReport,
    pub documents: Vec<Document>,
    pub sentiment: Option<Sentiment>,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct BriefService {
    context: Arc<BriefContext>,
}

impl BriefService {
    pub fn new(context: Arc<BriefContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &BriefContext {
        &self.context
    }

    /// Core flow: trend, retrieval, sentiment, composition, optional paraphrase
    pub async fn analyze(&self, request: &BriefRequest) -> BriefResponse {
        let span = info_span!("brief_request", request_id = %Uuid::new_v4(), kind = "analyze");
        self.try_analyze(request).instrument(span).await.into()
    }

    /// Core flow plus market snapshots and earnings as paraphrase context
    pub async fn morning_brief(&self, request: &BriefRequest) -> BriefResponse {
        let span = info_span!("brief_request", request_id = %Uuid::new_v4(), kind = "morning_brief");
        self.try_morning_brief(request).instrument(span).await.into()
    }

    /// Decode one JSON request line and answer it as one JSON line
    pub async fn handle_line(&self, line: &str, full: bool) -> String {
        let response = match serde_json::from_str::<BriefRequest>(line) {
            Ok(request) if full => self.morning_brief(&request).await,
            Ok(request) => self.analyze(&request).await,
            Err(e) => {
                debug!(error = %e, "rejecting malformed request");
                BriefResponse::Failure {
                    error: BriefError::InvalidInput(format!("malformed request: {e}")).to_string(),
                }
            }
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"error":"failed to encode response: {e}"}}"#)
        })
    }

    pub async fn try_analyze(&self, request: &BriefRequest) -> Result<Brief> {
        let mut brief = self.compose(request).await?;
        self.paraphrase(&mut brief).await;
        Ok(brief)
    }

    pub async fn try_morning_brief(&self, request: &BriefRequest) -> Result<Brief> {
        let mut brief = self.compose(request).await?;

        let mut extra = self.market_lines(&mut brief.warnings).await;
        if let Some(earnings) = self.earnings_line(&mut brief.warnings).await {
            extra.push(earnings);
        }

        if !extra.is_empty() {
            brief.text = format!("{}\n{}", brief.text, extra.join("\n"));
        }
        self.paraphrase(&mut brief).await;
        Ok(brief)
    }

    /// Locally composed brief, before any language model involvement
    async fn compose(&self, request: &BriefRequest) -> Result<Brief> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(BriefError::InvalidInput("query must not be empty".to_string()));
        }

        let report = compute_trend(request.asia_tech_today, request.asia_tech_yesterday)?;
        let mut warnings = Vec::new();

        let k = self.context.config().top_k;
        let documents = match self.context.retriever().retrieve(query, k).await {
            Ok(documents) => documents,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "retrieval unavailable, composing without documents");
                warnings.push(format!("retrieval unavailable: {e}"));
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let sentiment = if documents.is_empty() {
            None
        } else {
            let text: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
            Some(self.context.sentiment().classify(&text.join(" ")))
        };

        let text = self
            .context
            .composer()
            .compose(&report, &documents, sentiment.as_ref());

        info!(
            delta_pct = report.delta_pct,
            trend = %report.trend,
            documents = documents.len(),
            "composed brief"
        );

        Ok(Brief {
            text,
            report,
            documents,
            sentiment,
            warnings,
        })
    }

    async fn paraphrase(&self, brief: &mut Brief) {
        if !self.context.config().paraphrase {
            return;
        }
        let Some(agent) = self.context.language() else {
            return;
        };

        let outcome = agent.paraphrase_or_fallback(&brief.text).await;
        brief.text = outcome.text;
        brief.warnings.extend(outcome.warning);
    }

    async fn market_lines(&self, warnings: &mut Vec<String>) -> Vec<String> {
        let Some(market) = self.context.market() else {
            return Vec::new();
        };

        let tickers = &self.context.config().tickers;
        let snapshots = join_all(tickers.iter().map(|symbol| market.snapshot(symbol))).await;

        snapshots
            .into_iter()
            .zip(tickers)
            .filter_map(|(snapshot, symbol)| match snapshot {
                Ok(snapshot) => Some(snapshot.line()),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "skipping ticker");
                    warnings.push(e.to_string());
                    None
                }
            })
            .collect()
    }

    async fn earnings_line(&self, warnings: &mut Vec<String>) -> Option<String> {
        let earnings = self.context.earnings()?;
        match earnings.latest().await {
            Ok(surprises) => Some(summarize(&surprises)),
            Err(e) => {
                warn!(error = %e, "earnings calendar unavailable");
                warnings.push(e.to_string());
                None
            }
        }
    }
}
