//! Morning market brief
//!
//! Turns a portfolio manager's question plus two exposure readings into a short
//! brief:
//!
//! - Nearest-neighbour retrieval over a small news corpus (document store,
//!   embedding provider, flat L2 vector index)
//! - Exposure delta and trend label for the tracked allocation
//! - Lexicon-based regional sentiment over the retrieved news
//! - Brief composition, optionally paraphrased by a hosted language model
//! - Market snapshots (Yahoo Finance) and scraped earnings surprises for the
//!   full morning brief
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_brief::{BriefConfig, BriefContext, BriefRequest, BriefService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BriefConfig::builder().with_env()?.build()?;
//!     let context = BriefContext::from_config(config).await?;
//!     let service = BriefService::new(Arc::new(context));
//!
//!     let request = BriefRequest::new("Asia tech earnings", 0.12, 0.10);
//!     println!("{:?}", service.analyze(&request).await);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod composer;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod exposure;
pub mod index;
pub mod ingest;
pub mod knowledge;
pub mod language;
pub mod retriever;
pub mod sentiment;
pub mod service;
pub mod store;

// Re-export main types for convenience
pub use composer::BriefComposer;
pub use config::{BriefConfig, EmbeddingBackend, LlmBackend};
pub use context::BriefContext;
pub use embedding::{ApiEmbedding, EmbeddingProvider, HashedEmbedding};
pub use error::{BriefError, ErrorKind, Result};
pub use exposure::{ExposureReport, Holding, Portfolio, TrendLabel, compute_trend};
pub use index::{SearchHit, VectorIndex};
pub use knowledge::KnowledgeBase;
pub use language::LanguageAgent;
pub use retriever::{RankedDocument, Retriever};
pub use sentiment::{Sentiment, SentimentClassifier, SentimentLabel, SentimentThresholds};
pub use service::{Brief, BriefRequest, BriefResponse, BriefService};
pub use store::{Document, DocumentStore};
