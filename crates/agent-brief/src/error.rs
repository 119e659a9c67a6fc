//! Error types for the morning brief pipeline

use agent_llm::LLMError;
use agent_utils::ConfigError;
use thiserror::Error;

/// Errors raised while building or answering a brief request
#[derive(Debug, Error)]
pub enum BriefError {
    /// Startup configuration is unusable (bad settings, corrupt or mismatched index)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A request value was rejected before any work happened
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The retrieval step could not run
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// An external collaborator (embeddings, language model, scraper) failed
    #[error("{service} unavailable: {reason}")]
    ExternalService { service: String, reason: String },

    /// Market data for a ticker could not be loaded
    #[error("Market data unavailable for {symbol}: {reason}")]
    MarketData { symbol: String, reason: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Coarse classification used for logging and the inbound error response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    InvalidInput,
    Retrieval,
    ExternalService,
}

impl BriefError {
    /// Shorthand for an [`BriefError::ExternalService`] failure
    pub fn external(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExternalService {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::Io(_) | Self::Template(_) => ErrorKind::Configuration,
            Self::InvalidInput(_) | Self::Json(_) => ErrorKind::InvalidInput,
            Self::Retrieval(_) => ErrorKind::Retrieval,
            Self::ExternalService { .. } | Self::MarketData { .. } | Self::Network(_) => {
                ErrorKind::ExternalService
            }
        }
    }

    /// Whether a request can still produce a (degraded) brief after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Retrieval | ErrorKind::ExternalService
        )
    }
}

/// Result type alias for brief operations
pub type Result<T> = std::result::Result<T, BriefError>;

impl From<LLMError> for BriefError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::ConfigurationError(msg) => BriefError::Configuration(msg),
            other => BriefError::external("language model", other),
        }
    }
}

impl From<ConfigError> for BriefError {
    fn from(err: ConfigError) -> Self {
        BriefError::Configuration(err.to_string())
    }
}
