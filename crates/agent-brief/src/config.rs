//! Configuration for the morning brief service

use crate::error::{BriefError, Result};
use crate::exposure::Holding;
use crate::sentiment::SentimentThresholds;
use agent_utils::{env_list, env_or, env_parse};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default location of the persisted document store + vector index snapshot
pub const DEFAULT_INDEX_PATH: &str = "data/brief.index.json";

/// Yahoo Finance earnings calendar
pub const DEFAULT_EARNINGS_URL: &str = "https://finance.yahoo.com/calendar/earnings";

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Which embedding backend turns text into vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic hashed bag-of-words, runs offline
    #[default]
    Hashed,
    /// OpenAI-compatible `/embeddings` endpoint
    Api,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hashed" | "hash" | "local" => Ok(Self::Hashed),
            "api" | "openai" => Ok(Self::Api),
            other => Err(format!("unknown embedding backend '{other}'")),
        }
    }
}

/// Embedding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub dimensions: usize,
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashed,
            model: "hashed-bow".to_string(),
            dimensions: 384,
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            api_key: None,
        }
    }
}

/// Hosted language model used to paraphrase the brief
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// OpenAI chat completions or any server speaking that protocol
    OpenAI,
    /// Google Gemini `generateContent`
    Gemini,
}

impl LlmBackend {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash-latest",
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(format!("unknown language model backend '{other}'")),
        }
    }
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub backend: LlmBackend,
    pub model: String,
    /// Overrides the provider's default base URL
    pub api_base: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    /// What the paraphrased brief should emphasise
    pub focus: String,
}

impl LlmSettings {
    pub fn new(backend: LlmBackend) -> Self {
        Self {
            backend,
            model: backend.default_model().to_string(),
            api_base: None,
            api_key: None,
            max_tokens: 256,
            temperature: Some(0.3),
            focus: "risk exposure and earnings surprises".to_string(),
        }
    }
}

/// Configuration for the brief pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefConfig {
    /// Persisted knowledge base snapshot
    pub index_path: PathBuf,

    /// Directory of `*.txt` news files used when building the index
    pub news_dir: Option<PathBuf>,

    /// Maximum words per ingested chunk
    pub chunk_words: usize,

    /// Documents retrieved per query
    pub top_k: usize,

    /// Human label of the tracked allocation ("Asia tech")
    pub allocation_label: String,

    /// Holding name prefix that belongs to the tracked allocation
    pub exposure_category: String,

    /// Portfolio holdings used when exposure is derived instead of supplied
    pub holdings: Vec<Holding>,

    pub sentiment: SentimentThresholds,

    pub embedding: EmbeddingSettings,

    /// Paraphrasing is skipped when no language model is configured
    pub llm: Option<LlmSettings>,

    /// Let the language model rewrite the composed brief
    pub paraphrase: bool,

    /// Watch-list for market snapshots
    pub tickers: Vec<String>,

    pub earnings_url: String,

    /// Maximum earnings rows read from the calendar page
    pub earnings_limit: usize,

    /// Requests per minute allowed against the earnings calendar
    pub scrape_rate_per_minute: u32,

    /// Cache TTL for price snapshots
    pub cache_ttl_quotes: Duration,

    /// Cache TTL for scraped earnings
    pub cache_ttl_earnings: Duration,

    /// Timeout for outbound HTTP requests
    pub request_timeout: Duration,
}

impl Default for BriefConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            news_dir: None,
            chunk_words: 120,
            top_k: 3,
            allocation_label: "Asia tech".to_string(),
            exposure_category: "AsiaTech".to_string(),
            holdings: Vec::new(),
            sentiment: SentimentThresholds::default(),
            embedding: EmbeddingSettings::default(),
            llm: None,
            paraphrase: true,
            tickers: ["TSM", "005930.KS", "AAPL", "GOOGL"]
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            earnings_url: DEFAULT_EARNINGS_URL.to_string(),
            earnings_limit: 5,
            scrape_rate_per_minute: 6,
            cache_ttl_quotes: Duration::from_secs(60),      // 1 minute
            cache_ttl_earnings: Duration::from_secs(900),   // 15 minutes
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl BriefConfig {
    /// Create a new configuration builder
    pub fn builder() -> BriefConfigBuilder {
        BriefConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(BriefError::Configuration(
                "top_k must be greater than 0".to_string(),
            ));
        }

        if self.chunk_words == 0 {
            return Err(BriefError::Configuration(
                "chunk_words must be greater than 0".to_string(),
            ));
        }

        self.sentiment.validate()?;

        if self.embedding.dimensions == 0 {
            return Err(BriefError::Configuration(
                "embedding dimensions must be greater than 0".to_string(),
            ));
        }

        if self.embedding.backend == EmbeddingBackend::Api {
            validate_url("embedding api_base", &self.embedding.api_base)?;
        }

        if let Some(llm) = &self.llm {
            if let Some(base) = &llm.api_base {
                validate_url("llm api_base", base)?;
            }
            if llm.max_tokens == 0 {
                return Err(BriefError::Configuration(
                    "llm max_tokens must be greater than 0".to_string(),
                ));
            }
        }

        validate_url("earnings_url", &self.earnings_url)?;

        if self.earnings_limit == 0 || self.scrape_rate_per_minute == 0 {
            return Err(BriefError::Configuration(
                "earnings_limit and scrape_rate_per_minute must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| BriefError::Configuration(format!("{field} '{value}' is not a valid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(BriefError::Configuration(format!(
            "{field} must use http or https, got '{scheme}'"
        ))),
    }
}

/// Builder for [`BriefConfig`]
#[derive(Debug, Default)]
pub struct BriefConfigBuilder {
    config: BriefConfig,
}

impl BriefConfigBuilder {
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    pub fn news_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.news_dir = Some(dir.into());
        self
    }

    pub fn chunk_words(mut self, words: usize) -> Self {
        self.config.chunk_words = words;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn allocation_label(mut self, label: impl Into<String>) -> Self {
        self.config.allocation_label = label.into();
        self
    }

    pub fn exposure_category(mut self, prefix: impl Into<String>) -> Self {
        self.config.exposure_category = prefix.into();
        self
    }

    pub fn holdings(mut self, holdings: Vec<Holding>) -> Self {
        self.config.holdings = holdings;
        self
    }

    pub fn sentiment(mut self, thresholds: SentimentThresholds) -> Self {
        self.config.sentiment = thresholds;
        self
    }

    pub fn embedding(mut self, settings: EmbeddingSettings) -> Self {
        self.config.embedding = settings;
        self
    }

    pub fn llm(mut self, settings: LlmSettings) -> Self {
        self.config.llm = Some(settings);
        self
    }

    pub fn paraphrase(mut self, enabled: bool) -> Self {
        self.config.paraphrase = enabled;
        self
    }

    pub fn tickers(mut self, tickers: Vec<String>) -> Self {
        self.config.tickers = tickers;
        self
    }

    pub fn earnings_url(mut self, url: impl Into<String>) -> Self {
        self.config.earnings_url = url.into();
        self
    }

    pub fn earnings_limit(mut self, limit: usize) -> Self {
        self.config.earnings_limit = limit;
        self
    }

    pub fn cache_ttl_quotes(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl_quotes = ttl;
        self
    }

    pub fn cache_ttl_earnings(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl_earnings = ttl;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Overlay settings from `BRIEF_*` environment variables
    ///
    /// The embedding API key falls back to `OPENAI_API_KEY`. Setting
    /// `BRIEF_LLM=openai|gemini` enables paraphrasing with the matching
    /// provider key (`OPENAI_API_KEY` / `GEMINI_API_KEY`).
    pub fn with_env(mut self) -> Result<Self> {
        let config = &mut self.config;

        if let Some(path) = env_parse::<PathBuf>("BRIEF_INDEX_PATH")? {
            config.index_path = path;
        }
        if let Some(dir) = env_parse::<PathBuf>("BRIEF_NEWS_DIR")? {
            config.news_dir = Some(dir);
        }
        if let Some(words) = env_parse("BRIEF_CHUNK_WORDS")? {
            config.chunk_words = words;
        }
        if let Some(k) = env_parse("BRIEF_TOP_K")? {
            config.top_k = k;
        }
        config.allocation_label = env_or("BRIEF_ALLOCATION_LABEL", &config.allocation_label);
        config.exposure_category = env_or("BRIEF_EXPOSURE_CATEGORY", &config.exposure_category);
        if let Some(positive) = env_parse("BRIEF_SENTIMENT_POSITIVE")? {
            config.sentiment.positive = positive;
        }
        if let Some(negative) = env_parse("BRIEF_SENTIMENT_NEGATIVE")? {
            config.sentiment.negative = negative;
        }
        if let Some(tickers) = env_list("BRIEF_TICKERS") {
            config.tickers = tickers;
        }
        config.earnings_url = env_or("BRIEF_EARNINGS_URL", &config.earnings_url);
        if let Some(limit) = env_parse("BRIEF_EARNINGS_LIMIT")? {
            config.earnings_limit = limit;
        }
        if let Some(secs) = env_parse("BRIEF_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        let embedding = &mut config.embedding;
        if let Some(backend) = env_parse::<EmbeddingBackend>("BRIEF_EMBEDDING")? {
            embedding.backend = backend;
            if backend == EmbeddingBackend::Api {
                embedding.model = "text-embedding-3-small".to_string();
                embedding.dimensions = 1536;
            }
        }
        embedding.model = env_or("BRIEF_EMBEDDING_MODEL", &embedding.model);
        if let Some(dimensions) = env_parse("BRIEF_EMBEDDING_DIMENSIONS")? {
            embedding.dimensions = dimensions;
        }
        embedding.api_base = env_or("BRIEF_EMBEDDING_API_BASE", &embedding.api_base);
        if let Ok(key) = std::env::var("BRIEF_EMBEDDING_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            embedding.api_key = Some(key);
        }

        if let Some(backend) = env_parse::<LlmBackend>("BRIEF_LLM")? {
            let mut llm = LlmSettings::new(backend);
            llm.model = env_or("BRIEF_LLM_MODEL", &llm.model);
            llm.api_base = std::env::var("BRIEF_LLM_API_BASE").ok();
            llm.api_key = match backend {
                LlmBackend::OpenAI => std::env::var("OPENAI_API_KEY").ok(),
                LlmBackend::Gemini => std::env::var("GEMINI_API_KEY").ok(),
            };
            llm.focus = env_or("BRIEF_LLM_FOCUS", &llm.focus);
            config.llm = Some(llm);
        }
        if let Some(enabled) = env_parse("BRIEF_PARAPHRASE")? {
            config.paraphrase = enabled;
        }

        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<BriefConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
