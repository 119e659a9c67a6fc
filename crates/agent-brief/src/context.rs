//! Startup wiring
//!
//! [`BriefContext`] is built once and shared by every request. It owns the
//! read-only knowledge base and the collaborators the pipeline talks to.

use crate::api::{EarningsScraper, EarningsSource, MarketData, YahooMarketData};
use crate::composer::BriefComposer;
use crate::config::{BriefConfig, EmbeddingBackend, EmbeddingSettings, LlmBackend, LlmSettings};
use crate::embedding::{ApiEmbedding, EmbeddingProvider, HashedEmbedding};
use crate::error::{BriefError, Result};
use crate::exposure::Portfolio;
use crate::ingest::{build_store, load_txt_documents};
use crate::knowledge::KnowledgeBase;
use crate::language::LanguageAgent;
use crate::retriever::Retriever;
use crate::sentiment::{LexiconScorer, SentimentClassifier};
use crate::store::DocumentStore;
use agent_llm::LLMProvider;
use agent_llm::providers::{GeminiConfig, GeminiProvider, OpenAIConfig, OpenAIProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct BriefContext {
    config: Arc<BriefConfig>,
    knowledge: Arc<KnowledgeBase>,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Retriever,
    composer: BriefComposer,
    sentiment: SentimentClassifier,
    language: Option<LanguageAgent>,
    market: Option<Arc<dyn MarketData>>,
    earnings: Option<Arc<dyn EarningsSource>>,
}

impl BriefContext {
    /// Start assembling a context around an already built knowledge base
    pub fn builder(
        config: BriefConfig,
        knowledge: KnowledgeBase,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> BriefContextBuilder {
        BriefContextBuilder {
            config,
            knowledge,
            embedder,
            sentiment: None,
            language: None,
            market: None,
            earnings: None,
        }
    }

    /// Full startup: embedder, knowledge base, language model and market sources
    ///
    /// Every failure here is a [`BriefError::Configuration`] problem and should
    /// stop the process.
    pub async fn from_config(config: BriefConfig) -> Result<Self> {
        config.validate()?;

        let embedder = embedder_from_settings(&config.embedding, config.request_timeout)?;
        let knowledge = load_or_build_knowledge(&config, embedder.as_ref()).await?;

        let language = match &config.llm {
            Some(settings) if config.paraphrase => {
                let provider = llm_from_settings(settings, config.request_timeout)?;
                info!(backend = ?settings.backend, model = %settings.model, "language model enabled");
                Some(LanguageAgent::new(provider, settings)?)
            }
            _ => None,
        };

        let market: Arc<dyn MarketData> = Arc::new(YahooMarketData::new(config.cache_ttl_quotes));
        let earnings: Arc<dyn EarningsSource> = Arc::new(EarningsScraper::new(
            config.earnings_url.clone(),
            config.earnings_limit,
            config.scrape_rate_per_minute,
            config.cache_ttl_earnings,
            config.request_timeout,
        )?);

        let mut builder = Self::builder(config, knowledge, embedder)
            .market_data(market)
            .earnings(earnings);
        if let Some(agent) = language {
            builder = builder.language(agent);
        }
        Ok(builder.build())
    }

    pub fn config(&self) -> &BriefConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn composer(&self) -> &BriefComposer {
        &self.composer
    }

    pub fn sentiment(&self) -> &SentimentClassifier {
        &self.sentiment
    }

    pub fn language(&self) -> Option<&LanguageAgent> {
        self.language.as_ref()
    }

    pub fn market(&self) -> Option<&Arc<dyn MarketData>> {
        self.market.as_ref()
    }

    pub fn earnings(&self) -> Option<&Arc<dyn EarningsSource>> {
        self.earnings.as_ref()
    }

    /// Configured holdings as a portfolio
    pub fn portfolio(&self) -> Portfolio {
        Portfolio::new(self.config.holdings.clone())
    }
}

pub struct BriefContextBuilder {
    config: BriefConfig,
    knowledge: KnowledgeBase,
    embedder: Arc<dyn EmbeddingProvider>,
    sentiment: Option<SentimentClassifier>,
    language: Option<LanguageAgent>,
    market: Option<Arc<dyn MarketData>>,
    earnings: Option<Arc<dyn EarningsSource>>,
}

impl BriefContextBuilder {
    pub fn sentiment(mut self, classifier: SentimentClassifier) -> Self {
        self.sentiment = Some(classifier);
        self
    }

    pub fn language(mut self, agent: LanguageAgent) -> Self {
        self.language = Some(agent);
        self
    }

    pub fn market_data(mut self, market: Arc<dyn MarketData>) -> Self {
        self.market = Some(market);
        self
    }

    pub fn earnings(mut self, earnings: Arc<dyn EarningsSource>) -> Self {
        self.earnings = Some(earnings);
        self
    }

    pub fn build(self) -> BriefContext {
        let knowledge = Arc::new(self.knowledge);
        let retriever = Retriever::new(Arc::clone(&knowledge), Arc::clone(&self.embedder));
        let composer = BriefComposer::new(self.config.allocation_label.clone());
        let sentiment = self.sentiment.unwrap_or_else(|| {
            SentimentClassifier::new(Arc::new(LexiconScorer::default()), self.config.sentiment)
        });

        BriefContext {
            config: Arc::new(self.config),
            knowledge,
            embedder: self.embedder,
            retriever,
            composer,
            sentiment,
            language: self.language,
            market: self.market,
            earnings: self.earnings,
        }
    }
}

/// Embedding provider described by `settings`
pub fn embedder_from_settings(
    settings: &EmbeddingSettings,
    timeout: Duration,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.backend {
        EmbeddingBackend::Hashed => Ok(Arc::new(HashedEmbedding::new(settings.dimensions))),
        EmbeddingBackend::Api => Ok(Arc::new(ApiEmbedding::new(
            settings.api_base.clone(),
            settings.api_key.clone(),
            settings.model.clone(),
            settings.dimensions,
            timeout,
        )?)),
    }
}

/// Language model provider described by `settings`
pub fn llm_from_settings(settings: &LlmSettings, timeout: Duration) -> Result<Arc<dyn LLMProvider>> {
    let api_key = settings.api_key.clone().ok_or_else(|| {
        BriefError::Configuration(format!(
            "language model backend {:?} needs an API key",
            settings.backend
        ))
    })?;
    let timeout_secs = timeout.as_secs().max(1);

    let provider: Arc<dyn LLMProvider> = match settings.backend {
        LlmBackend::OpenAI => {
            let mut config = OpenAIConfig::new(api_key).with_timeout(timeout_secs);
            if let Some(base) = &settings.api_base {
                config = config.with_api_base(base.clone());
            }
            Arc::new(OpenAIProvider::with_config(config)?)
        }
        LlmBackend::Gemini => {
            let mut config = GeminiConfig::new(api_key).with_timeout(timeout_secs);
            if let Some(base) = &settings.api_base {
                config = config.with_api_base(base.clone());
            }
            Arc::new(GeminiProvider::with_config(config)?)
        }
    };
    Ok(provider)
}

/// Embed the configured news directory, or the sample corpus when none is set
pub async fn build_knowledge(
    config: &BriefConfig,
    embedder: &dyn EmbeddingProvider,
) -> Result<KnowledgeBase> {
    let store = match &config.news_dir {
        Some(dir) => {
            let texts = load_txt_documents(dir).await?;
            let store = build_store(&texts, config.chunk_words);
            info!(dir = %dir.display(), files = texts.len(), chunks = store.len(), "ingested news");
            store
        }
        None => {
            warn!("no news directory configured, using the sample corpus");
            DocumentStore::sample()
        }
    };

    KnowledgeBase::build(store, embedder).await
}

/// Load the persisted snapshot if there is one, otherwise build in memory
///
/// A snapshot that does not match the configured embedder is rejected rather
/// than rebuilt; run `build-index` to replace it.
pub async fn load_or_build_knowledge(
    config: &BriefConfig,
    embedder: &dyn EmbeddingProvider,
) -> Result<KnowledgeBase> {
    let path = &config.index_path;
    if tokio::fs::try_exists(path).await? {
        let knowledge = KnowledgeBase::load(path).await?;
        knowledge.ensure_compatible(embedder)?;
        info!(path = %path.display(), documents = knowledge.store().len(), "loaded knowledge base");
        return Ok(knowledge);
    }

    info!(path = %path.display(), "no persisted index, building in memory");
    build_knowledge(config, embedder).await
}
