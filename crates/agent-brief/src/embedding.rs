//! Text embedding providers
//!
//! - **HashedEmbedding**: deterministic hashed bag-of-words, runs offline
//! - **ApiEmbedding**: any OpenAI-compatible `/embeddings` endpoint
//!
//! Both guarantee one vector per input text, in input order, each of
//! [`EmbeddingProvider::dimensions`] length.

use crate::error::{BriefError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Turns texts into fixed-length vectors
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encode a batch of texts; output order matches input order
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every produced vector
    fn dimensions(&self) -> usize;

    /// Model identifier, persisted next to the vectors it produced
    fn name(&self) -> &str;

    /// Encode a single text
    async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(BriefError::external(
                self.name().to_string(),
                format!("expected 1 embedding, got {}", vectors.len()),
            ));
        }
        Ok(vectors.swap_remove(0))
    }
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "by", "for", "from", "in", "is", "it", "of", "on", "or",
    "the", "to", "was", "were", "with",
];

/// Hashed bag-of-words embedding
///
/// Each lowercase word is hashed (FNV-1a) into a bucket with a signed weight,
/// then the vector is L2-normalised. Texts sharing words end up close; it is
/// lexical, not semantic.
#[derive(Debug, Clone)]
pub struct HashedEmbedding {
    dimensions: usize,
    model: String,
}

impl HashedEmbedding {
    pub const MODEL: &'static str = "hashed-bow";

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            model: Self::MODEL.to_string(),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];

        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .filter(|w| !STOPWORDS.contains(&w.as_str()));

        for word in words {
            let hash = fnv1a(word.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedding {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible embedding endpoint
pub struct ApiEmbedding {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl ApiEmbedding {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            dimensions,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.api_base.trim_end_matches('/'))
    }

    fn service(&self) -> String {
        format!("embedding provider {}", self.model)
    }

    /// Put vectors back in input order and check their shape
    fn ordered_vectors(&self, mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(BriefError::external(
                self.service(),
                format!("expected {expected} embeddings, got {}", data.len()),
            ));
        }

        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(BriefError::external(
                self.service(),
                "response indices do not cover the input",
            ));
        }

        if let Some(bad) = data.iter().find(|d| d.embedding.len() != self.dimensions) {
            return Err(BriefError::Configuration(format!(
                "{} returned {}-dimensional vectors, configured for {}",
                self.model,
                bad.embedding.len(),
                self.dimensions
            )));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for ApiEmbedding {
    #[instrument(skip(self, texts), fields(model = %self.model, batch = texts.len()))]
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(self.endpoint()).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BriefError::external(self.service(), e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BriefError::external(
                self.service(),
                format!("HTTP {status}: {body}"),
            ));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| BriefError::external(self.service(), format!("bad response: {e}")))?;

        debug!(vectors = parsed.data.len(), "received embeddings");
        self.ordered_vectors(parsed.data, texts.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_hashed_is_deterministic_and_normalised() {
        let provider = HashedEmbedding::new(64);
        let texts = vec!["TSMC reported strong earnings".to_string(); 2];
        let vectors = provider.encode(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(vectors[0].len(), 64);
        let norm = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashed_shared_words_are_closer() {
        let provider = HashedEmbedding::new(384);
        let query = provider.encode_one("Asia tech earnings").await.unwrap();
        let related = provider.encode_one("TSMC earnings beat in Asia").await.unwrap();
        let unrelated = provider.encode_one("Oil futures slid overnight").await.unwrap();

        assert!(distance(&query, &related) < distance(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_hashed_blank_text_is_zero_vector() {
        let provider = HashedEmbedding::new(8);
        let vector = provider.encode_one("  the  ").await.unwrap();
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    struct SilentEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SilentEmbedder {
        async fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    #[tokio::test]
    async fn test_encode_one_rejects_wrong_count() {
        let err = SilentEmbedder.encode_one("anything").await.unwrap_err();
        assert!(matches!(err, BriefError::ExternalService { .. }));
    }

    #[test]
    fn test_api_vectors_are_reordered() {
        let provider = ApiEmbedding::new(
            "http://localhost:1234/v1/",
            None,
            "test-embed",
            2,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:1234/v1/embeddings");

        let data = vec![
            EmbeddingData { index: 1, embedding: vec![0.0, 1.0] },
            EmbeddingData { index: 0, embedding: vec![1.0, 0.0] },
        ];
        let vectors = provider.ordered_vectors(data, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_api_rejects_bad_shapes() {
        let provider =
            ApiEmbedding::new("http://localhost:1234/v1", None, "test-embed", 2, Duration::from_secs(5))
                .unwrap();

        let short = vec![EmbeddingData { index: 0, embedding: vec![1.0, 0.0] }];
        assert!(matches!(
            provider.ordered_vectors(short, 2),
            Err(BriefError::ExternalService { .. })
        ));

        let wrong_dims = vec![EmbeddingData { index: 0, embedding: vec![1.0, 0.0, 0.0] }];
        assert!(matches!(
            provider.ordered_vectors(wrong_dims, 1),
            Err(BriefError::Configuration(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let input = vec!["Asia tech".to_string()];
        let body = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &input,
        })
        .unwrap();
        assert_eq!(body["model"], "text-embedding-3-small");
        assert_eq!(body["input"][0], "Asia tech");
    }

    #[tokio::test]
    #[ignore = "requires OPENAI_API_KEY and network access"]
    async fn test_openai_embeddings_live() {
        let key = std::env::var("OPENAI_API_KEY").ok();
        let provider = ApiEmbedding::new(
            "https://api.openai.com/v1",
            key,
            "text-embedding-3-small",
            1536,
            Duration::from_secs(30),
        )
        .unwrap();
        let vectors = provider
            .encode(&["Asia tech stocks surged".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0].len(), 1536);
    }
}
