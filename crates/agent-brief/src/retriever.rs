//! Query-to-documents retrieval

use crate::embedding::EmbeddingProvider;
use crate::error::{BriefError, Result};
use crate::knowledge::KnowledgeBase;
use crate::store::Document;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Documents retrieved per query unless configured otherwise
pub const DEFAULT_TOP_K: usize = 3;

/// A retrieved document and its distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
    pub document: Document,
    pub distance: f32,
}

/// Embeds a query and maps its nearest vectors back to documents
#[derive(Clone)]
pub struct Retriever {
    knowledge: Arc<KnowledgeBase>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(knowledge: Arc<KnowledgeBase>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            knowledge,
            embedder,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Up to `k` documents, nearest first
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self
            .search(query, k)
            .await?
            .into_iter()
            .map(|ranked| ranked.document)
            .collect())
    }

    /// Like [`Retriever::retrieve`] but keeps the distances
    ///
    /// Fails with [`BriefError::Retrieval`] when there is no index or the
    /// embedder fails. Hits pointing outside the store are dropped.
    #[instrument(skip(self, query))]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RankedDocument>> {
        let Some(index) = self.knowledge.index() else {
            return Err(BriefError::Retrieval(
                "vector index has not been built (document store is empty)".to_string(),
            ));
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .encode_one(query)
            .await
            .map_err(|e| BriefError::Retrieval(format!("failed to embed query: {e}")))?;

        let hits = index
            .search(&query_vector, k)
            .map_err(|e| BriefError::Retrieval(e.to_string()))?;

        let store = self.knowledge.store();
        let mut ranked = Vec::with_capacity(hits.len());
        // Guard against a store and index that disagree on length
        for hit in hits {
            match store.get(hit.index) {
                Some(document) => ranked.push(RankedDocument {
                    document: document.clone(),
                    distance: hit.distance,
                }),
                None => warn!(
                    position = hit.index,
                    documents = store.len(),
                    "dropping search hit outside the document store"
                ),
            }
        }

        debug!(retrieved = ranked.len(), "retrieval complete");
        Ok(ranked)
    }
}
