//! Document store + vector index pair, built together and persisted together

use crate::embedding::EmbeddingProvider;
use crate::error::{BriefError, Result};
use crate::index::VectorIndex;
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// The retrievable corpus
///
/// When the store is non-empty the index holds exactly one vector per
/// document, in the same order. An empty store has no index.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    store: DocumentStore,
    index: Option<VectorIndex>,
    model: String,
}

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    model: String,
    dimensions: usize,
    documents: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl KnowledgeBase {
    /// A knowledge base with no documents and no index
    pub fn empty() -> Self {
        Self {
            store: DocumentStore::default(),
            index: None,
            model: String::new(),
        }
    }

    /// Embed every document once and index the vectors
    #[instrument(skip_all, fields(documents = store.len(), model = embedder.name()))]
    pub async fn build(store: DocumentStore, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let model = embedder.name().to_string();
        if store.is_empty() {
            info!("document store is empty, no index built");
            return Ok(Self {
                store,
                index: None,
                model,
            });
        }

        let vectors = embedder
            .encode(&store.contents())
            .await
            .map_err(|e| BriefError::Configuration(format!("failed to embed corpus: {e}")))?;

        let index = VectorIndex::build(vectors)?;
        let knowledge = Self::from_parts(store, Some(index), model)?;
        info!(dimensions = knowledge.dimensions(), "built vector index");
        Ok(knowledge)
    }

    /// Pair an existing store and index, checking they line up
    pub fn from_parts(
        store: DocumentStore,
        index: Option<VectorIndex>,
        model: impl Into<String>,
    ) -> Result<Self> {
        match &index {
            Some(index) if index.len() != store.len() => {
                return Err(BriefError::Configuration(format!(
                    "index holds {} vectors but the store has {} documents",
                    index.len(),
                    store.len()
                )));
            }
            None if !store.is_empty() => {
                return Err(BriefError::Configuration(format!(
                    "store has {} documents but no index",
                    store.len()
                )));
            }
            _ => {}
        }

        Ok(Self {
            store,
            index,
            model: model.into(),
        })
    }

    /// Pair a store and index without the length check
    #[cfg(test)]
    pub(crate) fn from_parts_unchecked(
        store: DocumentStore,
        index: VectorIndex,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            index: Some(index),
            model: model.into(),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// `None` when the store is empty
    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    /// Embedding model that produced the vectors
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.index.as_ref().map(VectorIndex::dimensions)
    }

    /// Reject an embedder whose vectors would not be comparable with ours
    pub fn ensure_compatible(&self, embedder: &dyn EmbeddingProvider) -> Result<()> {
        let Some(dimensions) = self.dimensions() else {
            return Ok(());
        };

        if dimensions != embedder.dimensions() {
            return Err(BriefError::Configuration(format!(
                "index was built with {dimensions}-dimensional vectors, embedder '{}' produces {}",
                embedder.name(),
                embedder.dimensions()
            )));
        }
        if !self.model.is_empty() && self.model != embedder.name() {
            return Err(BriefError::Configuration(format!(
                "index was built with embedding model '{}', configured model is '{}'",
                self.model,
                embedder.name()
            )));
        }
        Ok(())
    }

    /// Write the store and vectors as one JSON snapshot
    pub async fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            model: self.model.clone(),
            dimensions: self.dimensions().unwrap_or(0),
            documents: self.store.contents(),
            vectors: self
                .index
                .iter()
                .flat_map(VectorIndex::vectors)
                .map(<[f32]>::to_vec)
                .collect(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_vec(&snapshot)?).await?;

        info!(path = %path.display(), documents = self.store.len(), "saved knowledge base");
        Ok(())
    }

    /// Load a snapshot written by [`KnowledgeBase::save`]
    ///
    /// Any inconsistency between documents and vectors is a configuration
    /// error: the pair must be rebuilt.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            BriefError::Configuration(format!("cannot read index {}: {e}", path.display()))
        })?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            BriefError::Configuration(format!("corrupt index {}: {e}", path.display()))
        })?;

        if snapshot.documents.len() != snapshot.vectors.len() {
            return Err(BriefError::Configuration(format!(
                "index {} holds {} vectors for {} documents",
                path.display(),
                snapshot.vectors.len(),
                snapshot.documents.len()
            )));
        }

        let store = DocumentStore::from_texts(snapshot.documents);
        if store.len() != snapshot.vectors.len() {
            return Err(BriefError::Configuration(format!(
                "index {} contains blank documents",
                path.display()
            )));
        }

        let index = if snapshot.vectors.is_empty() {
            None
        } else {
            let index = VectorIndex::build(snapshot.vectors)?;
            if index.dimensions() != snapshot.dimensions {
                return Err(BriefError::Configuration(format!(
                    "index {} declares {} dimensions but stores {}",
                    path.display(),
                    snapshot.dimensions,
                    index.dimensions()
                )));
            }
            Some(index)
        };

        let knowledge = Self::from_parts(store, index, snapshot.model)?;
        info!(path = %path.display(), documents = knowledge.store.len(), "loaded knowledge base");
        Ok(knowledge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashedEmbedding, MockEmbeddingProvider};

    #[tokio::test]
    async fn test_build_pairs_store_and_index() {
        let embedder = HashedEmbedding::new(32);
        let knowledge = KnowledgeBase::build(DocumentStore::sample(), &embedder)
            .await
            .unwrap();

        assert_eq!(knowledge.store().len(), 3);
        assert_eq!(knowledge.index().map(VectorIndex::len), Some(3));
        assert_eq!(knowledge.model(), "hashed-bow");
        assert!(knowledge.ensure_compatible(&embedder).is_ok());
        assert!(knowledge.ensure_compatible(&HashedEmbedding::new(16)).is_err());
    }

    #[tokio::test]
    async fn test_empty_store_has_no_index() {
        let knowledge = KnowledgeBase::build(DocumentStore::default(), &HashedEmbedding::new(8))
            .await
            .unwrap();
        assert!(knowledge.index().is_none());
        assert!(KnowledgeBase::empty().index().is_none());
    }

    #[tokio::test]
    async fn test_build_fails_when_embedder_fails() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_name().return_const("broken".to_string());
        embedder
            .expect_encode()
            .returning(|_| Err(BriefError::external("embedding provider", "connection refused")));

        let err = KnowledgeBase::build(DocumentStore::sample(), &embedder)
            .await
            .unwrap_err();
        assert!(matches!(err, BriefError::Configuration(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_build_rejects_short_vector_batch() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_name().return_const("short".to_string());
        embedder
            .expect_encode()
            .returning(|_| Ok(vec![vec![1.0, 0.0]]));

        let err = KnowledgeBase::build(DocumentStore::sample(), &embedder)
            .await
            .unwrap_err();
        assert!(matches!(err, BriefError::Configuration(_)));
    }

    #[test]
    fn test_from_parts_checks_population() {
        let index = VectorIndex::build(vec![vec![1.0], vec![2.0]]).unwrap();
        assert!(KnowledgeBase::from_parts(DocumentStore::sample(), Some(index), "m").is_err());
        assert!(KnowledgeBase::from_parts(DocumentStore::sample(), None, "m").is_err());
        assert!(KnowledgeBase::from_parts(DocumentStore::default(), None, "m").is_ok());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("brief.index.json");

        let embedder = HashedEmbedding::new(16);
        let built = KnowledgeBase::build(DocumentStore::sample(), &embedder)
            .await
            .unwrap();
        built.save(&path).await.unwrap();

        let loaded = KnowledgeBase::load(&path).await.unwrap();
        assert_eq!(loaded.store(), built.store());
        assert_eq!(loaded.index(), built.index());
        assert_eq!(loaded.model(), "hashed-bow");
    }

    #[tokio::test]
    async fn test_load_rejects_mismatched_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        let snapshot = serde_json::json!({
            "model": "hashed-bow",
            "dimensions": 2,
            "documents": ["one", "two"],
            "vectors": [[0.0, 1.0]]
        });
        tokio::fs::write(&path, snapshot.to_string()).await.unwrap();

        let err = KnowledgeBase::load(&path).await.unwrap_err();
        assert!(matches!(err, BriefError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(matches!(
            KnowledgeBase::load(&path).await,
            Err(BriefError::Configuration(_))
        ));
        assert!(matches!(
            KnowledgeBase::load(&dir.path().join("missing.json")).await,
            Err(BriefError::Configuration(_))
        ));
    }
}
