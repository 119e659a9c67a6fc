//! Ordered document store
//!
//! A document's id is its position in the store. The vector index is built
//! over the same sequence, so search result `i` always names document `i`.

use serde::{Deserialize, Serialize};

/// A unit of retrievable text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: usize,
    pub content: String,
}

/// Immutable, ordered collection of documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    /// Build a store from texts, assigning ids in order
    ///
    /// Blank texts are skipped so ids stay dense.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents = texts
            .into_iter()
            .map(Into::into)
            .filter(|text: &String| !text.trim().is_empty())
            .enumerate()
            .map(|(id, content)| Document { id, content })
            .collect();

        Self { documents }
    }

    /// The three-headline corpus used when nothing else is configured
    pub fn sample() -> Self {
        Self::from_texts([
            "Asia tech stocks surged due to favorable policy changes.",
            "TSMC reported strong earnings driven by AI chip demand.",
            "Weak export numbers pulled Chinese tech ETFs lower.",
        ])
    }

    pub fn get(&self, id: usize) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    /// Texts in id order, as fed to the embedder
    pub fn contents(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.content.clone()).collect()
    }
}
