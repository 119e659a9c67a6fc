//! Corpus ingestion: read news files and cut them into retrievable chunks

use crate::error::{BriefError, Result};
use crate::store::DocumentStore;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read every `*.txt` file in `dir`, ordered by file name
pub async fn load_txt_documents(dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        BriefError::Configuration(format!("cannot read news directory {}: {e}", dir.display()))
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_txt = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if is_txt && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut texts = Vec::with_capacity(paths.len());
    for path in &paths {
        debug!(path = %path.display(), "reading news file");
        texts.push(tokio::fs::read_to_string(path).await?);
    }

    info!(files = texts.len(), dir = %dir.display(), "loaded news files");
    Ok(texts)
}

/// Split text into chunks of at most `max_words` words
///
/// Sentences are kept whole when they fit; a sentence longer than
/// `max_words` is split on word boundaries.
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for sentence in sentences(text) {
        let words: Vec<&str> = sentence.split_whitespace().collect();

        if !current.is_empty() && current.len() + words.len() > max_words {
            chunks.push(current.join(" "));
            current.clear();
        }

        for piece in words.chunks(max_words) {
            if piece.len() == max_words {
                if !current.is_empty() {
                    chunks.push(current.join(" "));
                    current.clear();
                }
                chunks.push(piece.join(" "));
            } else {
                current.extend_from_slice(piece);
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

/// Build a store from raw texts, chunking each one
pub fn build_store(texts: &[String], max_words: usize) -> DocumentStore {
    DocumentStore::from_texts(texts.iter().flat_map(|text| chunk_text(text, max_words)))
}

/// Sentence spans: a terminator followed by whitespace (or the end) closes a sentence
///
/// "3.5%" does not end a sentence, "rose 3.5%. Then" does.
fn sentences(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let closes = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|(_, next)| next.is_whitespace()),
            _ => false,
        };
        if closes {
            let end = i + c.len_utf8();
            let span = text[start..end].trim();
            if !span.is_empty() {
                spans.push(span);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        spans.push(tail);
    }
    spans
}
