//! Retrieved evidence and its user-facing source record.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Maximum characters of passage content kept for prompts and the trust layer.
pub const PREVIEW_LEN: usize = 1500;

/// A retrieved unit of document text with its source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text.
    pub content: String,
    /// Document identifier (usually a file name).
    pub source: String,
    /// Page number within the source document.
    #[serde(default)]
    pub page: Option<u32>,
    /// Chapter heading, when the indexer recorded one.
    #[serde(default)]
    pub chapter: Option<String>,
    /// Section heading, when the indexer recorded one.
    #[serde(default)]
    pub section: Option<String>,
    /// Position of this chunk within the source's chunk sequence.
    #[serde(default)]
    pub chunk_index: Option<u32>,
    /// Number of chunks the source was split into.
    #[serde(default)]
    pub total_chunks: Option<u32>,
    /// Retriever score (higher is better), when computed.
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

impl Passage {
    /// Creates a passage with no positional metadata.
    #[must_use]
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            page: None,
            chapter: None,
            section: None,
            chunk_index: None,
            total_chunks: None,
            relevance_score: None,
        }
    }

    /// Sets the page number.
    #[must_use]
    pub const fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the chunk position.
    #[must_use]
    pub const fn with_chunk(mut self, index: u32, total: u32) -> Self {
        self.chunk_index = Some(index);
        self.total_chunks = Some(total);
        self
    }

    /// Sets the chapter heading.
    #[must_use]
    pub fn with_chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = Some(chapter.into());
        self
    }

    /// Sets the section heading.
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Sets the retriever score.
    #[must_use]
    pub const fn with_score(mut self, score: f64) -> Self {
        self.relevance_score = Some(score);
        self
    }

    /// Returns the `(source, page, chunk_index)` identity of this passage.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            source: self.source.clone(),
            page: self.page,
            chunk_index: self.chunk_index,
        }
    }

    /// Returns a copy whose content is cut to at most `max_chars` characters.
    ///
    /// Cuts on grapheme boundaries so combined characters are never split.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> Self {
        Self {
            content: truncate_graphemes(&self.content, max_chars),
            ..self.clone()
        }
    }

    /// Page number rendered for prompt headers (`N/A` when unknown).
    #[must_use]
    pub fn page_label(&self) -> String {
        self.page.map_or_else(|| "N/A".to_string(), |p| p.to_string())
    }
}

/// Identity of a passage: same source, page and chunk position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// Document identifier.
    pub source: String,
    /// Page number.
    pub page: Option<u32>,
    /// Chunk position.
    pub chunk_index: Option<u32>,
}

/// User-facing source entry returned alongside an answer.
///
/// Every field is always serialized; absent values are `null` so callers
/// can tell "not computed" apart from a missing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Content preview (at most [`PREVIEW_LEN`] characters).
    pub content: String,
    /// Document identifier.
    pub source: String,
    /// Page number.
    pub page: Option<u32>,
    /// Chapter heading.
    pub chapter: Option<String>,
    /// Section heading.
    pub section: Option<String>,
    /// Chunk position.
    pub chunk_index: Option<u32>,
    /// Total chunks of the source.
    pub total_chunks: Option<u32>,
    /// Retriever score.
    pub relevance_score: Option<f64>,
}

impl From<&Passage> for SourceRecord {
    fn from(passage: &Passage) -> Self {
        Self {
            content: truncate_graphemes(&passage.content, PREVIEW_LEN),
            source: passage.source.clone(),
            page: passage.page,
            chapter: passage.chapter.clone(),
            section: passage.section.clone(),
            chunk_index: passage.chunk_index,
            total_chunks: passage.total_chunks,
            relevance_score: passage.relevance_score,
        }
    }
}

/// Truncates `s` to at most `max` grapheme clusters.
#[must_use]
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    match s.grapheme_indices(true).nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

/// Shortens `s` to `max` characters, appending `...` when cut.
#[must_use]
pub fn shorten(s: &str, max: usize) -> String {
    let cut = truncate_graphemes(s, max);
    if cut.len() < s.len() {
        format!("{cut}...")
    } else {
        cut
    }
}
