//! Per-request evidence accumulator and executed-query ledger.
//!
//! Both types are created fresh for every request and owned by it; nothing
//! here is shared across requests.

use std::collections::HashSet;

use super::passage::{DedupKey, Passage, truncate_graphemes};

/// Characters of content used as the identity of a passage with no source.
pub const CONTENT_KEY_LEN: usize = 500;

/// Identity used when merging passages.
///
/// Passages that name a source and a position in it (page or chunk) are
/// identified by their [`DedupKey`]. Anything less is raw text and falls
/// back to a content prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EvidenceKey {
    /// `(source, page, chunk_index)` identity.
    Position(DedupKey),
    /// First [`CONTENT_KEY_LEN`] characters of content.
    ContentPrefix(String),
}

impl EvidenceKey {
    /// Derives the merge identity of a passage.
    #[must_use]
    pub fn of(passage: &Passage) -> Self {
        let unplaced = passage.page.is_none() && passage.chunk_index.is_none();
        if passage.source.is_empty() || unplaced {
            Self::ContentPrefix(truncate_graphemes(&passage.content, CONTENT_KEY_LEN))
        } else {
            Self::Position(passage.dedup_key())
        }
    }
}

/// Ordered, deduplicated set of passages gathered during one request.
#[derive(Debug, Clone, Default)]
pub struct EvidenceStore {
    passages: Vec<Passage>,
    seen: HashSet<EvidenceKey>,
}

impl EvidenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a passage unless an equal key was already recorded.
    ///
    /// Returns `true` when the passage was kept.
    pub fn insert(&mut self, passage: Passage) -> bool {
        if self.seen.insert(EvidenceKey::of(&passage)) {
            self.passages.push(passage);
            true
        } else {
            false
        }
    }

    /// Adds every passage in order, returning how many were kept.
    pub fn extend(&mut self, passages: impl IntoIterator<Item = Passage>) -> usize {
        passages
            .into_iter()
            .map(|p| usize::from(self.insert(p)))
            .sum()
    }

    /// Returns `true` if the key of `passage` is already recorded.
    #[must_use]
    pub fn contains(&self, passage: &Passage) -> bool {
        self.seen.contains(&EvidenceKey::of(passage))
    }

    /// Number of passages kept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Returns `true` if nothing was kept.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passages in first-seen order.
    #[must_use]
    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// Consumes the store, returning passages in first-seen order.
    #[must_use]
    pub fn into_passages(self) -> Vec<Passage> {
        self.passages
    }
}

/// Ordered, duplicate-free list of search queries issued in one request.
///
/// Membership is exact string equality: case and whitespace variants are
/// distinct queries.
#[derive(Debug, Clone, Default)]
pub struct ExecutedQueries {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl ExecutedQueries {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `query` was already issued.
    #[must_use]
    pub fn contains(&self, query: &str) -> bool {
        self.seen.contains(query)
    }

    /// Records `query`, returning `false` if it was already present.
    pub fn record(&mut self, query: &str) -> bool {
        if self.seen.insert(query.to_string()) {
            self.order.push(query.to_string());
            true
        } else {
            false
        }
    }

    /// Number of distinct queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing was issued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queries in issue order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    /// Consumes the ledger, returning queries in issue order.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}
