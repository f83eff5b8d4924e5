//! Shared data shapes for retrieved evidence.
//!
//! These types live outside the agent module so the retriever, the CLI and
//! the HTTP layer can use them without pulling in orchestration code.

pub mod evidence;
pub mod passage;

pub use evidence::{CONTENT_KEY_LEN, EvidenceKey, EvidenceStore, ExecutedQueries};
pub use passage::{DedupKey, PREVIEW_LEN, Passage, SourceRecord, shorten, truncate_graphemes};
