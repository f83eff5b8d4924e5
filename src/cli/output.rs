//! Output rendering for CLI commands.

use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::agent::RagResponse;
use crate::core::{Passage, shorten};
use crate::retrieval::IndexStats;

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything unrecognised is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON with a trailing newline.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let mut out = serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}"));
        out.push('\n');
        out
    }
}

/// Renders an answer with its citations.
#[must_use]
pub fn format_answer(response: &RagResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(response),
        OutputFormat::Text => {
            let mut out = response.answer.trim_end().to_string();
            out.push('\n');
            out.push_str(&format_sources_footer(response));
            out
        }
    }
}

/// Source list and processing summary shown below a text answer.
#[must_use]
pub fn format_sources_footer(response: &RagResponse) -> String {
    let mut out = String::new();
    if !response.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, source) in response.sources.iter().enumerate() {
            let page = source
                .page
                .map_or_else(|| "N/A".to_string(), |p| p.to_string());
            let _ = write!(out, "  [{}] {} (page {page})", i + 1, source.source);
            if let Some(section) = &source.section {
                let _ = write!(out, " - {section}");
            }
            out.push('\n');
        }
    }
    let meta = &response.metadata;
    let _ = writeln!(
        out,
        "\n---\nMode: {} | Iterations: {} | Searches: {} | Model: {}",
        meta.mode,
        meta.iterations,
        meta.queries_executed.len(),
        response.model_used
    );
    out
}

#[derive(Serialize)]
struct SearchHit<'a> {
    rank: usize,
    source: &'a str,
    page: Option<u32>,
    chunk_index: Option<u32>,
    score: Option<f64>,
    preview: String,
}

/// Renders raw search results.
#[must_use]
pub fn format_search_results(
    results: &[Passage],
    query: &str,
    preview_len: usize,
    format: OutputFormat,
) -> String {
    let hits: Vec<SearchHit<'_>> = results
        .iter()
        .enumerate()
        .map(|(i, p)| SearchHit {
            rank: i + 1,
            source: &p.source,
            page: p.page,
            chunk_index: p.chunk_index,
            score: p.relevance_score,
            preview: shorten(&p.content.replace('\n', " "), preview_len),
        })
        .collect();

    match format {
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "query": query,
            "count": hits.len(),
            "results": hits,
        })),
        OutputFormat::Text => {
            if hits.is_empty() {
                return format!("No results found for query: \"{query}\"\n");
            }
            let mut out = String::new();
            let _ = writeln!(out, "Search results for \"{query}\" ({} results):\n", hits.len());
            let _ = writeln!(out, "{:<5} {:<30} {:<6} {:<10}", "Rank", "Source", "Page", "Score");
            out.push_str(&"-".repeat(54));
            out.push('\n');
            for hit in &hits {
                let page = hit.page.map_or_else(|| "-".to_string(), |p| p.to_string());
                let score = hit.score.map_or_else(|| "-".to_string(), |s| format!("{s:.4}"));
                let _ = writeln!(
                    out,
                    "{:<5} {:<30} {:<6} {:<10}",
                    hit.rank,
                    shorten(hit.source, 30),
                    page,
                    score
                );
                let _ = writeln!(out, "  {}", hit.preview);
            }
            out
        }
    }
}

/// Renders index statistics.
#[must_use]
pub fn format_stats(stats: &IndexStats, db_path: &std::path::Path, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "db_path": db_path.display().to_string(),
            "passages": stats.passages,
            "sources": stats.sources,
        })),
        OutputFormat::Text => format!(
            "Index: {}\nPassages: {}\nSources: {}\n",
            db_path.display(),
            stats.passages,
            stats.sources
        ),
    }
}
