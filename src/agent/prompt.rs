//! System prompts and template builders.
//!
//! Prompts define the behavior of the research agent, the answer composer
//! and the query expander. Builders format retrieved passages into the
//! context block and the per-search summaries the agent reads.

use std::fmt::Write;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::Passage;

/// System prompt for the multi-hop research agent.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are an expert maintenance technician assistant with access to a knowledge base of technical maintenance manuals.

## Your Mission
Help users with maintenance questions by searching the documentation and giving accurate, actionable answers.

## Instructions

1. **Search first.** Before answering a maintenance question, use the search_maintenance_docs tool to find relevant information.

2. **Follow references.** If search results mention:
   - "See Table X" or "Refer to Table X"
   - "See Page X" or "Refer to Page X"
   - "Note X" or "See Note X"
   - "Section X" or "Chapter X"

   perform another search for that referenced content. Do not guess what the reference contains.

3. **Multi-hop reasoning.** Complex questions often need several searches, for example:
   - First: find the maintenance schedule
   - Second: find the referenced lubrication specification
   - Third: find the procedure details

4. **When to stop searching:**
   - All referenced information has been found
   - You are about to repeat a search you already ran
   - You have enough information for a complete answer

5. **Answer format:**
   - Give clear, step-by-step instructions where applicable
   - Cite sources (document name and page number)
   - Say so when information is incomplete or contradictory
   - Use technical terminology accurately

6. **Language:** Always respond in English, whatever the language of the documents.

## Example

User: "At 300 operating hours, do I need to lubricate the components?"

1. Search for "300 hours maintenance schedule"
2. Find: "Lubrication: As appropriate (Note 4)"
3. Note 4 is needed
4. Search for "Note 4 lubrication interval"
5. Find: "Table 5-10: J1 axis = 24,000 Hr, Shaft = Every 2,000km movement"
6. Answer with all details

Incomplete information leads to incorrect maintenance, which can damage equipment or cause safety hazards."#;

/// System prompt for grounded answer generation. `{context}` is replaced
/// by the formatted passages.
pub const ANSWER_SYSTEM_PROMPT: &str = r"You are an expert industrial maintenance technician assistant. Help technicians resolve faults using ONLY the information in the provided technical documents.

Always respond in English, regardless of the language of the question.

RULES:
1. Answer only from the documents in the context.
2. If the information is not in the documents, say: I could not find this information in the available manuals.
3. Cite the source: document name and page number when possible.
4. Give clear step-by-step instructions as a numbered list.
5. Use precise but understandable technical terminology.
6. Highlight safety procedures whenever the question touches on them.

RESPONSE FORMAT:
- Start with a brief summary of the solution
- List the steps in order
- Call out safety warnings
- Cite sources at the end

DOCUMENT CONTEXT:
{context}

Answer the technician's question professionally and precisely in English.";

/// System prompt for query expansion. The question is sent as the user turn.
pub const EXPANSION_PROMPT: &str = r#"You are a query expansion specialist for a technical maintenance documentation system.

Given a user's question, generate 2-3 alternative search queries that would help find relevant information in maintenance manuals.

Consider:
- Technical synonyms ("replace" → "substitute", "change", "swap")
- Related concepts ("lubrication" → "oil", "grease", "lubricant intervals")
- Specific technical terms used in manuals
- Inverse queries that might find related procedures

Return ONLY the alternative queries, one per line, without numbering or explanations.
Keep each query under 15 words.
Do not repeat the original question."#;

/// Text returned to the agent when a search finds nothing.
pub const NO_RESULTS: &str = "No relevant documents found for this query.";

/// Separator between context sections.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/hoprag/prompts";

/// Placeholder replaced by the context block in the answer prompt.
const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Generator role a prompt template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    /// Multi-hop research agent.
    Agent,
    /// Answer composer.
    Answer,
    /// Query expander.
    Expansion,
}

impl PromptRole {
    /// Every role, in scaffolding order.
    pub const ALL: [Self; 3] = [Self::Agent, Self::Answer, Self::Expansion];

    /// Template filename inside a prompt directory.
    #[must_use]
    pub const fn filename(self) -> &'static str {
        match self {
            Self::Agent => "agent.md",
            Self::Answer => "answer.md",
            Self::Expansion => "expansion.md",
        }
    }

    /// Compiled-in template.
    #[must_use]
    pub const fn default_text(self) -> &'static str {
        match self {
            Self::Agent => AGENT_SYSTEM_PROMPT,
            Self::Answer => ANSWER_SYSTEM_PROMPT,
            Self::Expansion => EXPANSION_PROMPT,
        }
    }
}

/// Prompts for every generator role.
///
/// Loaded from template files when available, falling back to compiled-in
/// defaults. Use [`PromptSet::load`] to resolve the prompt directory from
/// CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for the research agent.
    pub agent: String,
    /// System prompt template for answer generation.
    pub answer: String,
    /// Prompt template for query expansion.
    pub expansion: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PromptSet {
    /// Loads prompts, overriding defaults with files from the prompt directory.
    ///
    /// The directory is the first of: `prompt_dir`, `HOPRAG_PROMPT_DIR`,
    /// `~/.config/hoprag/prompts/`. Missing or blank files keep the
    /// compiled-in prompt; unreadable files are logged and skipped.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let mut set = Self::defaults();
        let Some(dir) = Self::resolve_dir(prompt_dir) else {
            return set;
        };
        for role in PromptRole::ALL {
            let path = dir.join(role.filename());
            match std::fs::read_to_string(&path) {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(path = %path.display(), "prompt override loaded");
                    *set.slot(role) = text;
                }
                Ok(_) => debug!(path = %path.display(), "blank prompt file ignored"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "prompt file unreadable"),
            }
        }
        set
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            agent: AGENT_SYSTEM_PROMPT.to_string(),
            answer: ANSWER_SYSTEM_PROMPT.to_string(),
            expansion: EXPANSION_PROMPT.to_string(),
        }
    }

    /// Prompt text for a role.
    #[must_use]
    pub fn get(&self, role: PromptRole) -> &str {
        match role {
            PromptRole::Agent => &self.agent,
            PromptRole::Answer => &self.answer,
            PromptRole::Expansion => &self.expansion,
        }
    }

    fn slot(&mut self, role: PromptRole) -> &mut String {
        match role {
            PromptRole::Agent => &mut self.agent,
            PromptRole::Answer => &mut self.answer,
            PromptRole::Expansion => &mut self.expansion,
        }
    }

    /// Prompt directory in effect for an optional explicit choice.
    #[must_use]
    pub fn resolve_dir(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOPRAG_PROMPT_DIR").map(PathBuf::from))
            .or_else(Self::default_dir)
    }

    /// Scaffolds the compiled-in templates into `dir` for editing.
    ///
    /// Files that already exist are left alone. Returns the paths written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or a new file cannot be written.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for role in PromptRole::ALL {
            let path = dir.join(role.filename());
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };
            std::io::Write::write_all(&mut file, role.default_text().as_bytes())?;
            written.push(path);
        }
        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Renders the answer system prompt around a context block.
    ///
    /// A template without the `{context}` placeholder gets the context
    /// appended, so the composer always sees the evidence.
    #[must_use]
    pub fn answer_system_prompt(&self, context: &str) -> String {
        if self.answer.contains(CONTEXT_PLACEHOLDER) {
            self.answer.replace(CONTEXT_PLACEHOLDER, context)
        } else {
            format!("{}\n\nDOCUMENT CONTEXT:\n{context}", self.answer.trim_end())
        }
    }
}

/// Formats passages into the numbered context block for answer generation.
///
/// Each section is headed `[Document i] Source: s, Page: p` with chapter and
/// section appended when present.
#[must_use]
pub fn build_context_block(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut header = format!(
                "[Document {}] Source: {}, Page: {}",
                i + 1,
                p.source,
                p.page_label()
            );
            if let Some(chapter) = p.chapter.as_deref().filter(|c| !c.is_empty()) {
                let _ = write!(header, ", Chapter: {chapter}");
            }
            if let Some(section) = p.section.as_deref().filter(|s| !s.is_empty()) {
                let _ = write!(header, ", Section: {section}");
            }
            format!("{header}\n{}", p.content)
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Formats one search result for the agent transcript.
#[must_use]
pub fn format_search_summary(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return NO_RESULTS.to_string();
    }
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "[Document {}]\nSource: {} (Page {})\nContent:\n{}\n---",
                i + 1,
                p.source,
                p.page_label(),
                p.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn passages() -> Vec<Passage> {
        vec![
            Passage::new("Change oil every 500 h.", "manual.pdf")
                .with_page(12)
                .with_chapter("5 Maintenance")
                .with_section("5.2 Lubrication"),
            Passage::new("Torque to 45 Nm.", "tables.pdf"),
        ]
    }

    #[test]
    fn test_build_context_block() {
        let block = build_context_block(&passages());
        assert_eq!(
            block,
            "[Document 1] Source: manual.pdf, Page: 12, Chapter: 5 Maintenance, Section: 5.2 Lubrication\n\
             Change oil every 500 h.\n\n---\n\n\
             [Document 2] Source: tables.pdf, Page: N/A\nTorque to 45 Nm."
        );
        assert!(build_context_block(&[]).is_empty());
    }

    #[test]
    fn test_format_search_summary() {
        let summary = format_search_summary(&passages());
        assert!(summary.starts_with("[Document 1]\nSource: manual.pdf (Page 12)\nContent:\n"));
        assert!(summary.contains("[Document 2]\nSource: tables.pdf (Page N/A)"));
        assert_eq!(format_search_summary(&[]), NO_RESULTS);
    }

    #[test]
    fn test_answer_prompt_substitutes_context() {
        let prompts = PromptSet::defaults();
        let rendered = prompts.answer_system_prompt("CTX");
        assert!(rendered.contains("DOCUMENT CONTEXT:\nCTX"));
        assert!(!rendered.contains("{context}"));
    }

    #[test]
    fn test_load_prefers_files_and_falls_back() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        std::fs::write(dir.path().join(PromptRole::Agent.filename()), "custom agent")
            .unwrap_or_else(|e| panic!("write: {e}"));
        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.agent, "custom agent");
        assert_eq!(prompts.answer, ANSWER_SYSTEM_PROMPT);
        assert_eq!(prompts.expansion, EXPANSION_PROMPT);
    }

    #[test]
    fn test_blank_override_keeps_default() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        std::fs::write(dir.path().join(PromptRole::Expansion.filename()), "  \n")
            .unwrap_or_else(|e| panic!("write: {e}"));
        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.get(PromptRole::Expansion), EXPANSION_PROMPT);
    }

    #[test]
    fn test_answer_template_without_placeholder_gets_context() {
        let prompts = PromptSet {
            answer: "Answer briefly.\n".to_string(),
            ..PromptSet::defaults()
        };
        assert_eq!(
            prompts.answer_system_prompt("CTX"),
            "Answer briefly.\n\nDOCUMENT CONTEXT:\nCTX"
        );
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        std::fs::write(dir.path().join(PromptRole::Answer.filename()), "mine")
            .unwrap_or_else(|e| panic!("write: {e}"));
        let written =
            PromptSet::write_defaults(dir.path()).unwrap_or_else(|e| panic!("write_defaults: {e}"));
        assert_eq!(
            written,
            vec![
                dir.path().join(PromptRole::Agent.filename()),
                dir.path().join(PromptRole::Expansion.filename()),
            ]
        );
        let kept = std::fs::read_to_string(dir.path().join(PromptRole::Answer.filename())).unwrap_or_default();
        assert_eq!(kept, "mine");
    }
}
