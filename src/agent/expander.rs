//! Query expansion.
//!
//! One question becomes up to four search queries: the question itself,
//! then at most [`MAX_ALTERNATIVES`] alternatives written by the generator.
//! Expansion never fails a request; any generator error degrades to the
//! question alone.

use tracing::{debug, warn};

use super::provider::LlmProvider;
use super::traits::Agent;

/// Most generated alternatives kept per question.
pub const MAX_ALTERNATIVES: usize = 3;

/// Agent that writes alternative phrasings of a question.
#[derive(Debug, Clone)]
pub struct ExpanderAgent {
    model: String,
    system_prompt: String,
    temperature: f32,
}

impl ExpanderAgent {
    /// Creates an expander agent.
    #[must_use]
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            temperature,
        }
    }

    /// Expands `question` into search queries, original first.
    ///
    /// Never fails: generator errors are logged and the question alone is
    /// returned.
    pub async fn expand(&self, provider: &dyn LlmProvider, question: &str) -> Vec<String> {
        match self
            .execute(provider, &format!("Original question: {question}"))
            .await
        {
            Ok(response) => {
                let queries = parse_alternatives(question, &response.content);
                debug!(count = queries.len(), "query expansion complete");
                queries
            }
            Err(e) => {
                warn!(error = %e, "query expansion failed, using the question only");
                vec![question.to_string()]
            }
        }
    }
}

impl Agent for ExpanderAgent {
    fn name(&self) -> &'static str {
        "expander"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        256
    }
}

/// Builds the query list from generator output, one alternative per line.
///
/// Lines are trimmed and blank lines dropped. Lines equal to the question
/// or to an earlier alternative are skipped before the cap is applied.
#[must_use]
pub fn parse_alternatives(question: &str, output: &str) -> Vec<String> {
    let mut queries = vec![question.to_string()];
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if queries.len() > MAX_ALTERNATIVES {
            break;
        }
        if !queries.iter().any(|q| q == line) {
            queries.push(line.to_string());
        }
    }
    queries
}
