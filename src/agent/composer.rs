//! Grounded answer generation.
//!
//! The composer renders the evidence into the answer system prompt, adds
//! the caller's chat history and the question, and asks the generator for
//! an answer, either in one piece or token by token. Generator failures
//! propagate without retry.

use futures_util::StreamExt;
use tracing::debug;

use super::message::{ChatMessage, HistoryTurn, history_messages, user_message};
use super::progress::{ProgressEvent, ProgressSink};
use super::prompt::{PromptSet, build_context_block};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::{Passage, SourceRecord};
use crate::error::AgentError;

/// Agent that answers from a fixed context block.
#[derive(Debug, Clone)]
pub struct AnswerAgent {
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl Agent for AnswerAgent {
    fn name(&self) -> &'static str {
        "answer"
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
        self.max_tokens
    }
}

/// Builds and runs answer requests.
pub struct AnswerComposer<'a> {
    provider: &'a dyn LlmProvider,
    prompts: &'a PromptSet,
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for AnswerComposer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerComposer")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl<'a> AnswerComposer<'a> {
    /// Creates a composer.
    #[must_use]
    pub const fn new(
        provider: &'a dyn LlmProvider,
        prompts: &'a PromptSet,
        model: &'a str,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            prompts,
            model,
            temperature,
            max_tokens,
        }
    }

    fn agent(&self, passages: &[Passage]) -> AnswerAgent {
        AnswerAgent {
            model: self.model.to_string(),
            system_prompt: self
                .prompts
                .answer_system_prompt(&build_context_block(passages)),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    fn conversation(question: &str, history: &[HistoryTurn]) -> Vec<ChatMessage> {
        let mut messages = history_messages(history);
        messages.push(user_message(question));
        messages
    }

    /// Generates the complete answer.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub async fn compose(
        &self,
        question: &str,
        history: &[HistoryTurn],
        passages: &[Passage],
    ) -> Result<String, AgentError> {
        let response = self
            .agent(passages)
            .converse(self.provider, &Self::conversation(question, history))
            .await?;
        debug!(passages = passages.len(), tokens = response.usage.total_tokens, "answer composed");
        Ok(response.content)
    }

    /// Generates the answer, emitting each fragment as a token event.
    ///
    /// A provider without incremental output yields the whole answer as a
    /// single token event. Returns the full answer text.
    ///
    /// # Errors
    ///
    /// Propagates generator failures; returns [`AgentError::Cancelled`] once
    /// the progress consumer is gone.
    pub async fn compose_streaming(
        &self,
        question: &str,
        history: &[HistoryTurn],
        passages: &[Passage],
        sink: &dyn ProgressSink,
    ) -> Result<String, AgentError> {
        sink.ensure_open()?;
        let agent = self.agent(passages);
        let conversation = Self::conversation(question, history);

        let stream = if self.provider.supports_streaming() {
            match agent.converse_stream(self.provider, &conversation).await {
                Ok(stream) => Some(stream),
                Err(AgentError::StreamingUnsupported { provider }) => {
                    debug!(%provider, "streaming unsupported, answering in one piece");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let Some(mut stream) = stream else {
            let answer = agent.converse(self.provider, &conversation).await?.content;
            if !answer.is_empty() {
                sink.emit(ProgressEvent::Token(answer.clone())).await?;
            }
            return Ok(answer);
        };

        let mut answer = String::new();
        let mut fragments = 0usize;
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            answer.push_str(&fragment);
            fragments += 1;
            sink.emit(ProgressEvent::Token(fragment)).await?;
        }
        debug!(fragments, chars = answer.len(), "answer streamed");
        Ok(answer)
    }
}

/// Maps passages 1:1 to user-facing source records.
#[must_use]
pub fn source_records(passages: &[Passage]) -> Vec<SourceRecord> {
    passages.iter().map(SourceRecord::from).collect()
}
