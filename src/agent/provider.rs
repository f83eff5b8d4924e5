//! Pluggable generator backends.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into SDK calls. Agent logic never sees a vendor type.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Boxed stream of text fragments from a streaming completion.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// Trait for LLM provider backends.
///
/// Implementations own the transport (HTTP, SDK calls, per-call timeouts)
/// and present a uniform interface to the agents.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Whether [`LlmProvider::chat_stream`] yields incremental output.
    ///
    /// When `false`, callers fall back to [`LlmProvider::chat`] and treat
    /// the whole completion as a single fragment.
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Executes a streaming chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection or streaming failures.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<TokenStream, AgentError>;
}
