//! Agent trait definition.
//!
//! Every generator role (research agent, query expander, answer composer)
//! implements this trait, giving the orchestrator one way to build requests
//! and call the provider.

use async_trait::async_trait;

use super::message::{ChatMessage, ChatRequest, TokenUsage, system_message, user_message};
use super::provider::{LlmProvider, TokenStream};
use super::tool::{ToolCall, ToolDefinition};
use crate::error::AgentError;

/// Response from an agent call.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Actions requested by the model.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"tool_calls"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate one role with a fixed system prompt and model
/// configuration. Agents that may request actions override
/// [`Agent::tools`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Sampling temperature.
    fn temperature(&self) -> f32 {
        0.3
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Tool definitions available to this agent.
    ///
    /// Returns an empty vec by default (no tools).
    fn tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    /// Builds a request: the system prompt followed by `conversation`.
    fn request(&self, conversation: &[ChatMessage]) -> ChatRequest {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(system_message(self.system_prompt()));
        messages.extend_from_slice(conversation);
        ChatRequest {
            model: self.model().to_string(),
            messages,
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            stream: false,
            tools: self.tools(),
        }
    }

    /// Runs one completion over a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or timeouts.
    async fn converse(
        &self,
        provider: &dyn LlmProvider,
        conversation: &[ChatMessage],
    ) -> Result<AgentResponse, AgentError> {
        let response = provider.chat(&self.request(conversation)).await?;
        Ok(AgentResponse {
            content: response.content,
            tool_calls: response.tool_calls,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }

    /// Runs one streaming completion over a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the stream cannot be opened.
    async fn converse_stream(
        &self,
        provider: &dyn LlmProvider,
        conversation: &[ChatMessage],
    ) -> Result<TokenStream, AgentError> {
        let mut request = self.request(conversation);
        request.stream = true;
        provider.chat_stream(&request).await
    }

    /// Runs the agent against a single user message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or timeouts.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        self.converse(provider, &[user_message(user_msg)]).await
    }
}
