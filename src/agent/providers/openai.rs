//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Works against any `OpenAI`-compatible chat completion endpoint via the
//! base URL override in [`RagConfig`]. Every call is bounded by
//! `RagConfig::timeout`.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequest, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

use crate::agent::config::RagConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::{LlmProvider, TokenStream};
use crate::agent::tool::ToolCall;
use crate::error::AgentError;

/// `OpenAI`-compatible LLM provider.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Creates a new provider from pipeline configuration.
    #[must_use]
    pub fn new(config: &RagConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
            timeout: config.timeout,
        }
    }

    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                let tool_calls = (!msg.tool_calls.is_empty()).then(|| {
                    msg.tool_calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect()
                });

                let content = (!msg.content.is_empty()).then(|| {
                    ChatCompletionRequestAssistantMessageContent::Text(msg.content.clone())
                });

                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content,
                    name: None,
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
            Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(msg.content.clone()),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }),
        }
    }

    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let tools = (!request.tools.is_empty()).then(|| {
            request
                .tools
                .iter()
                .map(|td| ChatCompletionTool {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionObject {
                        name: td.name.clone(),
                        description: Some(td.description.clone()),
                        parameters: Some(td.parameters.clone()),
                        strict: None,
                    },
                })
                .collect()
        });

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            stream: request.stream.then_some(true),
            tools,
            ..Default::default()
        }
    }

    /// Reads the tool calls of a completion choice.
    fn read_tool_calls(calls: &[ChatCompletionMessageToolCall]) -> Vec<ToolCall> {
        calls
            .iter()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                arguments: tc.function.arguments.clone(),
            })
            .collect()
    }

    fn timed_out(&self) -> AgentError {
        AgentError::Timeout {
            secs: self.timeout.as_secs(),
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(openai_request))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
                status: None,
            })?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls.as_deref())
            .map(Self::read_tool_calls)
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        debug!(
            model = %request.model,
            tokens = usage.total_tokens,
            tool_calls = tool_calls.len(),
            "chat completion"
        );

        Ok(ChatResponse {
            content,
            usage,
            tool_calls,
            finish_reason,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TokenStream, AgentError> {
        let mut stream_request = request.clone();
        stream_request.stream = true;
        let openai_request = Self::build_request(&stream_request);

        let stream = tokio::time::timeout(
            self.timeout,
            self.client.chat().create_stream(openai_request),
        )
        .await
        .map_err(|_| self.timed_out())?
        .map_err(|e| AgentError::ApiRequest {
            message: e.to_string(),
            status: None,
        })?;

        // The budget covers the whole stream, not only the handshake.
        let deadline = tokio::time::Instant::now() + self.timeout;
        let secs = self.timeout.as_secs();
        let mapped = stream
            .map(|result| match result {
                Ok(response) => Ok(response
                    .choices
                    .first()
                    .and_then(|c| c.delta.content.clone())
                    .unwrap_or_default()),
                Err(e) => Err(AgentError::Stream {
                    message: e.to_string(),
                }),
            })
            .filter(|item| std::future::ready(!matches!(item, Ok(text) if text.is_empty())));

        let bounded = futures_util::stream::unfold(
            (Box::pin(mapped), false),
            move |(mut inner, finished)| async move {
                if finished {
                    return None;
                }
                match tokio::time::timeout_at(deadline, inner.next()).await {
                    Ok(Some(item)) => Some((item, (inner, false))),
                    Ok(None) => None,
                    Err(_) => Some((Err(AgentError::Timeout { secs }), (inner, true))),
                }
            },
        );

        Ok(Box::pin(bounded))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::tool::AgentAction;

    fn request(stream: bool, with_tools: bool) -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![
                message::system_message("You are a maintenance assistant."),
                message::user_message("What oil does the pump take?"),
            ],
            temperature: Some(0.3),
            max_tokens: Some(256),
            stream,
            tools: if with_tools {
                AgentAction::definitions()
            } else {
                Vec::new()
            },
        }
    }

    #[test]
    fn test_convert_roles() {
        assert!(matches!(
            OpenAiProvider::convert_message(&message::system_message("s")),
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(
            OpenAiProvider::convert_message(&message::user_message("u")),
            ChatCompletionRequestMessage::User(_)
        ));
        assert!(matches!(
            OpenAiProvider::convert_message(&message::tool_message("call_1", "r")),
            ChatCompletionRequestMessage::Tool(_)
        ));
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let msg = message::assistant_turn(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "search_maintenance_docs".to_string(),
                arguments: r#"{"query":"oil grade"}"#.to_string(),
            }],
        );
        let ChatCompletionRequestMessage::Assistant(a) = OpenAiProvider::convert_message(&msg)
        else {
            panic!("expected assistant message");
        };
        assert_eq!(a.tool_calls.as_ref().map_or(0, Vec::len), 1);
        assert!(a.content.is_none());
    }

    #[test]
    fn test_read_tool_calls_from_completion() {
        let calls = vec![ChatCompletionMessageToolCall {
            id: "call_7".to_string(),
            r#type: ChatCompletionToolType::Function,
            function: FunctionCall {
                name: "search_maintenance_docs".to_string(),
                arguments: r#"{"query":"hydraulic filter"}"#.to_string(),
            },
        }];
        let read = OpenAiProvider::read_tool_calls(&calls);
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].id, "call_7");
        assert_eq!(read[0].name, "search_maintenance_docs");
        assert!(OpenAiProvider::read_tool_calls(&[]).is_empty());
    }

    #[test]
    fn test_build_request_with_tools() {
        let built = OpenAiProvider::build_request(&request(false, true));
        assert_eq!(built.tools.as_ref().map_or(0, Vec::len), 1);
        assert_eq!(built.stream, None);
        assert_eq!(built.max_completion_tokens, Some(256));
    }

    #[test]
    fn test_build_request_streaming() {
        let built = OpenAiProvider::build_request(&request(true, false));
        assert_eq!(built.stream, Some(true));
        assert!(built.tools.is_none());
    }

    #[test]
    fn test_provider_keeps_timeout() {
        let config = RagConfig::builder()
            .api_key("sk-test")
            .timeout(Duration::from_secs(7))
            .build()
            .unwrap_or_else(|e| panic!("config: {e}"));
        let provider = OpenAiProvider::new(&config);
        assert!(matches!(provider.timed_out(), AgentError::Timeout { secs: 7 }));
        assert!(provider.supports_streaming());
    }
}
