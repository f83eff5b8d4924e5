//! Pipeline configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::AgentError;

/// Default cap on agent search rounds per request.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;
/// Default passages requested per retrieval call.
pub const DEFAULT_RETRIEVAL_K: usize = 4;
/// Default model identifier.
const DEFAULT_MODEL: &str = "gpt-4o";
/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Default answer max tokens.
const DEFAULT_MAX_TOKENS: u32 = 2048;
/// Default per-call generator timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A model clients may request, with a display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelOption {
    /// Identifier sent to the provider.
    pub id: String,
    /// Human-readable name.
    pub label: String,
}

impl ModelOption {
    /// Creates an option.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Parses a comma-separated `id=Label` list; a bare `id` is its own label.
    #[must_use]
    pub fn parse_list(value: &str) -> Vec<Self> {
        value
            .split(',')
            .filter_map(|entry| {
                let (id, label) = entry.split_once('=').unwrap_or((entry, entry));
                let id = id.trim();
                let label = label.trim();
                (!id.is_empty()).then(|| Self::new(id, if label.is_empty() { id } else { label }))
            })
            .collect()
    }
}

/// Configuration for the answer pipeline.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model used for expansion, agent reasoning and answers.
    pub model: String,
    /// Models offered to clients. Always contains [`RagConfig::model`].
    pub models: Vec<ModelOption>,
    /// Sampling temperature for every generator call.
    pub temperature: f32,
    /// Maximum tokens for answer generation.
    pub max_tokens: u32,
    /// Use the multi-hop agent instead of single-pass retrieval.
    pub use_agent: bool,
    /// Agent search rounds allowed before the loop is forced to stop.
    pub max_iterations: usize,
    /// Passages requested per retrieval call.
    pub retrieval_k: usize,
    /// Expand the question into alternative queries on the single-pass path.
    pub use_query_expansion: bool,
    /// Wall-clock budget for one generator call.
    pub timeout: Duration,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
}

impl RagConfig {
    /// Creates a new builder for `RagConfig`.
    #[must_use]
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    models: Option<Vec<ModelOption>>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    use_agent: Option<bool>,
    max_iterations: Option<usize>,
    retrieval_k: Option<usize>,
    use_query_expansion: Option<bool>,
    timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
}

/// Parses a boolean environment value (`1/0`, `true/false`, `yes/no`, `on/off`).
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl RagConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("HOPRAG_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("HOPRAG_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("HOPRAG_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("HOPRAG_MODEL").ok();
        }
        if self.models.is_none() {
            self.models = std::env::var("HOPRAG_MODELS")
                .ok()
                .map(|v| ModelOption::parse_list(&v));
        }
        if self.use_agent.is_none() {
            self.use_agent = std::env::var("HOPRAG_USE_AGENT")
                .ok()
                .and_then(|v| parse_flag(&v));
        }
        if self.max_iterations.is_none() {
            self.max_iterations = env_parse("HOPRAG_MAX_ITERATIONS");
        }
        if self.retrieval_k.is_none() {
            self.retrieval_k = env_parse("HOPRAG_RETRIEVAL_K");
        }
        if self.use_query_expansion.is_none() {
            self.use_query_expansion = std::env::var("HOPRAG_QUERY_EXPANSION")
                .ok()
                .and_then(|v| parse_flag(&v));
        }
        if self.timeout.is_none() {
            self.timeout = env_parse("HOPRAG_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("HOPRAG_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the models offered to clients.
    #[must_use]
    pub fn models(mut self, models: Vec<ModelOption>) -> Self {
        self.models = Some(models);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the answer max tokens.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Selects the agentic or single-pass path.
    #[must_use]
    pub const fn use_agent(mut self, enabled: bool) -> Self {
        self.use_agent = Some(enabled);
        self
    }

    /// Sets the agent iteration cap.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the per-query retrieval fan-out.
    #[must_use]
    pub const fn retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = Some(k);
        self
    }

    /// Enables or disables query expansion.
    #[must_use]
    pub const fn use_query_expansion(mut self, enabled: bool) -> Self {
        self.use_query_expansion = Some(enabled);
        self
    }

    /// Sets the per-call generator timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`RagConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<RagConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;
        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let mut models = self.models.unwrap_or_default();
        if !models.iter().any(|m| m.id == model) {
            models.insert(0, ModelOption::new(model.clone(), model.clone()));
        }

        Ok(RagConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model,
            models,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            use_agent: self.use_agent.unwrap_or(true),
            max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            retrieval_k: self.retrieval_k.unwrap_or(DEFAULT_RETRIEVAL_K).max(1),
            use_query_expansion: self.use_query_expansion.unwrap_or(true),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_builder_defaults() {
        let config = RagConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert!(config.use_agent);
        assert!(config.use_query_expansion);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.retrieval_k, DEFAULT_RETRIEVAL_K);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_builder_missing_api_key() {
        assert!(matches!(
            RagConfig::builder().build(),
            Err(AgentError::ApiKeyMissing)
        ));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = RagConfig::builder()
            .api_key("key")
            .model("gpt-4.1")
            .use_agent(false)
            .use_query_expansion(false)
            .max_iterations(2)
            .retrieval_k(8)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.model, "gpt-4.1");
        assert!(!config.use_agent);
        assert!(!config.use_query_expansion);
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.retrieval_k, 8);
    }

    #[test]
    fn test_models_always_offer_default() {
        let config = RagConfig::builder()
            .api_key("key")
            .model("gpt-4.1")
            .models(ModelOption::parse_list("gpt-5=GPT-5, gpt-4.1=GPT-4.1"))
            .build()
            .unwrap_or_else(|_| unreachable!());
        let ids: Vec<_> = config.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["gpt-5", "gpt-4.1"]);

        let config = RagConfig::builder()
            .api_key("key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.models, vec![ModelOption::new("gpt-4o", "gpt-4o")]);
    }

    #[test_case("gpt-5=GPT-5 (Azure)", &[("gpt-5", "GPT-5 (Azure)")])]
    #[test_case("a, b=B", &[("a", "a"), ("b", "B")])]
    #[test_case(" ,=x,", &[])]
    fn test_parse_model_list(input: &str, expected: &[(&str, &str)]) {
        let parsed = ModelOption::parse_list(input);
        let pairs: Vec<_> = parsed.iter().map(|m| (m.id.as_str(), m.label.as_str())).collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_retrieval_k_is_at_least_one() {
        let config = RagConfig::builder()
            .api_key("key")
            .retrieval_k(0)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.retrieval_k, 1);
    }

    #[test_case("true", Some(true))]
    #[test_case("ON", Some(true))]
    #[test_case("0", Some(false))]
    #[test_case("no", Some(false))]
    #[test_case("maybe", None)]
    fn test_parse_flag(input: &str, expected: Option<bool>) {
        assert_eq!(parse_flag(input), expected);
    }
}
