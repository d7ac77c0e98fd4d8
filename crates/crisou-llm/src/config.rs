//! Language model configuration loaded from environment variables.

use crate::error::LlmError;

/// Settings for the language model backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Which request format the API speaks.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.mistral.ai/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier (e.g. `mistral-large-latest`).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on generated tokens per call.
    pub max_tokens: u32,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions API (Mistral, `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API (different request format).
    Anthropic,
}

impl BackendType {
    /// Parse a backend name as written in `LLM_BACKEND`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] for an unknown name.
    pub fn parse(name: &str) -> Result<Self, LlmError> {
        match name.trim().to_lowercase().as_str() {
            "openai" | "mistral" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(LlmError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `LLM_API_KEY` -- API key
    ///
    /// Optional variables:
    /// - `LLM_BACKEND` -- backend type (default `mistral`)
    /// - `LLM_API_URL` -- API base URL (default `https://api.mistral.ai/v1`)
    /// - `LLM_MODEL` -- model name (default `mistral-large-latest`)
    /// - `LLM_TEMPERATURE` -- sampling temperature (default `0.7`)
    /// - `LLM_MAX_TOKENS` -- generation cap (default `1000`)
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] naming the missing or invalid variable.
    pub fn from_env() -> Result<Self, LlmError> {
        let backend_type = BackendType::parse(&env_or("LLM_BACKEND", "mistral"))?;
        let api_url = env_or("LLM_API_URL", "https://api.mistral.ai/v1");
        let api_key = env_var("LLM_API_KEY")?;
        let model = env_or("LLM_MODEL", "mistral-large-latest");

        let temperature: f64 = env_or("LLM_TEMPERATURE", "0.7")
            .parse()
            .map_err(|e| LlmError::Config(format!("invalid LLM_TEMPERATURE: {e}")))?;

        let max_tokens: u32 = env_or("LLM_MAX_TOKENS", "1000")
            .parse()
            .map_err(|e| LlmError::Config(format!("invalid LLM_MAX_TOKENS: {e}")))?;

        Ok(Self {
            backend_type,
            api_url: api_url.trim_end_matches('/').to_owned(),
            api_key,
            model,
            temperature,
            max_tokens,
        })
    }
}

/// Read a required environment variable.
fn env_var(name: &str) -> Result<String, LlmError> {
    std::env::var(name)
        .map_err(|e| LlmError::Config(format!("missing required env var {name}: {e}")))
}

/// Read an optional environment variable with a default.
fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}
