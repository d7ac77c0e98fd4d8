//! Error types for the language model client.
//!
//! These never cross the [`LanguageModel`](crisou_engine::LanguageModel)
//! seam: the client turns every [`LlmError`] into a
//! [`ModelReply::Failure`](crisou_types::ModelReply::Failure).

/// Errors raised while preparing, sending, or reading a model call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Failed to load or render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    Backend(String),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
