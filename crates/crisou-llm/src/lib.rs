//! Language model capability for the Crisou simulation.
//!
//! Implements [`crisou_engine::LanguageModel`] over HTTP:
//!
//! ```text
//! ModelRequest --> PromptEngine --> LlmBackend --> parse --> ModelReply
//! ```
//!
//! Backends speak either the OpenAI-compatible chat completions format
//! (Mistral, `OpenAI`, Ollama) or the Anthropic Messages format. Replies
//! that are not clean JSON are recovered where possible and reported as
//! [`ModelReply::Malformed`](crisou_types::ModelReply::Malformed).

pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod parse;
pub mod prompt;

pub use client::ModelClient;
pub use config::{BackendType, LlmConfig};
pub use error::LlmError;
pub use llm::LlmBackend;
pub use prompt::PromptEngine;
