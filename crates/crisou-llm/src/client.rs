//! The production [`LanguageModel`]: templates, HTTP backend, and parser.

use crisou_engine::LanguageModel;
use crisou_types::{ModelReply, ModelRequest};
use tracing::{debug, warn};

use crate::llm::LlmBackend;
use crate::parse::parse_reply;
use crate::prompt::PromptEngine;

/// Renders a request, sends it to the backend, and parses the reply.
///
/// Every failure on the way is reported as [`ModelReply::Failure`]; the
/// engine decides whether that is fatal.
pub struct ModelClient {
    backend: LlmBackend,
    prompts: PromptEngine,
}

impl ModelClient {
    /// Create a client over a backend and a loaded prompt engine.
    pub const fn new(backend: LlmBackend, prompts: PromptEngine) -> Self {
        Self { backend, prompts }
    }
}

impl LanguageModel for ModelClient {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn complete(&self, request: &ModelRequest) -> ModelReply {
        let messages = match self.prompts.render(request) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(kind = request.kind(), error = %e, "prompt rendering failed");
                return ModelReply::failure(e.to_string());
            }
        };

        let json_mode = matches!(request, ModelRequest::Decision(_));
        match self.backend.complete(&messages, json_mode).await {
            Ok(raw) => {
                debug!(
                    backend = self.backend.name(),
                    kind = request.kind(),
                    chars = raw.len(),
                    "model replied"
                );
                parse_reply(request, &raw)
            }
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    kind = request.kind(),
                    error = %e,
                    "model call failed"
                );
                ModelReply::failure(e.to_string())
            }
        }
    }
}
