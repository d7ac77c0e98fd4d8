//! The language model seam and a scripted stand-in.
//!
//! The engine obtains scenario text, decision outcomes, and recap advice
//! through the [`LanguageModel`] trait. The production implementation lives
//! in `crisou-llm`; [`ScriptedModel`] replays canned replies so the state
//! machine can be exercised end-to-end without a network.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use crisou_types::{ModelReply, ModelRequest};
use tokio::time::timeout;
use tracing::warn;

/// A source of model completions.
///
/// Implementations never return `Err`: transport problems, refusals, and
/// unparseable output are all expressed through [`ModelReply`].
pub trait LanguageModel: Send + Sync + 'static {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Produce a reply for the given request.
    fn complete(&self, request: &ModelRequest) -> impl Future<Output = ModelReply> + Send;
}

/// Call the model with a deadline, mapping expiry to [`ModelReply::Failure`].
pub async fn complete_with_timeout<M: LanguageModel>(
    model: &M,
    request: &ModelRequest,
    deadline: Duration,
) -> ModelReply {
    match timeout(deadline, model.complete(request)).await {
        Ok(reply) => reply,
        Err(_) => {
            warn!(
                model = model.name(),
                kind = request.kind(),
                timeout_ms = deadline.as_millis(),
                "language model call exceeded deadline"
            );
            ModelReply::failure(format!(
                "language model timed out after {}ms",
                deadline.as_millis()
            ))
        }
    }
}

/// A deterministic model that replays a queue of replies.
///
/// Every request is recorded so tests can assert on the context the engine
/// sent. When the queue is empty the fallback reply is returned if one was
/// configured, otherwise a [`ModelReply::Failure`].
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    requests: Mutex<Vec<ModelRequest>>,
    fallback: Option<ModelReply>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    /// Create a model that replays `replies` in order.
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Reply with `reply` once the queue is exhausted.
    #[must_use]
    pub fn with_fallback(mut self, reply: ModelReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Sleep before every reply (for timeout tests).
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue another reply.
    pub fn push(&self, reply: ModelReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of queued replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next_reply(&self, request: &ModelRequest) -> ModelReply {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| ModelReply::failure("scripted model has no reply left"))
    }
}

impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> ModelReply {
        let reply = self.next_reply(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use crisou_types::{ChatContext, ChatMessage, ChatRole};

    use super::*;

    fn chat() -> ModelRequest {
        ModelRequest::Chat(ChatContext {
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "hi".to_owned(),
            }],
        })
    }

    #[tokio::test]
    async fn replays_in_order_then_fails() {
        let model = ScriptedModel::new([ModelReply::narrative("one"), ModelReply::narrative("two")]);
        assert_eq!(model.complete(&chat()).await, ModelReply::narrative("one"));
        assert_eq!(model.complete(&chat()).await, ModelReply::narrative("two"));
        assert!(matches!(
            model.complete(&chat()).await,
            ModelReply::Failure { .. }
        ));
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn fallback_repeats_forever() {
        let model = ScriptedModel::new([]).with_fallback(ModelReply::narrative("again"));
        for _ in 0..3 {
            assert_eq!(model.complete(&chat()).await, ModelReply::narrative("again"));
        }
    }

    #[tokio::test]
    async fn push_extends_queue() {
        let model = ScriptedModel::default();
        model.push(ModelReply::narrative("late"));
        assert_eq!(model.remaining(), 1);
        assert_eq!(model.complete(&chat()).await, ModelReply::narrative("late"));
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let model =
            ScriptedModel::new([ModelReply::narrative("late")]).with_delay(Duration::from_secs(60));
        let reply = complete_with_timeout(&model, &chat(), Duration::from_secs(1)).await;
        assert!(matches!(reply, ModelReply::Failure { ref reason } if reason.contains("timed out")));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_model_beats_deadline() {
        let model =
            ScriptedModel::new([ModelReply::narrative("ok")]).with_delay(Duration::from_millis(10));
        let reply = complete_with_timeout(&model, &chat(), Duration::from_secs(1)).await;
        assert_eq!(reply, ModelReply::narrative("ok"));
    }
}
