//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/`) so the
//! tone and instructions of the simulation can be tuned without
//! recompiling. Each request kind has its own user template; all share
//! `system.j2`. Templates render against the serialized [`ModelRequest`],
//! so every context field is available by name (plus `kind`).

use crisou_types::{ChatMessage, ChatRole, ModelRequest};
use minijinja::Environment;

use crate::error::LlmError;

/// Template names loaded from `<dir>/<name>.j2`.
const TEMPLATES: [&str; 4] = ["system", "scenario", "decision", "recap"];

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Load every template from the given directory.
    ///
    /// The directory must contain `system.j2`, `scenario.j2`,
    /// `decision.j2`, and `recap.j2`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if a file is missing or does not parse.
    pub fn new(templates_dir: &str) -> Result<Self, LlmError> {
        let mut env = Environment::new();
        for name in TEMPLATES {
            let source = load_template(templates_dir, &format!("{name}.j2"))?;
            env.add_template_owned(name, source)
                .map_err(|e| LlmError::Template(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Build the conversation to send for a request.
    ///
    /// Structured requests become a system message and one user message.
    /// Chat requests pass through, with the system prompt prepended when
    /// the caller did not supply one.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] on a render failure.
    pub fn render(&self, request: &ModelRequest) -> Result<Vec<ChatMessage>, LlmError> {
        let context = serde_json::to_value(request)?;
        let system = self.render_one("system", &context)?;

        let user_template = match request {
            ModelRequest::Scenario(_) => "scenario",
            ModelRequest::Decision(_) => "decision",
            ModelRequest::Recap(_) => "recap",
            ModelRequest::Chat(chat) => {
                let mut messages = Vec::with_capacity(chat.messages.len().saturating_add(1));
                if !chat.messages.iter().any(|m| m.role == ChatRole::System) {
                    messages.push(ChatMessage {
                        role: ChatRole::System,
                        content: system,
                    });
                }
                messages.extend(chat.messages.iter().cloned());
                return Ok(messages);
            }
        };

        Ok(vec![
            ChatMessage {
                role: ChatRole::System,
                content: system,
            },
            ChatMessage {
                role: ChatRole::User,
                content: self.render_one(user_template, &context)?,
            },
        ])
    }

    fn render_one(&self, name: &str, context: &serde_json::Value) -> Result<String, LlmError> {
        self.env
            .get_template(name)
            .map_err(|e| LlmError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map_err(|e| LlmError::Template(format!("{name} render failed: {e}")))
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, LlmError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| LlmError::Template(format!("failed to read {path}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crisou_types::{ChatContext, DecisionContext};

    use super::*;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let unique = format!(
            "crisou_{tag}_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    fn write_test_templates(dir: &std::path::Path) {
        std::fs::write(dir.join("system.j2"), "You narrate a {{ kind }} step.").ok();
        std::fs::write(dir.join("scenario.j2"), "Location: {{ profile.location }}").ok();
        std::fs::write(
            dir.join("decision.j2"),
            "Day {{ day }}/{{ max_days }}\nWater: {{ resources.water }}\n\
             {% for e in recent_events %}- {{ e.decision }}\n{% endfor %}Decision: {{ decision }}",
        )
        .ok();
        std::fs::write(dir.join("recap.j2"), "{{ framing }}").ok();
    }

    fn decision_request() -> ModelRequest {
        ModelRequest::Decision(DecisionContext {
            day: 3,
            max_days: 10,
            resources: BTreeMap::from([("water".to_owned(), 12)]),
            status_flags: BTreeMap::new(),
            household_status: BTreeMap::new(),
            situation: "The road is flooded.".to_owned(),
            recent_events: Vec::new(),
            decision: "Stay home".to_owned(),
        })
    }

    #[test]
    fn renders_decision_prompt() {
        let dir = temp_dir("prompt_render");
        write_test_templates(&dir);

        let engine = PromptEngine::new(dir.to_str().unwrap_or(""));
        assert!(engine.is_ok(), "PromptEngine::new should succeed with valid templates");
        let messages = engine
            .and_then(|e| e.render(&decision_request()))
            .unwrap_or_default();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages.first().map(|m| m.content.as_str()), Some("You narrate a decision step."));
        let user = messages.get(1).map(|m| m.content.clone()).unwrap_or_default();
        assert!(user.contains("Day 3/10"));
        assert!(user.contains("Water: 12"));
        assert!(user.contains("Decision: Stay home"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn chat_gets_system_prompt_prepended() {
        let dir = temp_dir("prompt_chat");
        write_test_templates(&dir);
        let engine = PromptEngine::new(dir.to_str().unwrap_or(""));
        assert!(engine.is_ok());

        let request = ModelRequest::Chat(ChatContext {
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "How much water per person?".to_owned(),
            }],
        });
        let messages = engine
            .and_then(|e| e.render(&request))
            .unwrap_or_default();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.first().map(|m| m.role), Some(ChatRole::System));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_template_returns_error() {
        let dir = temp_dir("prompt_missing");
        std::fs::write(dir.join("system.j2"), "test").ok();

        let result = PromptEngine::new(dir.to_str().unwrap_or(""));
        assert!(result.is_err(), "should fail when templates are missing");

        std::fs::remove_dir_all(&dir).ok();
    }
}
