//! The contract with the external language model.
//!
//! The engine never talks HTTP. It hands the model capability a
//! [`ModelRequest`] (a structured context for one of four jobs) and gets back
//! a tagged [`ModelReply`]:
//!
//! - [`ModelReply::Complete`] -- a narrative plus a fully structured delta
//! - [`ModelReply::Malformed`] -- partially usable output (the engine keeps
//!   whatever fields it can read)
//! - [`ModelReply::Failure`] -- nothing usable
//!
//! Delta values stay as raw JSON here; coercing them into numbers is the
//! engine's responsibility so that one bad field never discards a whole day.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::profile::Profile;
use crate::state::{NarrativeEntry, TerminationReason};

/// A request to the language model capability.
#[allow(clippy::large_enum_variant)] // one short-lived value per model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelRequest {
    /// Write the opening scenario for a new run.
    Scenario(ScenarioContext),
    /// Resolve one user decision into an outcome and a state delta.
    Decision(DecisionContext),
    /// Write closing advice for a finished run.
    Recap(RecapContext),
    /// Continue a free-form conversation.
    Chat(ChatContext),
}

impl ModelRequest {
    /// Short label for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Scenario(_) => "scenario",
            Self::Decision(_) => "decision",
            Self::Recap(_) => "recap",
            Self::Chat(_) => "chat",
        }
    }
}

/// Context for opening-scenario generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioContext {
    /// The validated user profile.
    pub profile: Profile,
    /// Starting resource quantities.
    pub resources: BTreeMap<String, u32>,
    /// Starting status levels.
    pub status_flags: BTreeMap<String, u32>,
    /// How many days the run lasts at most.
    pub max_days: u32,
}

/// Context for resolving one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionContext {
    /// The day the decision is taken on.
    pub day: u32,
    /// How many days the run lasts at most.
    pub max_days: u32,
    /// Current resource quantities.
    pub resources: BTreeMap<String, u32>,
    /// Current status levels.
    pub status_flags: BTreeMap<String, u32>,
    /// Current condition of each household member.
    pub household_status: BTreeMap<String, String>,
    /// The situation the user is responding to.
    pub situation: String,
    /// The most recent completed days, oldest first.
    pub recent_events: Vec<NarrativeEntry>,
    /// The user's decision text.
    pub decision: String,
}

/// Context for the closing recap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecapContext {
    /// The validated user profile.
    pub profile: Profile,
    /// The day the run ended on.
    pub final_day: u32,
    /// Final resource quantities.
    pub resources: BTreeMap<String, u32>,
    /// Final status levels.
    pub status_flags: BTreeMap<String, u32>,
    /// Every completed day, oldest first.
    pub narrative_log: Vec<NarrativeEntry>,
    /// Why the run ended.
    pub termination_reason: TerminationReason,
    /// Which resource or status ended the run, if any.
    pub termination_detail: Option<String>,
    /// How the advice should be angled for this kind of ending.
    pub framing: String,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ChatRole {
    /// Instructions framing the conversation.
    System,
    /// The human user.
    User,
    /// The model.
    Assistant,
}

impl ChatRole {
    /// Wire name used by chat-completion APIs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChatMessage {
    /// Author of the message.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

/// Context for a free-form conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    /// The conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,
}

/// Proposed changes for one simulated day, exactly as the model produced them.
///
/// Values are expected to be signed numbers (or text conditions for
/// `household`) but are kept as raw JSON so malformed fields can be
/// repaired one at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDelta {
    /// Resource name to signed change.
    #[serde(default)]
    pub resources: BTreeMap<String, serde_json::Value>,
    /// Status category to signed change.
    #[serde(default)]
    pub status: BTreeMap<String, serde_json::Value>,
    /// Household member name to new condition.
    #[serde(default)]
    pub household: BTreeMap<String, serde_json::Value>,
}

impl RawDelta {
    /// Whether the delta proposes no change at all.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.status.is_empty() && self.household.is_empty()
    }
}

/// What the language model capability returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ModelReply {
    /// Well-formed output.
    Complete {
        /// Narrative text.
        narrative: String,
        /// Structured delta (empty for narrative-only requests).
        #[serde(default)]
        delta: RawDelta,
    },
    /// Partially structured output.
    Malformed {
        /// Narrative text, if one could be recovered.
        #[serde(default)]
        narrative: Option<String>,
        /// Whatever delta fields could be recovered.
        #[serde(default)]
        delta: RawDelta,
    },
    /// The capability was unusable.
    Failure {
        /// Why the call failed.
        reason: String,
    },
}

impl ModelReply {
    /// A well-formed narrative-only reply.
    pub fn narrative(text: impl Into<String>) -> Self {
        Self::Complete {
            narrative: text.into(),
            delta: RawDelta::default(),
        }
    }

    /// A failure reply.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }
}
