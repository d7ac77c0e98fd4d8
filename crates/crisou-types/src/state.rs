//! Simulation state carried across days and the persisted session record.
//!
//! [`SimulationState`] is plain data. All mutation rules (clamping, day
//! advancement, termination, freezing) live in `crisou-engine`, which is the
//! only crate that writes to it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::SessionId;
use crate::profile::Profile;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TerminationReason {
    /// The run is still active.
    #[default]
    None,
    /// Every configured day has taken its decision.
    DaysElapsed,
    /// A critical resource fell below its threshold.
    CriticalResourceDepleted,
    /// A critical status level fell below its threshold.
    CriticalStatusFailure,
    /// The user stopped the run.
    UserQuit,
}

impl TerminationReason {
    /// Stable `snake_case` label used in logs and prompts.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::DaysElapsed => "days_elapsed",
            Self::CriticalResourceDepleted => "critical_resource_depleted",
            Self::CriticalStatusFailure => "critical_status_failure",
            Self::UserQuit => "user_quit",
        }
    }
}

impl core::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed simulated day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NarrativeEntry {
    /// The day on which the decision was taken.
    pub day: u32,
    /// The situation presented to the user at the start of the day.
    pub situation: String,
    /// What the user decided to do.
    pub decision: String,
    /// What happened as a result.
    pub outcome: String,
}

/// The mutable resource/status record of one run.
///
/// Invariants maintained by the engine:
/// - `narrative_log.len() == day - 1` while the run is active
/// - every quantity lies within its configured bound
/// - `terminated == (termination_reason != TerminationReason::None)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationState {
    /// Current day, starting at 1.
    pub day: u32,
    /// People covered by the household's supplies (the user included).
    pub household_size: u32,
    /// Resource name to non-negative quantity.
    pub resources: BTreeMap<String, u32>,
    /// Status category to bounded level.
    pub status_flags: BTreeMap<String, u32>,
    /// Household member name to free-text condition.
    pub household_status: BTreeMap<String, String>,
    /// The situation the user currently faces.
    pub current_situation: String,
    /// Completed days, oldest first. Append-only.
    pub narrative_log: Vec<NarrativeEntry>,
    /// Whether the run has ended. A terminated state is frozen.
    pub terminated: bool,
    /// Why the run ended, or [`TerminationReason::None`].
    pub termination_reason: TerminationReason,
    /// Which resource or status triggered a critical termination.
    #[serde(default)]
    pub termination_detail: Option<String>,
}

impl SimulationState {
    /// Number of decisions accepted so far.
    pub fn accepted_decisions(&self) -> usize {
        self.narrative_log.len()
    }
}

/// Everything persisted for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionRecord {
    /// The session key.
    pub id: SessionId,
    /// The validated profile the run was generated from.
    pub profile: Profile,
    /// The scenario narrative produced at generation time.
    pub opening_narrative: String,
    /// The live (or frozen) simulation state.
    pub state: SimulationState,
    /// Cached recap advice, once generated from the language model.
    #[serde(default)]
    pub advice: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last written.
    pub updated_at: DateTime<Utc>,
}
