//! Closing recap and advice.
//!
//! Recap is best-effort. When the language model fails or returns nothing,
//! a deterministic summary built only from the state is returned instead,
//! flagged with [`Recap::fallback`] so callers know not to cache it.

use std::fmt::Write as _;
use std::sync::Arc;

use crisou_types::{ModelReply, ModelRequest, Profile, RecapContext, SimulationState, TerminationReason};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::model::{LanguageModel, complete_with_timeout};

/// Closing advice for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recap {
    /// Advice text shown to the user.
    pub advice: String,
    /// Whether this is the deterministic fallback rather than model output.
    pub fallback: bool,
}

/// Produces the closing advice for a finished run.
pub struct RecapGenerator<M> {
    config: Arc<EngineConfig>,
    model: Arc<M>,
}

impl<M: LanguageModel> RecapGenerator<M> {
    /// Create a generator over the given configuration and model.
    pub const fn new(config: Arc<EngineConfig>, model: Arc<M>) -> Self {
        Self { config, model }
    }

    /// Summarize the run and request tailored advice. Never fails.
    pub async fn recap(&self, profile: &Profile, state: &SimulationState) -> Recap {
        let request = ModelRequest::Recap(RecapContext {
            profile: profile.clone(),
            final_day: state.day,
            resources: state.resources.clone(),
            status_flags: state.status_flags.clone(),
            narrative_log: state.narrative_log.clone(),
            termination_reason: state.termination_reason,
            termination_detail: state.termination_detail.clone(),
            framing: framing(state.termination_reason, state.termination_detail.as_deref()),
        });

        let reply =
            complete_with_timeout(self.model.as_ref(), &request, self.config.model_timeout()).await;

        let advice = match reply {
            ModelReply::Complete { narrative, .. }
            | ModelReply::Malformed {
                narrative: Some(narrative),
                ..
            } => narrative.trim().to_owned(),
            ModelReply::Malformed { narrative: None, .. } => String::new(),
            ModelReply::Failure { reason } => {
                warn!(reason = %reason, "recap generation failed, using fallback summary");
                String::new()
            }
        };

        if advice.is_empty() {
            return Recap {
                advice: fallback_summary(profile, state),
                fallback: true,
            };
        }

        info!(
            reason = %state.termination_reason,
            days = state.accepted_decisions(),
            "recap generated"
        );
        Recap {
            advice,
            fallback: false,
        }
    }
}

/// The angle the advice should take for a given ending.
pub fn framing(reason: TerminationReason, detail: Option<&str>) -> String {
    match reason {
        TerminationReason::DaysElapsed => "The household made it to the end of the crisis. \
             Reinforce what worked and point out what would make a longer crisis easier."
            .to_owned(),
        TerminationReason::CriticalResourceDepleted => format!(
            "The household ran out of {}. Focus on stockpiling, rationing and \
             finding alternative sources before a crisis starts.",
            humanize(detail.unwrap_or("a critical resource"))
        ),
        TerminationReason::CriticalStatusFailure => format!(
            "The household's {} collapsed. Focus on protecting it early and on \
             the warning signs that were missed.",
            humanize(detail.unwrap_or("condition"))
        ),
        TerminationReason::UserQuit => "The user stopped the simulation early. Summarize \
             the situation they left and the preparation that matters most for it."
            .to_owned(),
        TerminationReason::None => "The simulation is still running. Give interim \
             preparation advice based on the situation so far."
            .to_owned(),
    }
}

/// Deterministic recap built from the state alone.
pub fn fallback_summary(profile: &Profile, state: &SimulationState) -> String {
    let mut text = format!(
        "{}, your simulation in {} ended on day {} after {} decision(s): {}.",
        profile.name,
        profile.location,
        state.day,
        state.accepted_decisions(),
        ending(state.termination_reason, state.termination_detail.as_deref()),
    );

    text.push_str("\n\nFinal resources:");
    for (name, value) in &state.resources {
        let _ = write!(text, "\n- {}: {value}", humanize(name));
    }
    text.push_str("\n\nFinal status:");
    for (name, value) in &state.status_flags {
        let _ = write!(text, "\n- {}: {value}", humanize(name));
    }

    text.push_str("\n\nGeneral advice:");
    for tip in tips(state.termination_reason) {
        let _ = write!(text, "\n- {tip}");
    }
    text
}

fn ending(reason: TerminationReason, detail: Option<&str>) -> String {
    match (reason, detail) {
        (TerminationReason::DaysElapsed, _) => "you reached the end of the crisis".to_owned(),
        (TerminationReason::CriticalResourceDepleted, Some(name)) => {
            format!("your {} ran out", humanize(name))
        }
        (TerminationReason::CriticalResourceDepleted, None) => {
            "a critical resource ran out".to_owned()
        }
        (TerminationReason::CriticalStatusFailure, Some(name)) => {
            format!("your {} became critical", humanize(name))
        }
        (TerminationReason::CriticalStatusFailure, None) => {
            "your situation became critical".to_owned()
        }
        (TerminationReason::UserQuit, _) => "you chose to stop".to_owned(),
        (TerminationReason::None, _) => "the run is still in progress".to_owned(),
    }
}

const fn tips(reason: TerminationReason) -> &'static [&'static str] {
    match reason {
        TerminationReason::CriticalResourceDepleted => &[
            "Keep at least three days of water and food per person.",
            "Ration early rather than late.",
            "Know where to find drinking water nearby.",
        ],
        TerminationReason::CriticalStatusFailure => &[
            "Keep a first-aid kit and essential medication at hand.",
            "Agree on a safe meeting point with your household.",
            "Identify a safe shelter before it is needed.",
        ],
        _ => &[
            "Keep an emergency kit ready and check it regularly.",
            "Follow official alerts and instructions.",
            "Make a household emergency plan and rehearse it.",
        ],
    }
}

fn humanize(key: &str) -> String {
    key.replace('_', " ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::ScriptedModel;

    fn profile() -> Profile {
        Profile {
            name: "Camille".to_owned(),
            age: 34,
            location: "coastal town".to_owned(),
            household: Vec::new(),
            vulnerabilities: std::collections::BTreeSet::new(),
            occupation: None,
            work_environment: None,
        }
    }

    fn ended(reason: TerminationReason, detail: Option<&str>) -> SimulationState {
        SimulationState {
            day: 4,
            household_size: 1,
            resources: BTreeMap::from([("medical_supplies".to_owned(), 3), ("water".to_owned(), 1)]),
            status_flags: BTreeMap::from([("health".to_owned(), 60)]),
            terminated: true,
            termination_reason: reason,
            termination_detail: detail.map(str::to_owned),
            ..SimulationState::default()
        }
    }

    fn generator(model: ScriptedModel) -> (RecapGenerator<ScriptedModel>, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        (
            RecapGenerator::new(Arc::new(EngineConfig::default()), Arc::clone(&model)),
            model,
        )
    }

    #[tokio::test]
    async fn model_advice_is_returned() {
        let (g, model) = generator(ScriptedModel::new([ModelReply::narrative(" Store more water. ")]));
        let state = ended(TerminationReason::CriticalResourceDepleted, Some("water"));
        let recap = g.recap(&profile(), &state).await;
        assert_eq!(recap.advice, "Store more water.");
        assert!(!recap.fallback);

        let requests = model.requests();
        let ModelRequest::Recap(ctx) = &requests[0] else {
            panic!("expected recap request");
        };
        assert_eq!(ctx.termination_reason, TerminationReason::CriticalResourceDepleted);
        assert!(ctx.framing.contains("ran out of water"));
        assert_eq!(ctx.final_day, 4);
    }

    #[tokio::test]
    async fn failure_degrades_to_fallback() {
        let (g, _) = generator(ScriptedModel::new([ModelReply::failure("timeout")]));
        let state = ended(TerminationReason::CriticalResourceDepleted, Some("water"));
        let recap = g.recap(&profile(), &state).await;
        assert!(recap.fallback);
        assert!(recap.advice.starts_with("Camille, your simulation in coastal town ended on day 4"));
        assert!(recap.advice.contains("your water ran out"));
        assert!(recap.advice.contains("- medical supplies: 3"));
        assert!(recap.advice.contains("Ration early"));
    }

    #[tokio::test]
    async fn blank_advice_degrades_to_fallback() {
        let (g, _) = generator(ScriptedModel::new([ModelReply::narrative("")]));
        let recap = g.recap(&profile(), &ended(TerminationReason::UserQuit, None)).await;
        assert!(recap.fallback);
        assert!(recap.advice.contains("you chose to stop"));
    }

    #[test]
    fn framing_differs_per_reason() {
        let reasons = [
            TerminationReason::DaysElapsed,
            TerminationReason::CriticalResourceDepleted,
            TerminationReason::CriticalStatusFailure,
            TerminationReason::UserQuit,
        ];
        let texts: std::collections::BTreeSet<String> =
            reasons.iter().map(|r| framing(*r, None)).collect();
        assert_eq!(texts.len(), reasons.len());
    }

    #[test]
    fn fallback_is_deterministic() {
        let state = ended(TerminationReason::DaysElapsed, None);
        assert_eq!(
            fallback_summary(&profile(), &state),
            fallback_summary(&profile(), &state)
        );
    }
}
