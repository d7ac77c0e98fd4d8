//! Opening-scenario generation.
//!
//! Builds the day-1 [`SimulationState`] from a profile and asks the language
//! model for the opening narrative. The baseline is risk-adjusted:
//!
//! 1. Start from each catalogue entry's `baseline`
//! 2. Remove `household.per_member_consumption` for every member beyond the user
//! 3. Add the adjustments of every location keyword found in the profile location
//! 4. Add the adjustments of every recognized vulnerability tag
//! 5. Clamp into `0..=max`
//!
//! Generation is all-or-nothing: if the model fails, no state is returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use crisou_types::{
    ModelReply, ModelRequest, Profile, ScenarioContext, SimulationState, TerminationReason,
};
use tracing::{debug, info, warn};

use crate::config::{Adjustment, EngineConfig, QuantitySpec};
use crate::error::EngineError;
use crate::model::{LanguageModel, complete_with_timeout};
use crate::profile::validate_profile;
use crate::state::clamp_apply;

/// The result of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScenario {
    /// The normalized profile the scenario was built from.
    pub profile: Profile,
    /// The day-1 state.
    pub state: SimulationState,
    /// The opening narrative.
    pub narrative: String,
}

/// Builds initial simulation states.
pub struct ScenarioGenerator<M> {
    config: Arc<EngineConfig>,
    model: Arc<M>,
}

impl<M: LanguageModel> ScenarioGenerator<M> {
    /// Create a generator over the given configuration and model.
    pub const fn new(config: Arc<EngineConfig>, model: Arc<M>) -> Self {
        Self { config, model }
    }

    /// Validate the profile, compute the baseline, and request the opening narrative.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for a bad profile, or
    /// [`EngineError::GenerationFailure`] if the model is unavailable or
    /// returns no usable narrative.
    pub async fn generate(&self, profile: Profile) -> Result<GeneratedScenario, EngineError> {
        let profile = validate_profile(profile)?;
        let mut state = self.baseline(&profile);

        let request = ModelRequest::Scenario(ScenarioContext {
            profile: profile.clone(),
            resources: state.resources.clone(),
            status_flags: state.status_flags.clone(),
            max_days: self.config.simulation.max_days,
        });

        let reply =
            complete_with_timeout(self.model.as_ref(), &request, self.config.model_timeout()).await;
        let narrative = required_narrative(reply)?;

        state.current_situation.clone_from(&narrative);

        info!(
            location = %profile.location,
            household_size = state.household_size,
            vulnerabilities = profile.vulnerabilities.len(),
            "scenario generated"
        );

        Ok(GeneratedScenario {
            profile,
            state,
            narrative,
        })
    }

    /// Compute the risk-adjusted day-1 state for a validated profile.
    pub fn baseline(&self, profile: &Profile) -> SimulationState {
        let household_size = profile.household_size();
        let extra_members = i64::from(household_size.saturating_sub(1));
        let location = profile.location.to_lowercase();

        let mut adjustments: Vec<&Adjustment> = self
            .config
            .locations
            .iter()
            .filter(|(keyword, _)| location.contains(keyword.to_lowercase().as_str()))
            .map(|(keyword, adjustment)| {
                debug!(keyword = %keyword, "location adjustment applies");
                adjustment
            })
            .collect();

        for tag in &profile.vulnerabilities {
            if let Some(adjustment) = self.config.vulnerabilities.get(tag) {
                adjustments.push(adjustment);
            } else {
                debug!(tag = %tag, "no baseline adjustment for vulnerability");
            }
        }

        let consumption = |name: &str| {
            let per_member = self
                .config
                .household
                .per_member_consumption
                .get(name)
                .copied()
                .unwrap_or(0);
            i64::from(per_member)
                .saturating_mul(extra_members)
                .saturating_neg()
        };
        let resources = adjusted(&self.config.resources, &adjustments, consumption, |a| {
            &a.resources
        });
        let status_flags = adjusted(&self.config.status, &adjustments, |_| 0, |a| &a.status);

        let state = SimulationState {
            day: 1,
            household_size,
            resources,
            status_flags,
            household_status: profile
                .household
                .iter()
                .map(|member| (member.name.clone(), "safe".to_owned()))
                .collect(),
            current_situation: String::new(),
            narrative_log: Vec::new(),
            terminated: false,
            termination_reason: TerminationReason::None,
            termination_detail: None,
        };

        if let Some((reason, detail)) = crate::state::evaluate_termination(&state, &self.config) {
            warn!(
                reason = %reason,
                detail = detail.as_deref().unwrap_or(""),
                "baseline already breaches a termination condition"
            );
        }

        state
    }
}

fn adjusted(
    catalogue: &BTreeMap<String, QuantitySpec>,
    adjustments: &[&Adjustment],
    household_change: impl Fn(&str) -> i64,
    section: impl Fn(&Adjustment) -> &BTreeMap<String, i64>,
) -> BTreeMap<String, u32> {
    catalogue
        .iter()
        .map(|(name, spec)| {
            let total = adjustments
                .iter()
                .filter_map(|a| section(*a).get(name))
                .fold(household_change(name), |acc, &change| acc.saturating_add(change));
            (name.clone(), clamp_apply(spec.baseline, total, spec.max))
        })
        .collect()
}

/// Extract a non-blank narrative or fail the generation.
pub(crate) fn required_narrative(reply: ModelReply) -> Result<String, EngineError> {
    let narrative = match reply {
        ModelReply::Complete { narrative, .. } => narrative,
        ModelReply::Malformed {
            narrative: Some(narrative),
            ..
        } => {
            warn!("language model reply was malformed, using recovered narrative");
            narrative
        }
        ModelReply::Malformed {
            narrative: None, ..
        } => {
            return Err(EngineError::GenerationFailure(
                "language model reply contained no narrative".to_owned(),
            ));
        }
        ModelReply::Failure { reason } => return Err(EngineError::GenerationFailure(reason)),
    };

    let trimmed = narrative.trim();
    if trimmed.is_empty() {
        return Err(EngineError::GenerationFailure(
            "language model returned an empty narrative".to_owned(),
        ));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use std::collections::BTreeSet;

    use crisou_types::HouseholdMember;

    use super::*;
    use crate::model::ScriptedModel;

    fn profile(location: &str, members: usize, tags: &[&str]) -> Profile {
        Profile {
            name: "Camille".to_owned(),
            age: 34,
            location: location.to_owned(),
            household: (0..members)
                .map(|i| HouseholdMember {
                    name: format!("member-{i}"),
                    age: 30,
                    relationship: "family".to_owned(),
                })
                .collect(),
            vulnerabilities: tags.iter().map(|t| (*t).to_owned()).collect::<BTreeSet<_>>(),
            occupation: None,
            work_environment: None,
        }
    }

    fn generator(model: ScriptedModel) -> ScenarioGenerator<ScriptedModel> {
        ScenarioGenerator::new(Arc::new(EngineConfig::default()), Arc::new(model))
    }

    #[test]
    fn plain_profile_gets_catalogue_baseline() {
        let g = generator(ScriptedModel::default());
        let state = g.baseline(&profile("Lyon", 0, &[]));
        let config = EngineConfig::default();
        for (name, spec) in &config.resources {
            assert_eq!(state.resources[name], spec.baseline);
        }
        for (name, spec) in &config.status {
            assert_eq!(state.status_flags[name], spec.baseline);
        }
        assert_eq!(state.day, 1);
        assert_eq!(state.household_size, 1);
        assert!(state.narrative_log.is_empty());
        assert!(!state.terminated);
    }

    #[test]
    fn larger_household_reduces_consumables() {
        let g = generator(ScriptedModel::default());
        let solo = g.baseline(&profile("Lyon", 0, &[]));
        let family = g.baseline(&profile("Lyon", 3, &[]));
        assert_eq!(family.resources["water"], solo.resources["water"] - 18);
        assert_eq!(family.resources["food"], solo.resources["food"] - 18);
        assert_eq!(family.resources["money"], solo.resources["money"]);
        assert_eq!(family.household_size, 4);
        assert_eq!(family.household_status.len(), 3);
        assert!(family.household_status.values().all(|s| s == "safe"));
    }

    #[test]
    fn location_and_vulnerabilities_adjust_baseline() {
        let g = generator(ScriptedModel::default());
        let state = g.baseline(&profile("Coastal Town", 0, &["flood-prone", "unknown-tag"]));
        // coastal: water -6, safety -10; flood-prone: water -4, shelter -20, safety -10
        assert_eq!(state.resources["water"], 30);
        assert_eq!(state.status_flags["safety"], 65);
        assert_eq!(state.status_flags["shelter"], 70);
        assert_eq!(state.status_flags["health"], 100);
    }

    #[test]
    fn adjustments_are_clamped() {
        let mut config = EngineConfig::default();
        config
            .vulnerabilities
            .get_mut("limited-savings")
            .unwrap()
            .resources
            .insert("money".to_owned(), -1_000_000);
        let g = ScenarioGenerator::new(Arc::new(config), Arc::new(ScriptedModel::default()));
        let state = g.baseline(&profile("Lyon", 0, &["limited-savings"]));
        assert_eq!(state.resources["money"], 0);
    }

    #[tokio::test]
    async fn generate_returns_state_and_narrative() {
        let model = ScriptedModel::new([ModelReply::narrative("  The river bursts its banks.  ")]);
        let g = generator(model);
        let scenario = g.generate(profile("river village", 1, &[])).await.unwrap();
        assert_eq!(scenario.narrative, "The river bursts its banks.");
        assert_eq!(scenario.state.current_situation, scenario.narrative);
        assert_eq!(scenario.state.day, 1);
        assert_eq!(scenario.profile.location, "river village");
    }

    #[tokio::test]
    async fn generate_sends_profile_and_baseline() {
        let model = Arc::new(ScriptedModel::new([ModelReply::narrative("Storm.")]));
        let g = ScenarioGenerator::new(Arc::new(EngineConfig::default()), Arc::clone(&model));
        let scenario = g.generate(profile("Lyon", 0, &[])).await.unwrap();
        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        let ModelRequest::Scenario(ctx) = &requests[0] else {
            panic!("expected scenario request");
        };
        assert_eq!(ctx.profile.name, "Camille");
        assert_eq!(ctx.resources, scenario.state.resources);
        assert_eq!(ctx.max_days, 10);
    }

    #[tokio::test]
    async fn model_failure_is_generation_failure() {
        let g = generator(ScriptedModel::new([ModelReply::failure("503 from provider")]));
        let err = g.generate(profile("Lyon", 0, &[])).await.unwrap_err();
        assert!(matches!(err, EngineError::GenerationFailure(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn blank_narrative_is_generation_failure() {
        let g = generator(ScriptedModel::new([ModelReply::narrative("   ")]));
        assert!(matches!(
            g.generate(profile("Lyon", 0, &[])).await,
            Err(EngineError::GenerationFailure(_))
        ));
    }

    #[tokio::test]
    async fn malformed_without_narrative_is_generation_failure() {
        let g = generator(ScriptedModel::new([ModelReply::Malformed {
            narrative: None,
            delta: crisou_types::RawDelta::default(),
        }]));
        assert!(matches!(
            g.generate(profile("Lyon", 0, &[])).await,
            Err(EngineError::GenerationFailure(_))
        ));
    }

    #[tokio::test]
    async fn invalid_profile_never_reaches_model() {
        let model = Arc::new(ScriptedModel::new([ModelReply::narrative("unused")]));
        let g = ScenarioGenerator::new(Arc::new(EngineConfig::default()), Arc::clone(&model));
        let mut p = profile("Lyon", 0, &[]);
        p.name = " ".to_owned();
        assert!(matches!(g.generate(p).await, Err(EngineError::Validation(_))));
        assert!(model.requests().is_empty());
    }
}
