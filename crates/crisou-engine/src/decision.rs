//! The decision state machine.
//!
//! [`DecisionProcessor::apply`] turns `(state, decision)` into the next state:
//!
//! ```text
//! Active(n) --decision--> Active(n + 1)        success, no termination condition
//! Active(n) --decision--> Terminated(reason)   success, a condition now holds
//! Active(n) --decision--> Active(n)            validation or model failure
//! Terminated(reason)      absorbing; every apply fails
//! ```
//!
//! The processor never mutates its input. It works on a clone and hands the
//! finished state back, so a failure at any step leaves the caller's state
//! exactly as it was.

use std::sync::Arc;

use crisou_types::{
    DecisionContext, ModelReply, ModelRequest, RawDelta, SimulationState, TerminationReason,
};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::delta::parse_delta;
use crate::error::EngineError;
use crate::model::{LanguageModel, complete_with_timeout};
use crate::state::{commit_day, ensure_active, evaluate_termination, finalize};

/// The result of an accepted decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    /// The state after the day was committed (possibly terminated).
    pub state: SimulationState,
    /// The model's outcome narrative.
    pub narrative: String,
    /// Delta fields that were unreadable and applied as zero.
    pub repaired: Vec<String>,
}

/// Applies user decisions to simulation states.
pub struct DecisionProcessor<M> {
    config: Arc<EngineConfig>,
    model: Arc<M>,
}

impl<M: LanguageModel> DecisionProcessor<M> {
    /// Create a processor over the given configuration and model.
    pub const fn new(config: Arc<EngineConfig>, model: Arc<M>) -> Self {
        Self { config, model }
    }

    /// Resolve one decision against `state`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Terminated`] if the run has ended
    /// - [`EngineError::Validation`] for an empty or oversized decision
    /// - [`EngineError::GenerationFailure`] if the model produced no usable outcome
    pub async fn apply(
        &self,
        state: &SimulationState,
        decision: &str,
    ) -> Result<DecisionOutcome, EngineError> {
        ensure_active(state)?;
        let decision = self.check_decision(decision)?;

        let request = ModelRequest::Decision(self.context(state, decision));
        let reply =
            complete_with_timeout(self.model.as_ref(), &request, self.config.model_timeout()).await;
        let (narrative, raw) = usable_outcome(reply)?;

        let delta = parse_delta(&raw, &self.config, &state.household_status);
        let mut next = state.clone();
        commit_day(&mut next, &self.config, &delta, decision, &narrative)?;

        if let Some((reason, detail)) = evaluate_termination(&next, &self.config) {
            info!(
                day = next.day,
                reason = %reason,
                detail = detail.as_deref().unwrap_or(""),
                "simulation terminated"
            );
            finalize(&mut next, reason, detail)?;
        } else {
            info!(day = next.day, "decision applied");
        }

        Ok(DecisionOutcome {
            state: next,
            narrative,
            repaired: delta.repaired,
        })
    }

    /// End an active run at the user's request. No model call is made.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Terminated`] if the run has already ended.
    #[allow(clippy::unused_self)]
    pub fn quit(&self, state: &SimulationState) -> Result<SimulationState, EngineError> {
        let mut next = state.clone();
        finalize(&mut next, TerminationReason::UserQuit, None)?;
        info!(day = next.day, "simulation ended by user");
        Ok(next)
    }

    fn check_decision<'a>(&self, decision: &'a str) -> Result<&'a str, EngineError> {
        let decision = decision.trim();
        if decision.is_empty() {
            return Err(EngineError::Validation("decision must not be empty".to_owned()));
        }
        let limit = self.config.simulation.max_decision_chars;
        if decision.chars().count() > limit {
            return Err(EngineError::Validation(format!(
                "decision exceeds {limit} characters"
            )));
        }
        Ok(decision)
    }

    fn context(&self, state: &SimulationState, decision: &str) -> DecisionContext {
        let window = self.config.simulation.context_window;
        let skip = state.narrative_log.len().saturating_sub(window);
        DecisionContext {
            day: state.day,
            max_days: self.config.simulation.max_days,
            resources: state.resources.clone(),
            status_flags: state.status_flags.clone(),
            household_status: state.household_status.clone(),
            situation: state.current_situation.clone(),
            recent_events: state.narrative_log.iter().skip(skip).cloned().collect(),
            decision: decision.to_owned(),
        }
    }
}

fn usable_outcome(reply: ModelReply) -> Result<(String, RawDelta), EngineError> {
    let (narrative, delta) = match reply {
        ModelReply::Complete { narrative, delta } => (narrative, delta),
        ModelReply::Malformed {
            narrative: Some(narrative),
            delta,
        } => {
            warn!("decision reply was malformed, applying the readable fields");
            (narrative, delta)
        }
        ModelReply::Malformed {
            narrative: None, ..
        } => {
            return Err(EngineError::GenerationFailure(
                "decision reply contained no outcome narrative".to_owned(),
            ));
        }
        ModelReply::Failure { reason } => return Err(EngineError::GenerationFailure(reason)),
    };

    let narrative = narrative.trim();
    if narrative.is_empty() {
        return Err(EngineError::GenerationFailure(
            "language model returned an empty outcome".to_owned(),
        ));
    }
    Ok((narrative.to_owned(), delta))
}
