//! Mutation rules for [`SimulationState`].
//!
//! The engine is the only writer of simulation state and every write goes
//! through this module:
//!
//! - values are clamped into `0..=max`, never dropped
//! - `day` advances by exactly one per committed decision, together with
//!   one appended [`NarrativeEntry`]
//! - a terminated state is frozen; every mutation on it fails
//!
//! All arithmetic uses checked or saturating operations.

use crisou_types::{NarrativeEntry, SimulationState, TerminationReason};
use tracing::debug;

use crate::config::EngineConfig;
use crate::delta::ParsedDelta;
use crate::error::EngineError;

/// Apply a signed change to a bounded quantity, clamping into `0..=max`.
pub fn clamp_apply(current: u32, change: i64, max: u32) -> u32 {
    let next = i64::from(current).saturating_add(change);
    let clamped = next.clamp(0, i64::from(max));
    u32::try_from(clamped).unwrap_or(max)
}

/// Fail with [`EngineError::Terminated`] if the run has ended.
///
/// # Errors
///
/// Returns [`EngineError::Terminated`] when `state.terminated` is set.
pub const fn ensure_active(state: &SimulationState) -> Result<(), EngineError> {
    if state.terminated {
        return Err(EngineError::Terminated {
            reason: state.termination_reason,
        });
    }
    Ok(())
}

/// Commit one day: apply the delta, append the log entry, advance `day`.
///
/// The caller passes a working copy; on error the copy is discarded and the
/// original state is untouched.
///
/// # Errors
///
/// Returns [`EngineError::Terminated`] on a frozen state, or
/// [`EngineError::InvalidState`] if the day counter would overflow.
pub fn commit_day(
    state: &mut SimulationState,
    config: &EngineConfig,
    delta: &ParsedDelta,
    decision: &str,
    outcome: &str,
) -> Result<(), EngineError> {
    ensure_active(state)?;

    let next_day = state
        .day
        .checked_add(1)
        .ok_or_else(|| EngineError::InvalidState("day counter overflow".to_owned()))?;

    for (name, &change) in &delta.resources {
        let (Some(spec), Some(value)) = (config.resources.get(name), state.resources.get_mut(name))
        else {
            continue;
        };
        let updated = clamp_apply(*value, change, spec.max);
        log_clamp("resource", name, *value, change, updated);
        *value = updated;
    }

    for (name, &change) in &delta.status {
        let (Some(spec), Some(value)) = (config.status.get(name), state.status_flags.get_mut(name))
        else {
            continue;
        };
        let updated = clamp_apply(*value, change, spec.max);
        log_clamp("status", name, *value, change, updated);
        *value = updated;
    }

    for (member, condition) in &delta.household {
        if let Some(current) = state.household_status.get_mut(member) {
            current.clone_from(condition);
        }
    }

    let situation = std::mem::replace(&mut state.current_situation, outcome.to_owned());
    state.narrative_log.push(NarrativeEntry {
        day: state.day,
        situation,
        decision: decision.to_owned(),
        outcome: outcome.to_owned(),
    });
    state.day = next_day;

    Ok(())
}

/// Decide whether the run must end, in priority order.
///
/// 1. A resource below its critical floor (checked in name order)
/// 2. A status level below its critical floor (checked in name order)
/// 3. `day` has passed `simulation.max_days`, so every one of the
///    `max_days` days has had its decision
///
/// Returns the reason and, for critical failures, the offending key.
pub fn evaluate_termination(
    state: &SimulationState,
    config: &EngineConfig,
) -> Option<(TerminationReason, Option<String>)> {
    for (name, spec) in &config.resources {
        if let Some(floor) = spec.critical_floor(state.household_size)
            && state.resources.get(name).copied().unwrap_or(0) < floor
        {
            return Some((TerminationReason::CriticalResourceDepleted, Some(name.clone())));
        }
    }

    for (name, spec) in &config.status {
        if let Some(floor) = spec.critical_floor(1)
            && state.status_flags.get(name).copied().unwrap_or(0) < floor
        {
            return Some((TerminationReason::CriticalStatusFailure, Some(name.clone())));
        }
    }

    if state.day > config.simulation.max_days {
        return Some((TerminationReason::DaysElapsed, None));
    }

    None
}

/// Freeze the state with the given reason.
///
/// # Errors
///
/// Returns [`EngineError::Terminated`] if already frozen, or
/// [`EngineError::InvalidState`] if `reason` is [`TerminationReason::None`].
pub fn finalize(
    state: &mut SimulationState,
    reason: TerminationReason,
    detail: Option<String>,
) -> Result<(), EngineError> {
    ensure_active(state)?;
    if reason == TerminationReason::None {
        return Err(EngineError::InvalidState(
            "cannot terminate without a reason".to_owned(),
        ));
    }
    state.terminated = true;
    state.termination_reason = reason;
    state.termination_detail = detail;
    Ok(())
}

fn log_clamp(kind: &str, name: &str, before: u32, change: i64, after: u32) {
    let unclamped = i64::from(before).saturating_add(change);
    if unclamped != i64::from(after) {
        debug!(
            kind,
            name,
            before,
            change,
            after,
            "delta clamped to bound"
        );
    }
}
