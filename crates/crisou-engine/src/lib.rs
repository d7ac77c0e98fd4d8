//! The Crisou simulation engine.
//!
//! Turns a user profile into a multi-day crisis run and keeps the run's
//! state honest while an untrusted language model drives the story:
//!
//! - [`ScenarioGenerator`] builds the risk-adjusted day-1 state and asks the
//!   model for the opening narrative
//! - [`DecisionProcessor`] applies one decision per day: it validates the
//!   input, requests an outcome, repairs the proposed delta, clamps every
//!   value, and evaluates termination
//! - [`RecapGenerator`] writes closing advice, falling back to a
//!   deterministic summary when the model is unavailable
//! - [`SessionService`] wraps all three behind session-keyed calls with
//!   per-session exclusivity and all-or-nothing persistence
//!
//! The model and the store are seams ([`LanguageModel`], [`SessionStore`]);
//! the engine never performs network I/O itself.
//!
//! # Modules
//!
//! - [`config`] -- Catalogue, baselines, and bounds loaded from YAML
//! - [`error`] -- [`EngineError`] taxonomy
//! - [`profile`] -- Profile normalization and validation
//! - [`state`] -- Clamped mutation and termination rules
//! - [`delta`] -- Defensive parsing of model-proposed deltas
//! - [`model`] -- The [`LanguageModel`] seam and [`ScriptedModel`]
//! - [`scenario`], [`decision`], [`recap`] -- The three generators
//! - [`session`] -- [`SessionStore`], [`MemorySessionStore`], [`SessionService`]

pub mod config;
pub mod decision;
pub mod delta;
pub mod error;
pub mod model;
pub mod profile;
pub mod recap;
pub mod scenario;
pub mod session;
pub mod state;

pub use config::{ConfigError, EngineConfig};
pub use decision::{DecisionOutcome, DecisionProcessor};
pub use error::EngineError;
pub use model::{LanguageModel, ScriptedModel};
pub use recap::{Recap, RecapGenerator};
pub use scenario::{GeneratedScenario, ScenarioGenerator};
pub use session::{MemorySessionStore, SessionService, SessionStore};
