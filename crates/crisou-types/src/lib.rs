//! Shared type definitions for the Crisou crisis-preparedness simulation.
//!
//! This crate is the single source of truth for every data structure that
//! crosses a crate boundary: the user [`Profile`], the per-session
//! [`SimulationState`], the persisted [`SessionRecord`], and the request and
//! reply shapes exchanged with the external language model.
//!
//! All types derive `Serialize`/`Deserialize` for JSON transport and `TS`
//! for TypeScript binding generation consumed by the web frontend.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers ([`SessionId`])
//! - [`model`] -- Language model contract ([`ModelRequest`], [`ModelReply`], [`RawDelta`])
//! - [`profile`] -- User and household input ([`Profile`], [`HouseholdMember`])
//! - [`state`] -- Simulation state and narrative log ([`SimulationState`], [`NarrativeEntry`])

pub mod ids;
pub mod model;
pub mod profile;
pub mod state;

pub use ids::SessionId;
pub use model::{
    ChatContext, ChatMessage, ChatRole, DecisionContext, ModelReply, ModelRequest, RawDelta,
    RecapContext, ScenarioContext,
};
pub use profile::{HouseholdMember, Profile};
pub use state::{NarrativeEntry, SessionRecord, SimulationState, TerminationReason};
