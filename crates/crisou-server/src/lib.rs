//! HTTP API server for the Crisou crisis-preparedness simulation.
//!
//! This crate exposes the simulation engine over JSON:
//!
//! - **Crisis endpoints** (`/api/crisis/*`) to start a session from a
//!   profile, apply daily decisions, quit, fetch closing advice, and
//!   inspect a stored session
//! - **Chat endpoint** (`/api/chat`) for free-form preparedness questions
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! Handlers delegate to a [`SessionService`](crisou_engine::SessionService)
//! held in [`AppState`]. The router is generic over the language model and
//! the session store; the binary wires in the HTTP model client and a
//! [`SessionBackend`] chosen from the environment, while tests use
//! scripted replies and an in-memory store.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod store;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
pub use store::SessionBackend;
