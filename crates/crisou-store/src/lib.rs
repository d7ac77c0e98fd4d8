//! Session persistence for Crisou.
//!
//! Provides [`DragonflySessionStore`], a [`SessionStore`](crisou_engine::SessionStore)
//! that keeps each session record as one JSON value in `Dragonfly`. The
//! in-memory store used for development and tests lives in `crisou-engine`.
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) session records
//! - [`error`] -- [`StoreError`]

pub mod dragonfly;
pub mod error;

pub use dragonfly::{DragonflySessionStore, session_key};
pub use error::StoreError;
