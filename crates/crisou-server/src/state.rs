//! Shared application state for the API server.
//!
//! [`AppState`] owns the [`SessionService`] every handler talks to. It is
//! generic over the language model and the session store so the same
//! router serves production traffic and scripted tests.

use crisou_engine::{LanguageModel, SessionService, SessionStore};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. Per-session exclusivity lives inside the service, so
/// handlers never lock anything themselves.
pub struct AppState<M, S> {
    /// Session-keyed simulation operations.
    pub service: SessionService<M, S>,
    /// Label of the session store, shown on the status page.
    pub store_label: &'static str,
}

impl<M: LanguageModel, S: SessionStore> AppState<M, S> {
    /// Wrap a service for serving.
    pub const fn new(service: SessionService<M, S>, store_label: &'static str) -> Self {
        Self {
            service,
            store_label,
        }
    }
}
