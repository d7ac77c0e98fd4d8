//! Axum router construction for the Crisou API.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware
//! enabled for the browser frontend.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use crisou_engine::{LanguageModel, SessionStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the Crisou server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /api/health` -- liveness probe
/// - `POST /api/crisis/scenario` -- start a session
/// - `POST /api/crisis/decision` -- apply one decision
/// - `POST /api/crisis/quit` -- end a session early
/// - `POST /api/crisis/advice` -- closing advice
/// - `GET /api/crisis/sessions/{id}` -- stored session record
/// - `POST /api/chat` -- preparedness chat
///
/// CORS allows any origin so the frontend can be served separately.
pub fn build_router<M: LanguageModel, S: SessionStore>(state: Arc<AppState<M, S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index::<M, S>))
        .route("/api/health", get(handlers::health))
        .route("/api/crisis/scenario", post(handlers::start_scenario::<M, S>))
        .route("/api/crisis/decision", post(handlers::decide::<M, S>))
        .route("/api/crisis/quit", post(handlers::quit::<M, S>))
        .route("/api/crisis/advice", post(handlers::advice::<M, S>))
        .route("/api/crisis/sessions/{id}", get(handlers::get_session::<M, S>))
        .route("/api/chat", post(handlers::chat::<M, S>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
