//! REST API endpoint handlers for the Crisou server.
//!
//! Handlers are thin: they extract the request, call one
//! [`SessionService`](crisou_engine::SessionService) operation, and shape
//! the reply. Every failure goes through [`ApiError`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/health` | Liveness probe |
//! | `POST` | `/api/crisis/scenario` | Start a session from a profile |
//! | `POST` | `/api/crisis/decision` | Apply one decision |
//! | `POST` | `/api/crisis/quit` | End a session early |
//! | `POST` | `/api/crisis/advice` | Closing advice for an ended session |
//! | `GET` | `/api/crisis/sessions/{id}` | Stored session record |
//! | `POST` | `/api/chat` | Free-form preparedness chat |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use crisou_engine::{LanguageModel, SessionStore};
use crisou_types::{
    ChatMessage, Profile, SessionId, SessionRecord, SimulationState, TerminationReason,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Outcome text returned when the user ends a run.
const QUIT_NARRATIVE: &str = "You ended the simulation.";

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/crisis/decision`.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// Session to advance.
    pub session_id: SessionId,
    /// The user's free-text decision for the current day.
    pub decision: String,
}

/// Body of the requests that only name a session.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    /// Target session.
    pub session_id: SessionId,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,
}

/// Reply to `POST /api/crisis/scenario`.
#[derive(Debug, Serialize)]
pub struct ScenarioResponse {
    /// Key for every later call on this run.
    pub session_id: SessionId,
    /// Day-1 state.
    pub state: SimulationState,
    /// Opening situation.
    pub narrative: String,
}

/// Reply to `POST /api/crisis/decision` and `POST /api/crisis/quit`.
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    /// State after the committed day.
    pub state: SimulationState,
    /// What happened as a result of the decision.
    pub outcome_narrative: String,
    /// Whether the run has ended.
    pub terminated: bool,
    /// Why the run ended, `none` while active.
    pub termination_reason: TerminationReason,
}

impl DecisionResponse {
    const fn new(state: SimulationState, outcome_narrative: String) -> Self {
        Self {
            terminated: state.terminated,
            termination_reason: state.termination_reason,
            state,
            outcome_narrative,
        }
    }
}

/// Reply to `POST /api/crisis/advice`.
#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    /// Closing advice.
    pub advice_text: String,
    /// Whether the advice is the deterministic summary rather than model text.
    pub fallback: bool,
}

/// Reply to `POST /api/chat`.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The assistant's answer.
    pub response: String,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API routes.
pub async fn index<M: LanguageModel, S: SessionStore>(
    State(state): State<Arc<AppState<M, S>>>,
) -> impl IntoResponse {
    let config = state.service.config();
    let max_days = config.simulation.max_days;
    let resources = config.resources.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
    let status = config.status.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
    let store = state.store_label;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Crisou</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #f0883e; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #f0883e; font-size: 1.2rem; font-weight: bold; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        code {{ color: #7ee787; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Crisou</h1>
    <p class="subtitle">Crisis preparedness simulation API</p>

    <p>Status: <span class="status">RUNNING</span></p>

    <div>
        <div class="metric"><div class="label">Days per run</div><div class="value">{max_days}</div></div>
        <div class="metric"><div class="label">Session store</div><div class="value">{store}</div></div>
        <div class="metric"><div class="label">Resources</div><div class="value">{resources}</div></div>
        <div class="metric"><div class="label">Status</div><div class="value">{status}</div></div>
    </div>

    <h2>API Endpoints</h2>
    <ul>
        <li><code>GET /api/health</code> -- Liveness probe</li>
        <li><code>POST /api/crisis/scenario</code> -- Start a session from a profile</li>
        <li><code>POST /api/crisis/decision</code> -- Apply one decision</li>
        <li><code>POST /api/crisis/quit</code> -- End a session early</li>
        <li><code>POST /api/crisis/advice</code> -- Closing advice</li>
        <li><code>GET /api/crisis/sessions/{{id}}</code> -- Stored session record</li>
        <li><code>POST /api/chat</code> -- Preparedness chat</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

// ---------------------------------------------------------------------------
// Crisis session endpoints
// ---------------------------------------------------------------------------

/// Validate a profile, generate the opening scenario, and store a new session.
pub async fn start_scenario<M: LanguageModel, S: SessionStore>(
    State(state): State<Arc<AppState<M, S>>>,
    Json(profile): Json<Profile>,
) -> Result<Json<ScenarioResponse>, ApiError> {
    let record = state.service.start(profile).await?;
    info!(session_id = %record.id, location = %record.profile.location, "scenario served");

    Ok(Json(ScenarioResponse {
        session_id: record.id,
        state: record.state,
        narrative: record.opening_narrative,
    }))
}

/// Apply the user's decision for the current day.
pub async fn decide<M: LanguageModel, S: SessionStore>(
    State(state): State<Arc<AppState<M, S>>>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let outcome = state.service.decide(body.session_id, &body.decision).await?;
    Ok(Json(DecisionResponse::new(outcome.state, outcome.narrative)))
}

/// End an active session at the user's request.
pub async fn quit<M: LanguageModel, S: SessionStore>(
    State(state): State<Arc<AppState<M, S>>>,
    Json(body): Json<SessionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let ended = state.service.quit(body.session_id).await?;
    Ok(Json(DecisionResponse::new(ended, QUIT_NARRATIVE.to_owned())))
}

/// Closing advice for a terminated session.
pub async fn advice<M: LanguageModel, S: SessionStore>(
    State(state): State<Arc<AppState<M, S>>>,
    Json(body): Json<SessionRequest>,
) -> Result<Json<AdviceResponse>, ApiError> {
    let recap = state.service.advice(body.session_id).await?;
    Ok(Json(AdviceResponse {
        advice_text: recap.advice,
        fallback: recap.fallback,
    }))
}

/// Return the stored record for a session.
pub async fn get_session<M: LanguageModel, S: SessionStore>(
    State(state): State<Arc<AppState<M, S>>>,
    Path(id): Path<String>,
) -> Result<Json<SessionRecord>, ApiError> {
    let uuid = Uuid::parse_str(&id).map_err(|e| ApiError::InvalidSessionId(format!("{id}: {e}")))?;
    let record = state.service.session(SessionId::from(uuid)).await?;
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// POST /api/chat
// ---------------------------------------------------------------------------

/// Forward a preparedness conversation to the language model.
pub async fn chat<M: LanguageModel, S: SessionStore>(
    State(state): State<Arc<AppState<M, S>>>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = state.service.chat(body.messages).await?;
    Ok(Json(ChatResponse { response }))
}
