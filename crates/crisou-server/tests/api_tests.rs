//! Integration tests for the Crisou REST API.
//!
//! Uses `tower::ServiceExt::oneshot` to send requests directly to the
//! router without binding a TCP listener. The language model is a
//! [`ScriptedModel`] and sessions live in a [`MemorySessionStore`], so
//! every response is deterministic.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use crisou_engine::{EngineConfig, MemorySessionStore, ScriptedModel, SessionService};
use crisou_server::{AppState, build_router};
use crisou_types::{ModelReply, RawDelta};
use serde_json::{Value, json};
use tower::ServiceExt;

fn make_router(model: ScriptedModel) -> Router {
    let service = SessionService::new(
        EngineConfig::default(),
        Arc::new(model),
        Arc::new(MemorySessionStore::new()),
    )
    .unwrap();
    build_router(Arc::new(AppState::new(service, "memory")))
}

fn profile_json() -> Value {
    json!({
        "name": "Camille",
        "age": 41,
        "location": "Lyon",
        "household": [{"name": "Ana", "age": 9, "relationship": "daughter"}],
        "vulnerabilities": ["Chronic-Illness"],
    })
}

fn water_reply(narrative: &str, water: i64) -> ModelReply {
    ModelReply::Complete {
        narrative: narrative.to_owned(),
        delta: RawDelta {
            resources: serde_json::from_value(json!({"water": water})).unwrap(),
            ..RawDelta::default()
        },
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn start_session(router: &Router) -> String {
    let (status, json) = send(router, "POST", "/api/crisis/scenario", Some(profile_json())).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["session_id"].as_str().unwrap().to_owned()
}

// =========================================================================
// Status
// =========================================================================

#[tokio::test]
async fn test_index_returns_html() {
    let router = make_router(ScriptedModel::default());

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_health() {
    let router = make_router(ScriptedModel::default());
    let (status, json) = send(&router, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

// =========================================================================
// Scenario
// =========================================================================

#[tokio::test]
async fn test_scenario_starts_on_day_one() {
    let router = make_router(ScriptedModel::new([ModelReply::narrative(
        "A heatwave strains the water network.",
    )]));

    let (status, json) = send(&router, "POST", "/api/crisis/scenario", Some(profile_json())).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["session_id"].is_string());
    assert_eq!(json["narrative"], "A heatwave strains the water network.");
    assert_eq!(json["state"]["day"], 1);
    assert_eq!(json["state"]["household_size"], 2);
    assert_eq!(json["state"]["household_status"]["Ana"], "safe");
    assert_eq!(json["state"]["terminated"], false);
    assert_eq!(json["state"]["narrative_log"], json!([]));
}

#[tokio::test]
async fn test_scenario_rejects_invalid_profile() {
    let router = make_router(ScriptedModel::default());
    let mut profile = profile_json();
    profile["age"] = json!(0);

    let (status, json) = send(&router, "POST", "/api/crisis/scenario", Some(profile)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
    assert_eq!(json["retryable"], false);
}

#[tokio::test]
async fn test_scenario_model_failure_is_retryable() {
    let router = make_router(ScriptedModel::new([ModelReply::failure("upstream 503")]));

    let (status, json) = send(&router, "POST", "/api/crisis/scenario", Some(profile_json())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["kind"], "generation_failure");
    assert_eq!(json["retryable"], true);
    assert_eq!(json["status"], 502);
}

// =========================================================================
// Decision
// =========================================================================

#[tokio::test]
async fn test_decision_advances_one_day() {
    let router = make_router(ScriptedModel::new([
        ModelReply::narrative("The taps run dry."),
        water_reply("You fill bottles at the fountain.", 4),
    ]));
    let id = start_session(&router).await;

    let (status, json) = send(
        &router,
        "POST",
        "/api/crisis/decision",
        Some(json!({"session_id": id, "decision": "Fill bottles at the fountain"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["outcome_narrative"], "You fill bottles at the fountain.");
    assert_eq!(json["state"]["day"], 2);
    assert_eq!(json["terminated"], false);
    assert_eq!(json["termination_reason"], "none");
    assert_eq!(json["state"]["narrative_log"][0]["decision"], "Fill bottles at the fountain");
}

#[tokio::test]
async fn test_empty_decision_is_rejected_without_side_effects() {
    let router = make_router(ScriptedModel::new([ModelReply::narrative("Quiet morning.")]));
    let id = start_session(&router).await;

    let (status, json) = send(
        &router,
        "POST",
        "/api/crisis/decision",
        Some(json!({"session_id": id, "decision": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");

    let (_, record) = send(&router, "GET", &format!("/api/crisis/sessions/{id}"), None).await;
    assert_eq!(record["state"]["day"], 1);
}

#[tokio::test]
async fn test_failed_decision_leaves_session_unchanged() {
    let router = make_router(ScriptedModel::new([
        ModelReply::narrative("Storm warning."),
        ModelReply::failure("timeout"),
    ]));
    let id = start_session(&router).await;

    let (status, json) = send(
        &router,
        "POST",
        "/api/crisis/decision",
        Some(json!({"session_id": id, "decision": "Board up the windows"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["retryable"], true);

    let (_, record) = send(&router, "GET", &format!("/api/crisis/sessions/{id}"), None).await;
    assert_eq!(record["state"]["day"], 1);
    assert_eq!(record["state"]["narrative_log"], json!([]));
}

#[tokio::test]
async fn test_decision_unknown_session_is_not_found() {
    let router = make_router(ScriptedModel::default());

    let (status, json) = send(
        &router,
        "POST",
        "/api/crisis/decision",
        Some(json!({"session_id": "018f2a4e-0000-7000-8000-000000000000", "decision": "Wait"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "session_not_found");
}

// =========================================================================
// Quit and advice
// =========================================================================

#[tokio::test]
async fn test_quit_then_decision_conflicts() {
    let router = make_router(ScriptedModel::new([ModelReply::narrative("Power cut.")]));
    let id = start_session(&router).await;

    let (status, json) = send(&router, "POST", "/api/crisis/quit", Some(json!({"session_id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["terminated"], true);
    assert_eq!(json["termination_reason"], "user_quit");
    assert_eq!(json["state"]["day"], 1);

    let (status, json) = send(
        &router,
        "POST",
        "/api/crisis/decision",
        Some(json!({"session_id": id, "decision": "Light candles"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "terminated");

    let (status, _) = send(&router, "POST", "/api/crisis/quit", Some(json!({"session_id": id}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_advice_requires_ended_session() {
    let router = make_router(ScriptedModel::new([ModelReply::narrative("Snowstorm.")]));
    let id = start_session(&router).await;

    let (status, json) = send(&router, "POST", "/api/crisis/advice", Some(json!({"session_id": id}))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "invalid_state");
}

#[tokio::test]
async fn test_advice_is_cached_on_the_session() {
    let router = make_router(ScriptedModel::new([
        ModelReply::narrative("Flood alert."),
        ModelReply::narrative("Keep a three-day water reserve per person."),
    ]));
    let id = start_session(&router).await;
    send(&router, "POST", "/api/crisis/quit", Some(json!({"session_id": id}))).await;

    let (status, first) = send(&router, "POST", "/api/crisis/advice", Some(json!({"session_id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["fallback"], false);
    assert_eq!(first["advice_text"], "Keep a three-day water reserve per person.");

    // The scripted queue is empty now; a second call must come from the record.
    let (status, second) = send(&router, "POST", "/api/crisis/advice", Some(json!({"session_id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["advice_text"], first["advice_text"]);

    let (_, record) = send(&router, "GET", &format!("/api/crisis/sessions/{id}"), None).await;
    assert_eq!(record["advice"], first["advice_text"]);
}

#[tokio::test]
async fn test_advice_falls_back_when_model_fails() {
    let router = make_router(ScriptedModel::new([ModelReply::narrative("Flood alert.")]));
    let id = start_session(&router).await;
    send(&router, "POST", "/api/crisis/quit", Some(json!({"session_id": id}))).await;

    let (status, json) = send(&router, "POST", "/api/crisis/advice", Some(json!({"session_id": id}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["fallback"], true);
    let text = json["advice_text"].as_str().unwrap();
    assert!(text.contains("Camille"));
    assert!(text.contains("Lyon"));
}

// =========================================================================
// Session inspection
// =========================================================================

#[tokio::test]
async fn test_get_session_returns_record() {
    let router = make_router(ScriptedModel::new([ModelReply::narrative("Heatwave.")]));
    let id = start_session(&router).await;

    let (status, json) = send(&router, "GET", &format!("/api/crisis/sessions/{id}"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id.as_str());
    assert_eq!(json["opening_narrative"], "Heatwave.");
    assert_eq!(json["profile"]["vulnerabilities"], json!(["chronic-illness"]));
    assert!(json["advice"].is_null());
}

#[tokio::test]
async fn test_get_session_invalid_id() {
    let router = make_router(ScriptedModel::default());
    let (status, json) = send(&router, "GET", "/api/crisis/sessions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
}

// =========================================================================
// Chat
// =========================================================================

#[tokio::test]
async fn test_chat_returns_model_text() {
    let router = make_router(ScriptedModel::new([ModelReply::narrative(
        "Plan for at least three litres per person per day.",
    )]));

    let (status, json) = send(
        &router,
        "POST",
        "/api/chat",
        Some(json!({"messages": [{"role": "user", "content": "How much water should I store?"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["response"], "Plan for at least three litres per person per day.");
}

#[tokio::test]
async fn test_chat_failure_is_bad_gateway() {
    let router = make_router(ScriptedModel::new([ModelReply::failure("rate limited")]));

    let (status, json) = send(
        &router,
        "POST",
        "/api/chat",
        Some(json!({"messages": [{"role": "user", "content": "Hello"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["kind"], "generation_failure");
}
