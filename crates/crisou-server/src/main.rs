//! Crisou API server binary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load the simulation catalogue (`CRISOU_CONFIG` or `crisou-config.yaml`)
//! 3. Build the language model client from `LLM_*` variables and templates
//! 4. Select the session store (`CRISOU_DRAGONFLY_URL` or in-memory)
//! 5. Serve HTTP until `Ctrl-C`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crisou_engine::{EngineConfig, MemorySessionStore, SessionService};
use crisou_llm::{LlmBackend, LlmConfig, ModelClient, PromptEngine};
use crisou_server::{AppState, ServerConfig, SessionBackend, start_server};
use crisou_store::DragonflySessionStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Config file read when `CRISOU_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "crisou-config.yaml";

/// Application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("crisou-server starting");

    let config = load_config()?;
    info!(
        max_days = config.simulation.max_days,
        resources = config.resources.len(),
        status = config.status.len(),
        model_timeout_ms = config.simulation.model_timeout_ms,
        "Simulation config loaded"
    );

    let llm_config = LlmConfig::from_env().context("language model configuration")?;
    let templates_dir =
        std::env::var("CRISOU_TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_owned());
    let prompts = PromptEngine::new(&templates_dir).context("prompt templates")?;
    let backend = LlmBackend::from_config(&llm_config);
    info!(
        backend = backend.name(),
        model = %llm_config.model,
        api_url = %llm_config.api_url,
        templates_dir = %templates_dir,
        "Language model ready"
    );
    let model = Arc::new(ModelClient::new(backend, prompts));

    let store = Arc::new(connect_store().await?);
    let store_label = store.label();
    info!(store = store_label, "Session store ready");

    let service = SessionService::new(config, model, store).context("simulation config")?;
    let state = Arc::new(AppState::new(service, store_label));

    let server_config = ServerConfig::from_env()?;
    start_server(&server_config, state).await?;

    info!("crisou-server stopped");
    Ok(())
}

/// Load the simulation catalogue.
///
/// An explicit `CRISOU_CONFIG` must exist. Without it the default path is
/// tried, then the built-in defaults.
fn load_config() -> anyhow::Result<EngineConfig> {
    if let Ok(path) = std::env::var("CRISOU_CONFIG") {
        return EngineConfig::from_file(Path::new(&path))
            .with_context(|| format!("loading {path}"));
    }
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        EngineConfig::from_file(default_path).with_context(|| format!("loading {DEFAULT_CONFIG_PATH}"))
    } else {
        info!("Config file not found, using defaults");
        Ok(EngineConfig::default())
    }
}

/// Connect to `Dragonfly` when `CRISOU_DRAGONFLY_URL` is set.
///
/// `CRISOU_SESSION_TTL_SECS` optionally expires idle sessions.
async fn connect_store() -> anyhow::Result<SessionBackend> {
    let Ok(url) = std::env::var("CRISOU_DRAGONFLY_URL") else {
        info!("CRISOU_DRAGONFLY_URL not set, sessions are kept in memory");
        return Ok(SessionBackend::Memory(MemorySessionStore::new()));
    };

    let ttl = match std::env::var("CRISOU_SESSION_TTL_SECS") {
        Ok(raw) => Some(Duration::from_secs(
            raw.parse()
                .with_context(|| format!("CRISOU_SESSION_TTL_SECS '{raw}'"))?,
        )),
        Err(_) => None,
    };

    let store = DragonflySessionStore::connect(&url, ttl)
        .await
        .with_context(|| format!("connecting to Dragonfly at {url}"))?;
    Ok(SessionBackend::Dragonfly(store))
}
