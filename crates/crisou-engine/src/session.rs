//! Session-keyed orchestration.
//!
//! [`SessionService`] is what the transport layer talks to. Every call names
//! its session explicitly; there is no ambient state. Per session, calls are
//! serialized by an async mutex so day N+1 is never computed before day N
//! has been written. Each call reads the stored record, works on a copy, and
//! writes back only after the whole operation succeeded.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, PoisonError};

use chrono::Utc;
use crisou_types::{
    ChatContext, ChatMessage, ModelRequest, Profile, SessionId, SessionRecord, SimulationState,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::decision::{DecisionOutcome, DecisionProcessor};
use crate::error::EngineError;
use crate::model::{LanguageModel, complete_with_timeout};
use crate::recap::{Recap, RecapGenerator};
use crate::scenario::{ScenarioGenerator, required_narrative};

/// Read/replace persistence for session records.
pub trait SessionStore: Send + Sync + 'static {
    /// Fetch a record, or `None` if no session exists under `id`.
    fn get(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<SessionRecord>, EngineError>> + Send;

    /// Insert or replace a record.
    fn put(&self, record: &SessionRecord) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Insert a record that must not exist yet.
    fn create(
        &self,
        record: &SessionRecord,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// Process-local store. Records live as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: RwLock<BTreeMap<SessionId, SessionRecord>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, EngineError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn put(&self, record: &SessionRecord) -> Result<(), EngineError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn create(&self, record: &SessionRecord) -> Result<(), EngineError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(EngineError::Persistence(format!(
                "session {} already exists",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }
}

/// Runs scenario, decision, quit, and recap operations against stored sessions.
pub struct SessionService<M, S> {
    config: Arc<EngineConfig>,
    model: Arc<M>,
    store: Arc<S>,
    scenarios: ScenarioGenerator<M>,
    decisions: DecisionProcessor<M>,
    recaps: RecapGenerator<M>,
    locks: SessionLocks,
}

type SessionLocks = std::sync::Mutex<BTreeMap<SessionId, Arc<Mutex<()>>>>;

/// Exclusive hold on one session for the length of an operation.
///
/// The map entry is removed on drop once no other caller holds or waits on
/// it, so the map only ever contains sessions with work in flight.
struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    id: SessionId,
    entry: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&self.entry) <= 2 {
            locks.remove(&self.id);
        }
    }
}

impl<M: LanguageModel, S: SessionStore> SessionService<M, S> {
    /// Build a service after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is inconsistent.
    pub fn new(config: EngineConfig, model: Arc<M>, store: Arc<S>) -> Result<Self, EngineError> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            scenarios: ScenarioGenerator::new(Arc::clone(&config), Arc::clone(&model)),
            decisions: DecisionProcessor::new(Arc::clone(&config), Arc::clone(&model)),
            recaps: RecapGenerator::new(Arc::clone(&config), Arc::clone(&model)),
            config,
            model,
            store,
            locks: std::sync::Mutex::new(BTreeMap::new()),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate a scenario and persist it as a new session.
    pub async fn start(&self, profile: Profile) -> Result<SessionRecord, EngineError> {
        let scenario = self.scenarios.generate(profile).await?;
        let now = Utc::now();
        let record = SessionRecord {
            id: SessionId::new(),
            profile: scenario.profile,
            opening_narrative: scenario.narrative,
            state: scenario.state,
            advice: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create(&record).await?;
        info!(session_id = %record.id, "session started");
        Ok(record)
    }

    /// Apply a decision to a session and persist the result.
    pub async fn decide(
        &self,
        id: SessionId,
        decision: &str,
    ) -> Result<DecisionOutcome, EngineError> {
        let _session = self.lock(id).await;
        let mut record = self.load(id).await?;

        let outcome = self.decisions.apply(&record.state, decision).await?;
        record.state.clone_from(&outcome.state);
        record.updated_at = Utc::now();
        self.store.put(&record).await?;

        info!(
            session_id = %id,
            day = outcome.state.day,
            terminated = outcome.state.terminated,
            "decision committed"
        );
        Ok(outcome)
    }

    /// End a session at the user's request.
    pub async fn quit(&self, id: SessionId) -> Result<SimulationState, EngineError> {
        let _session = self.lock(id).await;
        let mut record = self.load(id).await?;

        let state = self.decisions.quit(&record.state)?;
        record.state.clone_from(&state);
        record.updated_at = Utc::now();
        self.store.put(&record).await?;

        info!(session_id = %id, day = state.day, "session quit");
        Ok(state)
    }

    /// Closing advice for a terminated session.
    ///
    /// Model advice is cached on the record; a fallback recap is returned
    /// without caching so a later call may still get model advice.
    pub async fn advice(&self, id: SessionId) -> Result<Recap, EngineError> {
        let _session = self.lock(id).await;
        let mut record = self.load(id).await?;

        if !record.state.terminated {
            return Err(EngineError::InvalidState(
                "advice is available once the simulation has ended".to_owned(),
            ));
        }
        if let Some(advice) = &record.advice {
            return Ok(Recap {
                advice: advice.clone(),
                fallback: false,
            });
        }

        let recap = self.recaps.recap(&record.profile, &record.state).await;
        if !recap.fallback {
            record.advice = Some(recap.advice.clone());
            record.updated_at = Utc::now();
            if let Err(e) = self.store.put(&record).await {
                warn!(session_id = %id, error = %e, "failed to cache advice");
            }
        }
        Ok(recap)
    }

    /// The stored record for a session.
    pub async fn session(&self, id: SessionId) -> Result<SessionRecord, EngineError> {
        self.load(id).await
    }

    /// Forward a free-form conversation to the model.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, EngineError> {
        if messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(EngineError::Validation(
                "chat needs at least one non-empty message".to_owned(),
            ));
        }
        let request = ModelRequest::Chat(ChatContext { messages });
        let reply =
            complete_with_timeout(self.model.as_ref(), &request, self.config.model_timeout()).await;
        required_narrative(reply)
    }

    async fn load(&self, id: SessionId) -> Result<SessionRecord, EngineError> {
        self.store
            .get(id)
            .await?
            .ok_or(EngineError::SessionNotFound(id))
    }

    async fn lock(&self, id: SessionId) -> SessionGuard<'_> {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id).or_default())
        };
        let mut session = SessionGuard {
            locks: &self.locks,
            id,
            entry,
            guard: None,
        };
        session.guard = Some(Arc::clone(&session.entry).lock_owned().await);
        session
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
