//! Runtime choice of session store.
//!
//! The binary picks the store from the environment at startup, so the
//! concrete type is not known at compile time. [`SessionBackend`]
//! dispatches through an enum rather than a trait object because the
//! [`SessionStore`] methods return `impl Future` and are not dyn-compatible.

use crisou_engine::{EngineError, MemorySessionStore, SessionStore};
use crisou_store::DragonflySessionStore;
use crisou_types::{SessionId, SessionRecord};

/// The session store selected at startup.
pub enum SessionBackend {
    /// Process-local records, lost on restart.
    Memory(MemorySessionStore),
    /// Records kept in `Dragonfly`.
    Dragonfly(DragonflySessionStore),
}

impl SessionBackend {
    /// Human-readable name for logging and the status page.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Dragonfly(_) => "dragonfly",
        }
    }
}

impl SessionStore for SessionBackend {
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, EngineError> {
        match self {
            Self::Memory(store) => store.get(id).await,
            Self::Dragonfly(store) => store.get(id).await,
        }
    }

    async fn put(&self, record: &SessionRecord) -> Result<(), EngineError> {
        match self {
            Self::Memory(store) => store.put(record).await,
            Self::Dragonfly(store) => store.put(record).await,
        }
    }

    async fn create(&self, record: &SessionRecord) -> Result<(), EngineError> {
        match self {
            Self::Memory(store) => store.create(record).await,
            Self::Dragonfly(store) => store.create(record).await,
        }
    }
}
