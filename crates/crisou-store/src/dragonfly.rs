//! `Dragonfly` (Redis-compatible) session persistence.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `crisou:session:{id}` | JSON | Full [`SessionRecord`] |
//!
//! Each record is written whole, so a `put` either replaces the previous
//! record or leaves it untouched.

use std::time::Duration;

use crisou_engine::{EngineError, SessionStore};
use crisou_types::{SessionId, SessionRecord};
use fred::prelude::*;

use crate::error::StoreError;

/// Key under which a session record is stored.
pub fn session_key(id: SessionId) -> String {
    format!("crisou:session:{id}")
}

/// Session store over a `Dragonfly` connection.
#[derive(Clone)]
pub struct DragonflySessionStore {
    client: Client,
    ttl: Option<Duration>,
}

impl DragonflySessionStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`. With a `ttl`, every
    /// write refreshes the record's expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str, ttl: Option<Duration>) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!(ttl_secs = ttl.map(|t| t.as_secs()), "Connected to Dragonfly");
        Ok(Self { client, ttl })
    }

    fn expiration(&self) -> Option<Expiration> {
        self.ttl
            .map(|ttl| Expiration::EX(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1)))
    }

    /// Read and deserialize a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read or deserialization fails.
    pub async fn load(&self, id: SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let value: Option<String> = self.client.get(session_key(id)).await?;
        value
            .map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }

    /// Serialize and write a record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the write fails.
    pub async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let _: () = self
            .client
            .set(session_key(record.id), json.as_str(), self.expiration(), None, false)
            .await?;
        Ok(())
    }

    /// Write a record only if no record exists under its key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the key is taken.
    pub async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let key = session_key(record.id);
        let json = serde_json::to_string(record)?;
        let written: Option<String> = self
            .client
            .set(key.as_str(), json.as_str(), self.expiration(), Some(SetOptions::NX), false)
            .await?;
        if written.is_none() {
            return Err(StoreError::AlreadyExists(key));
        }
        Ok(())
    }

    /// Delete a session record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        let _: u32 = self.client.del(session_key(id)).await?;
        Ok(())
    }
}

impl SessionStore for DragonflySessionStore {
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, EngineError> {
        Ok(self.load(id).await?)
    }

    async fn put(&self, record: &SessionRecord) -> Result<(), EngineError> {
        Ok(self.save(record).await?)
    }

    async fn create(&self, record: &SessionRecord) -> Result<(), EngineError> {
        Ok(self.insert(record).await?)
    }
}
