use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::data::SessionData;
use crate::errors::{Result, SessionError};

/// Trait for the server-side session row store.
///
/// Rows are keyed by an opaque server-generated id, never the puuid, so a
/// client-held reference carries nothing sensitive. Expired rows are
/// invisible to `get` and deleted lazily by it; `cleanup_expired` is an
/// opportunistic sweep, not a correctness requirement.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert a row with `expires_at = now + max_age`
    async fn save(
        &self,
        session_id: &str,
        data: &SessionData,
        max_age: chrono::Duration,
    ) -> Result<()>;

    /// Load a row if it exists and has not expired; deletes it if expired
    async fn get(&self, session_id: &str) -> Option<SessionData>;

    /// Unconditional removal, idempotent
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Bulk-delete expired rows, returning how many were removed
    async fn cleanup_expired(&self) -> Result<usize>;
}

#[derive(Debug, Clone)]
struct StoredRow {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

/// In-memory session store for tests and single-process use
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    rows: Arc<RwLock<HashMap<String, StoredRow>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live (unexpired) rows, for tests
    pub fn len(&self) -> usize {
        self.rows
            .read()
            .ok()
            .map(|rows| {
                rows.values()
                    .filter(|row| row.expires_at > Utc::now())
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(
        &self,
        session_id: &str,
        data: &SessionData,
        max_age: chrono::Duration,
    ) -> Result<()> {
        self.rows
            .write()
            .map_err(|_| SessionError::LockPoisoned)?
            .insert(
                session_id.to_string(),
                StoredRow {
                    data: data.clone(),
                    expires_at: Utc::now() + max_age,
                },
            );
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Option<SessionData> {
        let mut rows = self.rows.write().ok()?;
        match rows.get(session_id) {
            Some(row) if row.expires_at > Utc::now() => Some(row.data.clone()),
            Some(_) => {
                rows.remove(session_id);
                None
            }
            None => None,
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.rows
            .write()
            .map_err(|_| SessionError::LockPoisoned)?
            .remove(session_id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let mut rows = self.rows.write().map_err(|_| SessionError::LockPoisoned)?;
        let before = rows.len();
        rows.retain(|_, row| row.expires_at > Utc::now());
        Ok(before - rows.len())
    }
}
