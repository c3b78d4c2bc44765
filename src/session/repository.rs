use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{types::Json, PgPool, Row};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::models::{SessionRecord, RESERVED_FIELDS};
use crate::shared::StoreError;

/// Key-value contract every session backend has to satisfy.
///
/// The store owns expiry: a record whose TTL has elapsed must be reported as absent.
/// `destroy` is idempotent, removing an unknown token succeeds.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;
    async fn set(&self, token: &str, record: &SessionRecord, ttl: Duration)
        -> Result<(), StoreError>;
    async fn destroy(&self, token: &str) -> Result<(), StoreError>;
    /// Deletes every expired record, returning how many were removed
    async fn cleanup_expired_sessions(&self) -> Result<u64, StoreError>;

    /// Field names the backend keeps for itself
    fn reserved_fields(&self) -> &'static [&'static str] {
        RESERVED_FIELDS
    }
}

// stands in for TTLs too large to represent as an Instant
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct StoredSession {
    record: SessionRecord,
    deadline: Instant,
}

/// In-memory session store for development and testing
///
/// Data is lost when the process exits. Expired entries are evicted on lookup and by
/// [`SessionStore::cleanup_expired_sessions`].
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries held, expired ones not yet swept included
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    pub fn has_session(&self, token: &str) -> bool {
        self.lock()
            .get(token)
            .is_some_and(|stored| stored.deadline > Instant::now())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredSession>> {
        // entries are replaced whole, a poisoned map is still consistent
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip(self, token))]
    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let mut sessions = self.lock();

        let expired = match sessions.get(token) {
            None => {
                debug!("Session not found in memory");
                return Ok(None);
            }
            Some(stored) => stored.deadline <= Instant::now(),
        };

        if expired {
            debug!("Session expired in memory, evicting");
            sessions.remove(token);
            return Ok(None);
        }

        debug!("Session found in memory");
        Ok(sessions.get(token).map(|stored| stored.record.clone()))
    }

    #[instrument(skip(self, token, record))]
    async fn set(
        &self,
        token: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let deadline = now.checked_add(ttl).unwrap_or(now + FAR_FUTURE);

        self.lock().insert(
            token.to_string(),
            StoredSession {
                record: record.clone(),
                deadline,
            },
        );

        debug!(ttl_secs = ttl.as_secs(), "Session stored in memory");
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        if self.lock().remove(token).is_none() {
            debug!("Destroy requested for unknown session, nothing to do");
        } else {
            debug!("Session destroyed in memory");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cleanup_expired_sessions(&self) -> Result<u64, StoreError> {
        let mut sessions = self.lock();
        let now = Instant::now();
        let initial_count = sessions.len();

        sessions.retain(|_, stored| stored.deadline > now);

        let removed_count = initial_count - sessions.len();
        debug!(
            expired_sessions_removed = removed_count,
            "Expired sessions cleaned up from memory"
        );
        Ok(removed_count as u64)
    }
}

/// PostgreSQL session store
///
/// Records live in `auth_sessions`; fields are kept as JSONB next to the expiry.
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the sessions table if it does not exist yet
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS auth_sessions (
                token TEXT PRIMARY KEY,
                data JSONB NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create auth_sessions table");
            StoreError::Backend(e.to_string())
        })?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    #[instrument(skip(self, token))]
    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        debug!("Fetching session from database");

        let row = sqlx::query(
            "SELECT data, expires_at FROM auth_sessions WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch session from database");
            StoreError::Backend(e.to_string())
        })?;

        let Some(row) = row else {
            debug!("Session not found in database");
            return Ok(None);
        };

        let data: Json<Map<String, Value>> = row
            .try_get("data")
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;

        debug!("Session found in database");
        Ok(Some(SessionRecord {
            id: token.to_string(),
            expires_at,
            fields: data.0,
        }))
    }

    #[instrument(skip(self, token, record))]
    async fn set(
        &self,
        token: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        sqlx::query(
            "INSERT INTO auth_sessions (token, data, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (token) DO UPDATE SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at",
        )
        .bind(token)
        .bind(Json(&record.fields))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to store session in database");
            StoreError::Backend(e.to_string())
        })?;

        debug!("Session stored in database");
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete session from database");
                StoreError::Backend(e.to_string())
            })?;

        debug!(
            rows_affected = result.rows_affected(),
            "Session destroy completed in database"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cleanup_expired_sessions(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to cleanup expired sessions");
                StoreError::Backend(e.to_string())
            })?;

        let rows_affected = result.rows_affected();
        debug!(
            expired_sessions_removed = rows_affected,
            "Expired sessions cleaned up from database"
        );
        Ok(rows_affected)
    }
}
