#![allow(dead_code)] // Not every test binary uses every mock

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokengate::{InMemorySessionStore, SessionRecord, SessionStore, StoreError};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Store whose backend is unreachable for every operation
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn get(&self, _token: &str) -> Result<Option<SessionRecord>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn set(
        &self,
        _token: &str,
        _record: &SessionRecord,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn destroy(&self, _token: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn cleanup_expired_sessions(&self) -> Result<u64, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

/// Store that serves reads from memory and counts (then rejects) every write
#[derive(Default)]
pub struct ReadOnlySessionStore {
    pub inner: InMemorySessionStore,
    pub rejected_writes: AtomicUsize,
}

impl ReadOnlySessionStore {
    pub fn rejected_writes(&self) -> usize {
        self.rejected_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for ReadOnlySessionStore {
    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.inner.get(token).await
    }

    async fn set(
        &self,
        _token: &str,
        _record: &SessionRecord,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        self.rejected_writes.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Backend("read-only replica".to_string()))
    }

    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        self.inner.destroy(token).await
    }

    async fn cleanup_expired_sessions(&self) -> Result<u64, StoreError> {
        self.inner.cleanup_expired_sessions().await
    }
}
