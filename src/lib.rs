// Library crate for the token gate
// This file exposes the public API for the binary and integration tests

pub mod demo;
pub mod session;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use session::{
    authenticate, start_cleanup_task, AuthConfig, AuthEngine, Authenticated, CleanupConfig,
    ConfigError, InMemorySessionStore, PostgresSessionStore, RequestParams, SessionHandle,
    SessionRecord, SessionStore,
};
pub use shared::{AppError, AppState, StoreError};
