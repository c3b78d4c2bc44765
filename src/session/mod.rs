// Public API - what other modules can use
pub use cleanup_task::{start_cleanup_task, CleanupConfig};
pub use config::{AuthConfig, ConfigError, FailureHandler};
pub use handle::SessionHandle;
pub use middleware::authenticate;
pub use models::SessionRecord;
pub use params::RequestParams;
pub use repository::{InMemorySessionStore, PostgresSessionStore, SessionStore};
pub use service::AuthEngine;
pub use types::Authenticated;

// Internal modules
mod cleanup_task;
pub mod config;
mod handle;
mod middleware;
pub mod models;
pub mod params;
pub mod repository;
pub mod service;
mod token;
mod types;
