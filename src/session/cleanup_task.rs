use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::service::AuthEngine;

/// Configuration for the expired-session sweep
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to sweep the store
    pub cleanup_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(10 * 60), // 10 minutes
        }
    }
}

/// Periodically removes expired sessions from the engine's store. Runs until the
/// task is dropped; a failed sweep is logged and retried on the next tick.
#[instrument(skip(engine))]
pub async fn start_cleanup_task(engine: Arc<AuthEngine>, config: CleanupConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        "Starting session cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;

        if let Err(e) = engine.cleanup_expired_sessions().await {
            error!(error = %e, "Session cleanup task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::AuthConfig;
    use crate::session::repository::InMemorySessionStore;
    use crate::shared::test_utils::FailingSessionStore;

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_sweeps_expired_sessions() {
        let store = Arc::new(InMemorySessionStore::new());
        let engine = Arc::new(
            AuthEngine::new(AuthConfig::new(store.clone()).with_max_age(Duration::from_secs(30)))
                .unwrap(),
        );
        for _ in 0..5 {
            engine.issue_session("4567890").await.unwrap();
        }

        let task = tokio::spawn(start_cleanup_task(
            engine,
            CleanupConfig {
                cleanup_interval: Duration::from_secs(60),
            },
        ));

        // second tick at 60s finds every session past its 30s max age
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.session_count(), 0);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_survives_store_errors() {
        let engine =
            Arc::new(AuthEngine::new(AuthConfig::new(Arc::new(FailingSessionStore))).unwrap());

        let task = tokio::spawn(start_cleanup_task(
            engine,
            CleanupConfig {
                cleanup_interval: Duration::from_secs(1),
            },
        ));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!task.is_finished());

        task.abort();
    }
}
