use tracing::{info, instrument, warn};

use super::{
    config::{AuthConfig, ConfigError},
    models::SessionRecord,
    token::generate_token,
    types::Authenticated,
};
use crate::shared::{AppError, StoreError};

/// Verifies tokens against claimed user ids and drives the session lifecycle.
///
/// Holds no session state of its own; the store is the only source of truth.
#[derive(Debug)]
pub struct AuthEngine {
    config: AuthConfig,
}

impl AuthEngine {
    /// Validates `config` and builds the engine. An invalid configuration never
    /// produces an engine.
    pub fn new(config: AuthConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            token_name = %config.token_name,
            user_id_name = %config.user_id_name,
            max_age_secs = config.max_age.as_secs(),
            "Auth engine configured"
        );

        Ok(Self { config })
    }

    pub fn token_name(&self) -> &str {
        &self.config.token_name
    }

    pub fn user_id_name(&self) -> &str {
        &self.config.user_id_name
    }

    /// Decides whether `token` proves the caller is `user_id`, handing back the
    /// verified identity and the stored record.
    ///
    /// Unknown, expired and mismatched tokens all go through the `unauthed` handler;
    /// only the logs tell them apart. Store failures are returned as they are.
    #[instrument(skip(self, token, user_id))]
    pub async fn verify(
        &self,
        token: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<(Authenticated, SessionRecord), AppError> {
        let Some(token) = token else {
            warn!(reason = "missing_token", "Rejecting request without token");
            return Err((self.config.notok)());
        };

        let Some(session) = self.config.store.get(token).await? else {
            warn!(reason = "unknown_token", "Rejecting unknown or expired token");
            return Err((self.config.unauthed)());
        };

        match (session.user_id(&self.config.user_id_name), user_id) {
            (Some(stored), Some(claimed)) if stored == claimed => {
                info!(user_id = %claimed, "Token verified");
                let authenticated = Authenticated {
                    token: session.id.clone(),
                    user_id: claimed.to_string(),
                };
                Ok((authenticated, session))
            }
            _ => {
                warn!(
                    reason = "user_mismatch",
                    "Rejecting token that belongs to another user"
                );
                Err((self.config.unauthed)())
            }
        }
    }

    /// Looks up the session stored under `token`
    #[instrument(skip(self, token))]
    pub async fn load_session(&self, token: &str) -> Result<Option<SessionRecord>, AppError> {
        Ok(self.config.store.get(token).await?)
    }

    /// Starts an empty session under a freshly generated token. Nothing is stored
    /// until the record is persisted.
    pub fn new_session(&self) -> SessionRecord {
        SessionRecord::new(generate_token(), self.config.max_age)
    }

    /// Resets the record's max age and writes it to the store
    #[instrument(skip(self, record))]
    pub async fn persist(&self, record: &mut SessionRecord) -> Result<(), StoreError> {
        record.reset_max_age(self.config.max_age);
        self.config
            .store
            .set(&record.id, record, self.config.max_age)
            .await
    }

    /// Creates and stores a session for `user_id` in one step
    #[instrument(skip(self))]
    pub async fn issue_session(&self, user_id: &str) -> Result<SessionRecord, AppError> {
        let mut record = self.new_session();
        record
            .insert(self.config.user_id_name.clone(), user_id)
            .map_err(|e| {
                warn!(error = %e, "Refusing to store user id");
                AppError::Internal
            })?;
        self.persist(&mut record).await?;

        info!(user_id = %user_id, "Session issued");
        Ok(record)
    }

    /// Removes the session stored under `token`. Unknown tokens are not an error.
    #[instrument(skip(self, token))]
    pub async fn destroy_session(&self, token: &str) -> Result<(), AppError> {
        self.config.store.destroy(token).await?;
        info!("Session destroyed");
        Ok(())
    }

    /// Sweeps expired sessions out of the store
    #[instrument(skip(self))]
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        let removed_count = self.config.store.cleanup_expired_sessions().await?;

        info!(
            removed_sessions = removed_count,
            "Expired sessions cleanup completed"
        );
        Ok(removed_count)
    }
}
