use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::repository::SessionStore;
use crate::shared::AppError;

pub const DEFAULT_TOKEN_NAME: &str = "token";
pub const DEFAULT_USER_ID_NAME: &str = "userID";
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Builds the error a rejected request is answered with.
///
/// Overriding one lets callers pick their own status and message per failure kind.
pub type FailureHandler = Arc<dyn Fn() -> AppError + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max age must be a positive duration")]
    NonPositiveMaxAge,

    #[error("invalid max age {value:?}: {reason}")]
    InvalidMaxAge { value: String, reason: String },

    #[error("{setting} must not be empty")]
    EmptyFieldName { setting: &'static str },

    #[error("token field and user id field are both named {name:?}")]
    FieldNameCollision { name: String },

    #[error("{setting} {name:?} collides with a field reserved by the session store")]
    ReservedFieldName { setting: &'static str, name: String },
}

/// Engine configuration, fixed once the engine is built
#[derive(Clone)]
pub struct AuthConfig {
    pub store: Arc<dyn SessionStore>,
    pub max_age: Duration,
    pub token_name: String,
    pub user_id_name: String,
    pub notok: FailureHandler,
    pub unauthed: FailureHandler,
}

impl AuthConfig {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            max_age: DEFAULT_MAX_AGE,
            token_name: DEFAULT_TOKEN_NAME.to_string(),
            user_id_name: DEFAULT_USER_ID_NAME.to_string(),
            notok: Arc::new(AppError::missing_credentials),
            unauthed: Arc::new(AppError::authentication_failed),
        }
    }

    /// Reads overrides from `AUTH_MAX_AGE_SECS`, `AUTH_TOKEN_NAME` and `AUTH_USER_ID_NAME`
    pub fn from_env(store: Arc<dyn SessionStore>) -> Result<Self, ConfigError> {
        Self::from_lookup(store, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        store: Arc<dyn SessionStore>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(store);

        if let Some(value) = lookup("AUTH_MAX_AGE_SECS") {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidMaxAge {
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
            config.max_age = Duration::from_secs(secs);
        }
        if let Some(name) = lookup("AUTH_TOKEN_NAME") {
            config.token_name = name;
        }
        if let Some(name) = lookup("AUTH_USER_ID_NAME") {
            config.user_id_name = name;
        }

        Ok(config)
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = name.into();
        self
    }

    pub fn with_user_id_name(mut self, name: impl Into<String>) -> Self {
        self.user_id_name = name.into();
        self
    }

    /// Handler for requests that carry a user id but no token
    pub fn with_notok(mut self, handler: impl Fn() -> AppError + Send + Sync + 'static) -> Self {
        self.notok = Arc::new(handler);
        self
    }

    /// Handler for unknown, expired or mismatched tokens
    pub fn with_unauthed(
        mut self,
        handler: impl Fn() -> AppError + Send + Sync + 'static,
    ) -> Self {
        self.unauthed = Arc::new(handler);
        self
    }

    /// Checks every rule the engine relies on; called by `AuthEngine::new`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_age.is_zero() {
            return Err(ConfigError::NonPositiveMaxAge);
        }
        if chrono::Duration::from_std(self.max_age).is_err() {
            return Err(ConfigError::InvalidMaxAge {
                value: format!("{}s", self.max_age.as_secs()),
                reason: "out of range".to_string(),
            });
        }

        let names = [
            ("token_name", &self.token_name),
            ("user_id_name", &self.user_id_name),
        ];
        for (setting, name) in names {
            if name.is_empty() {
                return Err(ConfigError::EmptyFieldName { setting });
            }
            if self.store.reserved_fields().contains(&name.as_str()) {
                return Err(ConfigError::ReservedFieldName {
                    setting,
                    name: name.clone(),
                });
            }
        }

        if self.token_name == self.user_id_name {
            return Err(ConfigError::FieldNameCollision {
                name: self.token_name.clone(),
            });
        }

        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("max_age", &self.max_age)
            .field("token_name", &self.token_name)
            .field("user_id_name", &self.user_id_name)
            .finish_non_exhaustive()
    }
}
