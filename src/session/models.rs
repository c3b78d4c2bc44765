use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Field names owned by the record itself. Application fields may not use them,
/// otherwise the flattened representation would carry two values for one key.
pub const RESERVED_FIELDS: &[&str] = &["id", "expires_at"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {0:?} is reserved by the session store")]
pub struct ReservedFieldError(pub String);

/// A session as persisted in the store: the issuing token, its expiry and the
/// application fields (including the user identifier once authenticated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SessionRecord {
    /// Creates an empty record for `id` expiring `max_age` from now
    pub fn new(id: String, max_age: Duration) -> Self {
        Self {
            id,
            expires_at: expiry_from_now(max_age),
            fields: Map::new(),
        }
    }

    /// Stores `value` under `field`, returning the previous value if any
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, ReservedFieldError> {
        let field = field.into();
        if RESERVED_FIELDS.contains(&field.as_str()) {
            return Err(ReservedFieldError(field));
        }
        Ok(self.fields.insert(field, value.into()))
    }

    /// The stored user identifier. Only string values count as identifiers.
    pub fn user_id(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Sliding expiration: push the deadline to `max_age` from now
    pub fn reset_max_age(&mut self, max_age: Duration) {
        self.expires_at = expiry_from_now(max_age);
    }
}

fn expiry_from_now(max_age: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
