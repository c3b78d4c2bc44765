use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, instrument, warn};

use super::{models::SessionRecord, service::AuthEngine};
use crate::shared::AppError;

/// Session operations bound to a single request.
///
/// The gate inserts one into the request extensions; handlers take it as an extractor.
/// A session attached through [`SessionHandle::load`] or [`SessionHandle::create`] is
/// renewed and persisted once the handler has produced its response.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    engine: Arc<AuthEngine>,
    request_token: Option<String>,
    slot: Mutex<SessionSlot>,
}

/// The attached session plus any it displaced during the request
#[derive(Default)]
struct SessionSlot {
    attached: Option<SessionRecord>,
    replaced: Vec<SessionRecord>,
}

impl SessionSlot {
    fn attach(&mut self, record: SessionRecord) {
        match self.attached.take() {
            Some(previous) if previous.id != record.id => self.replaced.push(previous),
            _ => {}
        }
        self.attached = Some(record);
    }
}

impl SessionHandle {
    pub fn new(engine: Arc<AuthEngine>, request_token: Option<String>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                engine,
                request_token,
                slot: Mutex::new(SessionSlot::default()),
            }),
        }
    }

    /// Attaches a record the gate already loaded, so it is renewed like a loaded one
    pub(crate) fn attach(&self, record: SessionRecord) {
        self.lock().attach(record);
    }

    /// Loads the session keyed by the request's token and attaches it.
    /// Returns `None` when the request has no token or the store has no such session.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<SessionRecord>, AppError> {
        let Some(token) = self.inner.request_token.as_deref() else {
            debug!("No token on request, nothing to load");
            return Ok(None);
        };

        let session = self.inner.engine.load_session(token).await?;
        if let Some(record) = &session {
            self.lock().attach(record.clone());
        }
        Ok(session)
    }

    /// Starts a new session under a fresh token and attaches it. Returns the token.
    ///
    /// A session attached before, such as the one the gate verified, stops receiving
    /// field writes but is still renewed when the response completes.
    pub fn create(&self) -> String {
        let record = self.inner.engine.new_session();
        let token = record.id.clone();
        self.lock().attach(record);

        info!("Session created");
        token
    }

    /// Sets a field on the attached session
    pub fn insert(&self, field: impl Into<String>, value: impl Into<Value>) -> Result<(), AppError> {
        let mut slot = self.lock();
        let Some(record) = slot.attached.as_mut() else {
            warn!("Field written without an attached session");
            return Err(AppError::Internal);
        };

        record.insert(field, value).map_err(|e| {
            error!(error = %e, "Refusing to write reserved session field");
            AppError::Internal
        })?;
        Ok(())
    }

    /// Stores the user identifier under the configured field name
    pub fn set_user_id(&self, user_id: impl Into<String>) -> Result<(), AppError> {
        let field = self.inner.engine.user_id_name().to_string();
        self.insert(field, user_id.into())
    }

    /// Token of the attached session
    pub fn token(&self) -> Option<String> {
        self.lock().attached.as_ref().map(|record| record.id.clone())
    }

    /// Destroys the session stored under `token`. If this request holds that session
    /// it is dropped too, so it is not written back when the response completes.
    #[instrument(skip(self, token))]
    pub async fn destroy(&self, token: &str) -> Result<(), AppError> {
        self.inner.engine.destroy_session(token).await?;

        let mut slot = self.lock();
        if slot.attached.as_ref().is_some_and(|record| record.id == token) {
            slot.attached = None;
        }
        slot.replaced.retain(|record| record.id != token);
        Ok(())
    }

    /// Renews and persists every session this request holds. They are taken out
    /// first, so repeated calls write at most once. Persist failures are logged only.
    pub(crate) async fn finalize(&self) {
        let SessionSlot { attached, replaced } = std::mem::take(&mut *self.lock());

        for mut record in replaced.into_iter().chain(attached) {
            match self.inner.engine.persist(&mut record).await {
                Ok(()) => debug!("Session renewed"),
                Err(e) => error!(error = %e, "Failed to persist session at end of request"),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionHandle>().cloned().ok_or_else(|| {
            error!("SessionHandle requested but the auth gate is not installed");
            AppError::Internal
        })
    }
}
