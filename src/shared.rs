use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::session::AuthEngine;

/// Shared application state handed to the gate and to route handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuthEngine>,
}

impl AppState {
    pub fn new(engine: AuthEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Failures reported by a session store backend.
///
/// Kept separate from "not found": a lookup that finds nothing is `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Backend(String),

    #[error("Corrupted session record: {0}")]
    Corrupted(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing credentials: {message}")]
    MissingCredentials { status: StatusCode, message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { status: StatusCode, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Default rejection for a request that carries no token
    pub fn missing_credentials() -> Self {
        AppError::MissingCredentials {
            status: StatusCode::UNAUTHORIZED,
            message: "Does not contain token or userID".to_string(),
        }
    }

    /// Default rejection for an unknown, expired or mismatched token
    pub fn authentication_failed() -> Self {
        AppError::AuthenticationFailed {
            status: StatusCode::UNAUTHORIZED,
            message: "Failed to authenticate".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredentials { status, .. } => *status,
            AppError::AuthenticationFailed { status, .. } => *status,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::MissingCredentials { message, .. } => message,
            AppError::AuthenticationFailed { message, .. } => message,
            AppError::Store(e) => format!("Session store error: {}", e),
            AppError::BadRequest(msg) => msg,
            AppError::Internal => "Internal server error".to_string(),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
