use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use crate::session::{Authenticated, RequestParams, SessionHandle};
use crate::shared::{AppError, AppState};

pub const DEMO_USERNAME: &str = "Bob";
pub const DEMO_PASSWORD: &str = "567890";
pub const DEMO_USER_ID: &str = "4567890";

/// GET /index
///
/// Public route, no session involved
pub async fn index() -> &'static str {
    "Hello world"
}

/// HTTP handler for logging in
///
/// GET /login
/// Checks the demo credentials, starts a session and returns its token and user id
#[instrument(name = "login", skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: SessionHandle,
    params: RequestParams,
) -> Result<Response, AppError> {
    if params.get("username") != Some(DEMO_USERNAME) || params.get("password") != Some(DEMO_PASSWORD)
    {
        warn!("Login rejected");
        return Ok((StatusCode::UNAUTHORIZED, "password mismatch!").into_response());
    }

    let token = session.create();
    session.set_user_id(DEMO_USER_ID)?;
    info!(user_id = DEMO_USER_ID, "Login succeeded");

    let mut body = Map::new();
    body.insert(state.engine.token_name().to_string(), Value::from(token));
    body.insert(
        state.engine.user_id_name().to_string(),
        Value::from(DEMO_USER_ID),
    );

    Ok(Json(Value::Object(body)).into_response())
}

/// HTTP handler for logging out
///
/// GET /logout
/// Destroys the session named by the token once its user id matches the request's
#[instrument(name = "logout", skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: SessionHandle,
    params: RequestParams,
) -> Result<Response, AppError> {
    let Some(record) = session.load().await? else {
        return Ok((StatusCode::BAD_REQUEST, "session not found!").into_response());
    };

    let user_id_name = state.engine.user_id_name();
    match record.user_id(user_id_name) {
        Some(stored) if params.get(user_id_name) == Some(stored) => {
            session.destroy(&record.id).await?;
            info!("Logout succeeded");
            Ok(StatusCode::OK.into_response())
        }
        _ => Ok((StatusCode::BAD_REQUEST, "userID and token mismatch!").into_response()),
    }
}

/// GET /user
///
/// Only reachable with a verified user id
pub async fn user(authenticated: Option<Extension<Authenticated>>) -> Response {
    if authenticated.is_none() {
        return (StatusCode::UNAUTHORIZED, "userID required!").into_response();
    }

    Json(json!({ "username": 42 })).into_response()
}

/// POST /update
///
/// Echoes the submitted username back to a verified user
#[instrument(name = "update", skip_all)]
pub async fn update(
    authenticated: Option<Extension<Authenticated>>,
    params: RequestParams,
) -> Response {
    let Some(Extension(authenticated)) = authenticated else {
        return (StatusCode::UNAUTHORIZED, "userID required!").into_response();
    };

    let username = params.get("username").unwrap_or_default();
    info!(
        user_id = %authenticated.user_id,
        username = %username,
        "Username updated"
    );

    Json(json!({ "username": username })).into_response()
}
