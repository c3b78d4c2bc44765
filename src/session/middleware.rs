use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{handle::SessionHandle, params::RequestParams};
use crate::shared::{AppError, AppState};

/// Token gate - verifies credentials when present and attaches session operations.
/// Usage: .layer(middleware::from_fn_with_state(app_state.clone(), session::authenticate))
///
/// A request carrying the token field or the user id field is verified first and
/// rejected without reaching the handler if verification fails. Every request that
/// gets through receives a [`SessionHandle`] and its [`RequestParams`]. Verified
/// requests also carry [`Authenticated`](super::Authenticated) and have their
/// session attached, so it is renewed once the response is ready.
#[instrument(skip(state, req, next))]
pub async fn authenticate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let engine = &state.engine;
    let (mut req, params) = RequestParams::extract(req).await?;

    let token = params.get(engine.token_name()).map(str::to_owned);
    let user_id = params.get(engine.user_id_name());

    let session = SessionHandle::new(Arc::clone(engine), token.clone());

    if token.is_some() || user_id.is_some() {
        debug!("Credentials present, verifying request");
        let (authenticated, record) = engine.verify(token.as_deref(), user_id).await?;
        req.extensions_mut().insert(authenticated);
        session.attach(record);
    }

    req.extensions_mut().insert(params);
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;
    session.finalize().await;

    Ok(response)
}
