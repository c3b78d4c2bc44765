// Demo application showing the gate in front of a few routes
pub use handlers::{index, login, logout, update, user, DEMO_PASSWORD, DEMO_USERNAME, DEMO_USER_ID};

mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{session, shared::AppState};

/// Builds the demo router with every route behind the token gate
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/index", get(index))
        .route("/login", get(login))
        .route("/logout", get(logout))
        .route("/user", get(user))
        .route("/update", post(update))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::authenticate,
        ))
        .with_state(state)
}
