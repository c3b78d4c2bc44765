#![allow(dead_code)] // Test utilities may not all be used in every test

use axum::{
    body::{Body, Bytes},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use tokengate::{
    demo, AppState, AuthConfig, AuthEngine, InMemorySessionStore, SessionStore,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<AuthEngine>,
    pub memory_store: Arc<InMemorySessionStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

type Configure = Box<dyn FnOnce(AuthConfig) -> AuthConfig>;

pub struct TestAppBuilder {
    store: Option<Arc<dyn SessionStore>>,
    configure: Configure,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            configure: Box::new(|config| config),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, configure: impl FnOnce(AuthConfig) -> AuthConfig + 'static) -> Self {
        self.configure = Box::new(configure);
        self
    }

    pub fn build(self) -> TestApp {
        let memory_store = Arc::new(InMemorySessionStore::new());
        let store = self
            .store
            .unwrap_or_else(|| memory_store.clone() as Arc<dyn SessionStore>);

        let config = (self.configure)(AuthConfig::new(store));
        let state = AppState::new(AuthEngine::new(config).expect("valid test configuration"));
        let engine = state.engine.clone();

        TestApp {
            router: demo::router(state),
            engine,
            memory_store,
        }
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn send_form(&self, method: &str, uri: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Logs in with the demo credentials and returns the response body
    pub async fn login(&self) -> Value {
        let response = self
            .send_json(
                "GET",
                "/login",
                json!({ "username": demo::DEMO_USERNAME, "password": demo::DEMO_PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.text());
        response.json()
    }

    /// Logs in and returns the issued token
    pub async fn login_token(&self) -> String {
        let body = self.login().await;
        body[self.engine.token_name()]
            .as_str()
            .expect("login response carries the token")
            .to_string()
    }
}
