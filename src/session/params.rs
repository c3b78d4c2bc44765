use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header::CONTENT_TYPE, request::Parts},
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::shared::AppError;

/// Largest body the gate buffers while looking for credentials
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Request parameters merged from the query string and a JSON or form body.
///
/// Body values win over query values with the same name. Empty values count as absent.
/// Non-string JSON values are not parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    values: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BodyKind {
    Json,
    Form,
}

impl RequestParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn from_query(query: Option<&str>) -> Result<Self, AppError> {
        let mut params = Self::default();
        params.merge_query(query)?;
        Ok(params)
    }

    /// Buffers a JSON or form body, collects its parameters and hands back an
    /// equivalent request so later extractors can still read the body.
    pub async fn extract(req: Request) -> Result<(Request, Self), AppError> {
        let mut params = Self::from_query(req.uri().query())?;

        let Some(kind) = body_kind(&req) else {
            return Ok((req, params));
        };

        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to buffer request body");
                AppError::BadRequest("Request body is unreadable or too large".to_string())
            })?;

        params.merge_body(kind, &bytes)?;
        debug!(param_count = params.values.len(), "Collected request parameters");

        Ok((Request::from_parts(parts, Body::from(bytes)), params))
    }

    fn merge_query(&mut self, query: Option<&str>) -> Result<(), AppError> {
        let Some(query) = query else {
            return Ok(());
        };
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| AppError::BadRequest(format!("Invalid query string: {}", e)))?;
        self.values.extend(pairs);
        Ok(())
    }

    fn merge_body(&mut self, kind: BodyKind, bytes: &[u8]) -> Result<(), AppError> {
        if bytes.is_empty() {
            return Ok(());
        }

        match kind {
            BodyKind::Json => {
                let value: Value = serde_json::from_slice(bytes)
                    .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;
                // only strings are parameters; 4567890 is not the identifier "4567890"
                if let Value::Object(map) = value {
                    for (key, value) in map {
                        if let Value::String(value) = value {
                            self.values.insert(key, value);
                        }
                    }
                }
            }
            BodyKind::Form => {
                let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
                    .map_err(|e| AppError::BadRequest(format!("Invalid form body: {}", e)))?;
                self.values.extend(pairs);
            }
        }

        Ok(())
    }
}

fn body_kind(req: &Request) -> Option<BodyKind> {
    let content_type = req.headers().get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim();

    if mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json") {
        Some(BodyKind::Json)
    } else if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        Some(BodyKind::Form)
    } else {
        None
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // outside the gate only the query string is available
        match parts.extensions.get::<RequestParams>() {
            Some(params) => Ok(params.clone()),
            None => Self::from_query(parts.uri.query()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, content_type: Option<&str>, body: &str) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_query_parameters() {
        let req = request("/user?userID=4567890&token=abc", None, "");
        let (_, params) = RequestParams::extract(req).await.unwrap();

        assert_eq!(params.get("userID"), Some("4567890"));
        assert_eq!(params.get("token"), Some("abc"));
        assert_eq!(params.get("missing"), None);
    }

    #[tokio::test]
    async fn test_json_body_parameters_and_body_restored() {
        let body = r#"{"userID": "4567890", "token": "abc", "nested": {"a": 1}}"#;
        let req = request("/update", Some("application/json; charset=utf-8"), body);
        let (req, params) = RequestParams::extract(req).await.unwrap();

        assert_eq!(params.get("userID"), Some("4567890"));
        assert_eq!(params.get("token"), Some("abc"));
        assert_eq!(params.get("nested"), None);

        let restored = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(restored, body.as_bytes());
    }

    #[tokio::test]
    async fn test_json_non_string_values_are_not_parameters() {
        let body = r#"{"userID": 4567890, "admin": true, "token": "abc"}"#;
        let req = request("/update?userID=1", Some("application/json"), body);
        let (_, params) = RequestParams::extract(req).await.unwrap();

        // the numeric body value neither converts nor shadows the query value
        assert_eq!(params.get("userID"), Some("1"));
        assert_eq!(params.get("admin"), None);
        assert_eq!(params.get("token"), Some("abc"));
    }

    #[tokio::test]
    async fn test_form_body_parameters() {
        let req = request(
            "/update",
            Some("application/x-www-form-urlencoded"),
            "username=Alice&token=a%2Bb",
        );
        let (_, params) = RequestParams::extract(req).await.unwrap();

        assert_eq!(params.get("username"), Some("Alice"));
        assert_eq!(params.get("token"), Some("a+b"));
    }

    #[tokio::test]
    async fn test_body_overrides_query() {
        let req = request(
            "/update?token=from-query&userID=1",
            Some("application/json"),
            r#"{"token": "from-body"}"#,
        );
        let (_, params) = RequestParams::extract(req).await.unwrap();

        assert_eq!(params.get("token"), Some("from-body"));
        assert_eq!(params.get("userID"), Some("1"));
    }

    #[tokio::test]
    async fn test_empty_value_is_absent() {
        let req = request("/user?token=&userID=1", None, "");
        let (_, params) = RequestParams::extract(req).await.unwrap();

        assert_eq!(params.get("token"), None);
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_left_untouched() {
        let req = request("/upload?token=abc", Some("text/plain"), "token=ignored");
        let (req, params) = RequestParams::extract(req).await.unwrap();

        assert_eq!(params.get("token"), Some("abc"));
        let body = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, "token=ignored".as_bytes());
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let req = request("/update", Some("application/json"), "{not json");
        let result = RequestParams::extract(req).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
