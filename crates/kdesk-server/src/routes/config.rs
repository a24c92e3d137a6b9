//! Credential configuration endpoints.
//!
//! The chat model credentials live in cookies, never in server state. These
//! endpoints let a client store them and check which are present.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kdesk_config::{
    API_KEY_COOKIE, BASE_URL_COOKIE, ConfigError, MODEL_COOKIE, SessionCredentials,
};

use crate::cookies;
use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::validation::{PathSegment, ValidationIssue};

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Which credential cookies the client currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    #[serde(rename = "baseURL")]
    pub base_url: bool,
    #[serde(rename = "apiKey")]
    pub api_key: bool,
    pub model: bool,
    /// All three are present.
    pub complete: bool,
}

impl CredentialStatus {
    fn from_headers(headers: &HeaderMap) -> Self {
        let present = |name| cookies::cookie(headers, name).is_some_and(|v| !v.is_empty());
        let base_url = present(BASE_URL_COOKIE);
        let api_key = present(API_KEY_COOKIE);
        let model = present(MODEL_COOKIE);
        Self {
            base_url,
            api_key,
            model,
            complete: base_url && api_key && model,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/config - Report which credentials are set.
pub async fn get_config_handler(headers: HeaderMap) -> Json<CredentialStatus> {
    Json(CredentialStatus::from_headers(&headers))
}

/// POST /api/config - Validate credentials and store them as cookies.
pub async fn set_config_handler(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let credentials = parse_credentials(&body)?;

    credentials.validate_for_save().map_err(|e| match e {
        ConfigError::InvalidCredentials { issues } => {
            ServerError::Validation(issues.into_iter().map(ValidationIssue::from).collect())
        }
        other => ServerError::Configuration(other),
    })?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    for value in cookies::set_credential_cookies(&credentials, &state.config.server)? {
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    tracing::info!(
        base_url = %credentials.base_url,
        model = %credentials.model,
        "credentials saved"
    );
    Ok(response)
}

fn parse_credentials(body: &[u8]) -> Result<SessionCredentials> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ServerError::invalid_body(format!("Invalid JSON: {}", e)))?;
    let Some(obj) = value.as_object() else {
        return Err(ServerError::invalid_body(
            "Invalid input: expected object",
        ));
    };

    let mut issues = Vec::new();
    let mut field = |name: &str| match obj.get(name) {
        Some(Value::String(s)) => s.clone(),
        other => {
            let received = match other {
                None => "undefined",
                Some(Value::Null) => "null",
                Some(_) => "non-string",
            };
            issues.push(ValidationIssue {
                code: "invalid_type",
                path: vec![PathSegment::from(name)],
                message: format!("Invalid input: expected string, received {received}"),
            });
            String::new()
        }
    };

    let base_url = field(BASE_URL_COOKIE);
    let api_key = field(API_KEY_COOKIE);
    let model = field(MODEL_COOKIE);

    if issues.is_empty() {
        Ok(SessionCredentials::new(base_url, api_key, model))
    } else {
        Err(ServerError::Validation(issues))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Router, body::Body, http::Request, routing::get};
    use kdesk_llm::MockBackend;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::state::testing::state_with;

    fn app() -> Router {
        Router::new()
            .route("/api/config", get(get_config_handler).post(set_config_handler))
            .with_state(state_with(Arc::new(MockBackend::new(vec![]))))
    }

    async fn post(body: Value) -> Response {
        app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/config")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_save_sets_three_cookies() {
        let response = post(json!({
            "baseURL": "https://api.openai.com/v1",
            "apiKey": "sk-test",
            "model": "gpt-4o-mini"
        }))
        .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookies: Vec<&str> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies.len(), 3);
        assert!(cookies[0].starts_with("baseURL=https%3A%2F%2Fapi.openai.com%2Fv1;"));
        assert!(cookies[1].starts_with("apiKey=sk-test;"));
        assert!(cookies[2].starts_with("model=gpt-4o-mini;"));
        assert!(cookies.iter().all(|c| c.contains("SameSite=Strict")));
    }

    #[tokio::test]
    async fn test_short_model_is_rejected() {
        let response = post(json!({
            "baseURL": "https://api.openai.com/v1",
            "apiKey": "sk-test",
            "model": "gpt4"
        }))
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = json_body(response).await;
        assert_eq!(body["error"][0]["path"], json!(["model"]));
    }

    #[tokio::test]
    async fn test_bad_url_and_missing_key() {
        let response = post(json!({"baseURL": "not a url", "model": "gpt-4o-mini"})).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"][0]["path"], json!(["apiKey"]));
        assert_eq!(
            body["error"][0]["message"],
            "Invalid input: expected string, received undefined"
        );

        let response = post(json!({"baseURL": "not a url", "apiKey": "k", "model": "gpt-4o-mini"}))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"][0]["path"], json!(["baseURL"]));
    }

    #[tokio::test]
    async fn test_status_never_echoes_values() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/config")
                    .header("cookie", "apiKey=sk-secret; model=gpt-4o-mini")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(
            body,
            json!({"baseURL": false, "apiKey": true, "model": true, "complete": false})
        );
    }
}
