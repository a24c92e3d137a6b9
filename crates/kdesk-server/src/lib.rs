//! HTTP API for the KDEI Taipei support desk.
//!
//! This crate puts the agent on the network: it reads per-request model
//! credentials from cookies, validates the chat payload, and turns the
//! session's turn events into an AI SDK UI message stream.
//!
//! # Routes
//!
//! - `GET  /health`: liveness probe
//! - `POST /api/chat`: streamed assistant turn
//! - `POST /api/chat/mock`: scripted demo turn, no credentials needed
//! - `GET  /api/config`: which credential cookies are present
//! - `POST /api/config`: validate and store credentials as cookies
//!
//! # Example
//!
//! ```ignore
//! use kdesk_server::{AppState, Server};
//!
//! let state = AppState::new(config, orchestrator);
//! Server::new(state).run().await?;
//! ```

pub mod cookies;
pub mod error;
pub mod routes;
pub mod state;
pub mod validation;

pub use error::{ErrorResponse, Result, ServerError};
pub use routes::{CredentialStatus, HealthResponse};
pub use state::{AppState, BackendFactory, OpenAiBackendFactory};
pub use validation::{PathSegment, ValidationIssue, parse_chat_request};

use std::net::SocketAddr;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// The kdesk HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(routes::health_routes())
            .nest("/api", self.api_routes())
            .layer(TraceLayer::new_for_http());

        let router = match self.cors_layer() {
            Some(cors) => router.layer(cors),
            None => router,
        };

        router.with_state(self.state.clone())
    }

    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route("/chat", post(routes::chat_handler))
            .route("/chat/mock", post(routes::mock_chat_handler))
            .route(
                "/config",
                get(routes::get_config_handler).post(routes::set_config_handler),
            )
    }

    /// CORS for the configured origins. Credentials are allowed because the
    /// model settings travel in cookies.
    fn cors_layer(&self) -> Option<CorsLayer> {
        let origins: Vec<HeaderValue> = self
            .state
            .config
            .server
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(origin = %origin, error = %e, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        if origins.is_empty() {
            return None;
        }

        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true),
        )
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.bind_address()?;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// The configured bind address.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let server = &self.state.config.server;
        format!("{}:{}", server.bind, server.port)
            .parse()
            .map_err(|e| {
                ServerError::Internal(format!(
                    "invalid bind address '{}:{}': {}",
                    server.bind, server.port, e
                ))
            })
    }
}
