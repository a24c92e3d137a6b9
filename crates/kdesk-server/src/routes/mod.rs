//! API routes.

pub mod chat;
pub mod config;
pub mod health;

pub use chat::{chat_handler, mock_chat_handler};
pub use config::{CredentialStatus, get_config_handler, set_config_handler};
pub use health::{HealthResponse, health_routes};
