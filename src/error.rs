//! Top-level error type and its process exit codes.

use crate::azure::error::RequestError;
use crate::config::ConfigError;
use crate::inventory::OutputError;
use crate::secret::SecretError;
use thiserror::Error;

/// Process exit codes reported to the monitoring core
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    /// Token request failed, or any failure outside the two request phases
    pub const REQUEST_FAILED: u8 = 1;
    pub const QUERY_FAILED: u8 = 2;
    pub const TOKEN_TIMEOUT: u8 = 11;
    pub const QUERY_TIMEOUT: u8 = 12;
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{}", describe(.0, "Failed to fetch access token."))]
    Token(#[source] RequestError),

    #[error("{}", describe(.0, "Failed to query Azure Resource Graph."))]
    Query(#[source] RequestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl AgentError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AgentError::Token(err) if err.is_timeout() => exit_code::TOKEN_TIMEOUT,
            AgentError::Token(_) => exit_code::REQUEST_FAILED,
            AgentError::Query(err) if err.is_timeout() => exit_code::QUERY_TIMEOUT,
            AgentError::Query(_) => exit_code::QUERY_FAILED,
            _ => exit_code::REQUEST_FAILED,
        }
    }
}

/// Error text, upstream body if any, then which phase failed
fn describe(err: &RequestError, context: &str) -> String {
    match err.body() {
        Some(body) => format!("{err}\n{body}\n{context}"),
        None => format!("{err}\n{context}"),
    }
}
