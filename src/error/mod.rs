//! Error types for sync operations
//!
//! Every variant carries owned strings so an error can be cloned into a
//! per-tag [`crate::sync::TransferOutcome`] and still be logged by the caller.

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Unreadable or malformed configuration documents
    #[error("Configuration error: {0}")]
    Config(String),
    /// Configuration that parsed but is not usable
    #[error("Validation error: {0}")]
    Validation(String),
    /// File IO errors
    #[error("IO error: {0}")]
    Io(String),
    /// Registry authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),
    /// Service-account key to access token exchange failed
    #[error("Token exchange error: {0}")]
    TokenExchange(String),
    /// Network related errors
    #[error("Network error: {0}")]
    Network(String),
    /// Registry returned an unexpected response
    #[error("Registry error: {0}")]
    Registry(String),
    /// Image reference could not be built or parsed
    #[error("Invalid image reference: {0}")]
    Reference(String),
    /// Response or document parse errors
    #[error("Parse error: {0}")]
    Parse(String),
    /// Trust policy refused the transfer
    #[error("Trust policy denied transfer of {0}")]
    PolicyDenied(String),
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// A transfer task panicked or was aborted
    #[error("Task error: {0}")]
    Task(String),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(err: serde_yaml::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "request")
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            SyncError::Task("transfer task panicked".to_string())
        } else {
            SyncError::Task(format!("transfer task aborted: {}", err))
        }
    }
}
