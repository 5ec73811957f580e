//! Standardized mapping from HTTP and transport failures to [`SyncError`]

use crate::error::SyncError;
use reqwest::StatusCode;

/// Standard error handler for registry HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle registry-related HTTP errors for a named operation
    pub fn handle_registry_error(status: StatusCode, error_text: &str, operation: &str) -> SyncError {
        match status.as_u16() {
            401 => SyncError::Auth(format!(
                "Unauthorized to perform {}: {}",
                operation, error_text
            )),
            403 => SyncError::Auth(format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            )),
            404 => SyncError::NotFound(format!("{}: {}", operation, error_text)),
            429 => SyncError::Registry(format!("Rate limited during {}: {}", operation, error_text)),
            500 => SyncError::Registry(format!(
                "Registry server error during {}: {}",
                operation, error_text
            )),
            502 | 503 => SyncError::Registry(format!(
                "Registry unavailable for {}: {}",
                operation, error_text
            )),
            _ => SyncError::Registry(format!(
                "{} failed (status {}): {}",
                operation, status, error_text
            )),
        }
    }

    /// Handle token endpoint errors, both registry token servers and OAuth
    pub fn handle_auth_error(status: StatusCode, error_text: &str) -> SyncError {
        let error_msg = match status.as_u16() {
            400 => format!("Invalid token request parameters: {}", error_text),
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            404 => "Authentication endpoint not found".to_string(),
            _ => format!("Authentication failed (status {}): {}", status, error_text),
        };

        SyncError::Auth(error_msg)
    }

    /// Handle blob upload errors
    pub fn handle_upload_error(status: StatusCode, error_text: &str, context: &str) -> SyncError {
        let error_msg = match status.as_u16() {
            400 if error_text.contains("DIGEST_INVALID") => format!(
                "Digest validation failed during {} - registry reports uploaded content doesn't match: {}",
                context, error_text
            ),
            400 => format!("Bad request during {}: {}", context, error_text),
            401 => format!("Authentication failed during {}: {}", context, error_text),
            403 => format!("Permission denied for {}: {}", context, error_text),
            404 => format!(
                "Repository not found or {} session expired: {}",
                context, error_text
            ),
            413 => format!("Blob too large for {}: {}", context, error_text),
            507 => format!("Registry out of storage during {}: {}", context, error_text),
            _ => format!("{} failed (status {}): {}", context, status, error_text),
        };

        SyncError::Registry(error_msg)
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> SyncError {
        if error.is_timeout() {
            SyncError::Network(format!("{} timed out: {}", context, error))
        } else if error.is_connect() {
            SyncError::Network(format!("Connection error during {}: {}", context, error))
        } else if error.is_decode() {
            SyncError::Parse(format!("Failed to decode {} response: {}", context, error))
        } else if error.to_string().contains("certificate") {
            SyncError::Network(format!(
                "TLS certificate error during {}: {}",
                context, error
            ))
        } else {
            SyncError::Network(format!("{} network error: {}", context, error))
        }
    }
}
