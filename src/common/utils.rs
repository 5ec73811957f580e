//! Common utilities and helper functions

use crate::error::{Result, SyncError};
use crate::logging::Logger;
use std::time::{Duration, Instant};

/// Timing utilities
pub struct Timer {
    start: Instant,
    description: String,
}

impl Timer {
    /// Start a new timer
    pub fn start(description: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            description: description.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        self.elapsed()
    }

    /// Log elapsed time using provided logger
    pub fn log_elapsed(&self, logger: &Logger) {
        logger.info(&format!(
            "{} completed in {}",
            self.description,
            logger.format_duration(self.elapsed())
        ));
    }
}

/// Validation utilities for the pieces of an image reference
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate a repository path such as `library/nginx`
    pub fn validate_repository(repository: &str) -> Result<()> {
        if repository.is_empty() {
            return Err(SyncError::Reference("Repository cannot be empty".to_string()));
        }

        if repository.contains("//") || repository.starts_with('/') || repository.ends_with('/') {
            return Err(SyncError::Reference(format!(
                "Invalid repository format: {}",
                repository
            )));
        }

        let valid_chars = repository.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '/' | '.' | '_' | '-')
        });
        if !valid_chars {
            return Err(SyncError::Reference(format!(
                "Repository may only contain lowercase letters, digits and separators: {}",
                repository
            )));
        }

        Ok(())
    }

    /// Validate a tag: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
    pub fn validate_tag(tag: &str) -> Result<()> {
        let mut chars = tag.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

        if !first_ok || !rest_ok || tag.len() > 128 {
            return Err(SyncError::Reference(format!("Invalid tag: '{}'", tag)));
        }

        Ok(())
    }

    /// Validate a content digest such as `sha256:<hex>`
    pub fn validate_digest(digest: &str) -> Result<()> {
        let Some((algorithm, hash)) = digest.split_once(':') else {
            return Err(SyncError::Parse(format!(
                "Digest must be of the form algorithm:hex: {}",
                digest
            )));
        };

        let expected_len = match algorithm {
            "sha256" => 64,
            "sha512" => 128,
            _ => {
                return Err(SyncError::Parse(format!(
                    "Unsupported digest algorithm: {}",
                    algorithm
                )));
            }
        };

        if hash.len() != expected_len || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SyncError::Parse(format!("Malformed digest: {}", digest)));
        }

        Ok(())
    }
}
