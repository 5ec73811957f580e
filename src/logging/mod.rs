//! Logging and output control
//!
//! This module provides the [`Logger`] used throughout the crate for
//! user-visible progress messages, and [`init_tracing`] which installs the
//! process-wide `tracing` subscriber those messages are written to. The
//! subscriber serializes writes, so a `Logger` can be cloned freely into
//! concurrent transfer tasks.

use std::time::Duration;
use tracing_subscriber::{
    EnvFilter,
    filter::{Directive, LevelFilter},
    fmt,
    prelude::*,
};

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            tracing::info!("=== {} ===", title);
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        if !self.quiet {
            tracing::info!("--- {} ---", title);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            tracing::info!("{}", message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            tracing::info!(outcome = "success", "{}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            tracing::warn!("{}", message);
        }
    }

    /// Error message, emitted even in quiet mode
    pub fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            tracing::info!("> {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            tracing::info!("  {}", message);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            self.subsection(title);
            for (key, value) in items {
                tracing::info!("  {}: {}", key, value);
            }
        }
    }

    /// Structured list output
    pub fn list(&self, title: &str, items: &[String]) {
        if !self.quiet {
            self.subsection(title);
            for (i, item) in items.iter().enumerate() {
                tracing::info!("  {}. {}", i + 1, item);
            }

            if items.is_empty() {
                tracing::info!("  (No items to display)");
            }
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{:.2}s", duration.as_secs_f64())
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// `directive` is a plain level (`info`, `debug`, ...) or a full filter
/// directive; `RUST_LOG` overrides it. Quiet mode still lets errors through.
pub fn init_tracing(directive: &str, quiet: bool) -> Result<(), String> {
    let default_directive: Directive = if quiet {
        LevelFilter::ERROR.into()
    } else {
        directive
            .parse()
            .map_err(|e| format!("Invalid log level '{}': {}", directive, e))?
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_directive)
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|e| format!("Failed to install log subscriber: {}", e))
}
