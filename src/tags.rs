//! Tag selection: exclusion filtering, semantic-version ranking and truncation
//!
//! A tag survives selection only if no exclusion pattern is found anywhere in
//! it and, after stripping one leading `v`, it parses as a strict semantic
//! version. Survivors are ordered newest first and cut to the configured
//! limit. Tags such as `latest` or `stable` therefore never reach the
//! destination.

use crate::logging::Logger;
use regex::Regex;
use semver::Version;
use std::collections::HashMap;

/// Compiled exclusion patterns for one sync job
#[derive(Debug, Clone)]
pub struct TagSelector {
    patterns: Vec<Regex>,
    logger: Logger,
}

impl TagSelector {
    /// Compile the exclusion patterns. A pattern that fails to compile is
    /// logged and skipped, so it never excludes anything.
    pub fn new<S: AsRef<str>>(patterns: &[S], logger: Logger) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                match Regex::new(pattern) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        logger.warning(&format!(
                            "Ignoring invalid exclude pattern '{}': {}",
                            pattern, e
                        ));
                        None
                    }
                }
            })
            .collect();

        Self { patterns, logger }
    }

    /// Whether any exclusion pattern is found within `tag`
    pub fn is_excluded(&self, tag: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(tag))
    }

    /// Drop excluded tags, preserving input order
    pub fn filter<'a>(&self, tags: &'a [String]) -> Vec<&'a str> {
        tags.iter()
            .map(String::as_str)
            .filter(|tag| !self.is_excluded(tag))
            .collect()
    }

    /// Filter, rank descending by semantic version, and keep at most `limit`.
    ///
    /// When two spellings normalize to the same version (`v1.0.0` and
    /// `1.0.0`) the one appearing later in `tags` is kept and the version is
    /// listed once.
    pub fn select(&self, tags: &[String], limit: usize) -> Vec<String> {
        let filtered = self.filter(tags);
        self.logger.detail(&format!(
            "{} of {} tags left after exclusion filtering",
            filtered.len(),
            tags.len()
        ));

        let mut by_version: HashMap<Version, &str> = HashMap::new();
        for tag in filtered {
            match parse_tag_version(tag) {
                Some(version) => {
                    by_version.insert(version, tag);
                }
                None => self
                    .logger
                    .detail(&format!("Skipping tag '{}': not a semantic version", tag)),
            }
        }

        let mut ranked: Vec<(Version, &str)> = by_version.into_iter().collect();
        ranked.sort_by(|(a, _), (b, _)| b.cmp(a));

        ranked
            .into_iter()
            .take(limit)
            .map(|(_, tag)| tag.to_string())
            .collect()
    }
}

/// Parse a tag as a semantic version after removing one leading `v`
pub fn parse_tag_version(tag: &str) -> Option<Version> {
    let trimmed = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(trimmed).ok()
}

/// Convenience wrapper: compile `patterns` and select from `tags`
pub fn select_tags<S: AsRef<str>>(
    tags: &[String],
    patterns: &[S],
    limit: usize,
    logger: &Logger,
) -> Vec<String> {
    TagSelector::new(patterns, logger.clone()).select(tags, limit)
}
