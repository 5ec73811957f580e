//! Repository and image references
//!
//! A reference is written `host/repository:tag`. The host may carry an
//! explicit `http://` or `https://` scheme for registries that are not served
//! over default HTTPS; otherwise HTTPS is assumed.

use crate::common::ValidationUtils;
use crate::error::{Result, SyncError};
use std::fmt;

const DOCKER_HUB_HOSTS: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];
const DOCKER_HUB_ENDPOINT: &str = "https://registry-1.docker.io";

/// A repository within a registry, e.g. `docker.io/library/nginx`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryReference {
    registry: String,
    repository: String,
}

impl RepositoryReference {
    pub fn new(registry: &str, repository: &str) -> Result<Self> {
        let registry = registry.trim_end_matches('/');
        if registry.is_empty() {
            return Err(SyncError::Reference("Registry host cannot be empty".to_string()));
        }

        let repository = if is_docker_hub(registry) && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository.to_string()
        };
        ValidationUtils::validate_repository(&repository)?;

        Ok(Self {
            registry: registry.to_string(),
            repository,
        })
    }

    /// Registry host as configured
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path, normalized with `library/` for Docker Hub
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Base URL of the registry API, without the `/v2/` suffix
    pub fn endpoint(&self) -> String {
        if self.registry.starts_with("http://") || self.registry.starts_with("https://") {
            self.registry.clone()
        } else if is_docker_hub(&self.registry) {
            DOCKER_HUB_ENDPOINT.to_string()
        } else {
            format!("https://{}", self.registry)
        }
    }

    pub fn with_tag(&self, tag: &str) -> Result<ImageReference> {
        ValidationUtils::validate_tag(tag)?;
        Ok(ImageReference {
            repository: self.clone(),
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}

/// A tagged image, e.g. `gcr.io/my-project/nginx:1.25.3`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    repository: RepositoryReference,
    tag: String,
}

impl ImageReference {
    pub fn new(registry: &str, repository: &str, tag: &str) -> Result<Self> {
        RepositoryReference::new(registry, repository)?.with_tag(tag)
    }

    pub fn repository(&self) -> &RepositoryReference {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

fn is_docker_hub(registry: &str) -> bool {
    DOCKER_HUB_HOSTS.contains(&registry)
}
