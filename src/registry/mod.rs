//! Registry module for Docker registry interactions
//!
//! [`ImageTransfer`] is the seam the sync orchestrator talks to.
//! [`RegistryTransfer`] implements it over the Docker Registry HTTP API v2,
//! covering only what a tag copy needs: tag listing plus manifest and blob
//! transfer.

pub mod auth;
pub mod client;
pub mod manifest;
pub mod reference;
pub mod transfer;

use crate::error::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use std::fmt;

pub use auth::{Auth, RegistryOperation};
pub use client::RegistryClient;
pub use manifest::{Manifest, ManifestType};
pub use reference::{ImageReference, RepositoryReference};
pub use transfer::RegistryTransfer;

/// Credentials handed to the transport for one registry
#[derive(Clone, PartialEq, Eq)]
pub enum RegistryAuth {
    Anonymous,
    Basic { username: String, password: String },
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryAuth::Anonymous => f.write_str("Anonymous"),
            RegistryAuth::Basic { username, .. } => write!(f, "Basic({})", username),
        }
    }
}

/// Whether copies may proceed without signature verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrustPolicy {
    /// Copy every image as-is
    InsecureAcceptAnything,
    /// Refuse every copy
    Reject,
}

impl fmt::Display for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustPolicy::InsecureAcceptAnything => f.write_str("insecure-accept-anything"),
            TrustPolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Lists and copies images between registries
#[async_trait]
pub trait ImageTransfer: Send + Sync {
    /// All tags of `repository`, in registry order
    async fn list_tags(&self, repository: &RepositoryReference, auth: &RegistryAuth) -> Result<Vec<String>>;

    /// Copy `source` to `destination`, manifests and blobs included
    async fn copy_image(
        &self,
        source: &ImageReference,
        destination: &ImageReference,
        source_auth: &RegistryAuth,
        destination_auth: &RegistryAuth,
        policy: TrustPolicy,
    ) -> Result<()>;
}
