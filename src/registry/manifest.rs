//! Manifest media types and digest enumeration
//!
//! Manifests are copied byte-for-byte so their digests stay stable. They are
//! decoded only far enough to find the blobs and child manifests they
//! reference.

use crate::common::ValidationUtils;
use crate::error::{Result, SyncError};
use serde::Deserialize;

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST_V2: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST_V1: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX_V1: &str = "application/vnd.oci.image.index.v1+json";

/// Accept header value for manifest fetches
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestType {
    DockerV2,
    DockerList,
    OciManifest,
    OciIndex,
}

impl ManifestType {
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        // Content-Type may carry parameters such as `; charset=utf-8`
        let media_type = media_type.split(';').next().unwrap_or("").trim();
        match media_type {
            DOCKER_MANIFEST_V2 => Some(Self::DockerV2),
            DOCKER_MANIFEST_LIST_V2 => Some(Self::DockerList),
            OCI_MANIFEST_V1 => Some(Self::OciManifest),
            OCI_INDEX_V1 => Some(Self::OciIndex),
            _ => None,
        }
    }

    pub fn to_content_type(self) -> &'static str {
        match self {
            Self::DockerV2 => DOCKER_MANIFEST_V2,
            Self::DockerList => DOCKER_MANIFEST_LIST_V2,
            Self::OciManifest => OCI_MANIFEST_V1,
            Self::OciIndex => OCI_INDEX_V1,
        }
    }

    pub fn is_index(self) -> bool {
        matches!(self, Self::DockerList | Self::OciIndex)
    }
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    digest: String,
    #[serde(default)]
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    #[serde(rename = "mediaType", default)]
    media_type: Option<String>,
    #[serde(default)]
    config: Option<Descriptor>,
    #[serde(default)]
    layers: Vec<Descriptor>,
    #[serde(default)]
    manifests: Vec<Descriptor>,
}

/// A manifest as fetched from a registry
#[derive(Debug, Clone)]
pub struct Manifest {
    pub manifest_type: ManifestType,
    pub bytes: Vec<u8>,
    /// Blobs (config first, then layers) for an image manifest
    pub blobs: Vec<String>,
    /// Child manifest digests for an index
    pub children: Vec<String>,
}

impl Manifest {
    /// Decode `bytes`, preferring the response Content-Type over the
    /// document's own `mediaType` field.
    pub fn parse(bytes: Vec<u8>, content_type: Option<&str>) -> Result<Self> {
        let document: ManifestDocument = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Parse(format!("Invalid manifest JSON: {}", e)))?;

        let manifest_type = content_type
            .and_then(ManifestType::from_media_type)
            .or_else(|| {
                document
                    .media_type
                    .as_deref()
                    .and_then(ManifestType::from_media_type)
            })
            .or_else(|| {
                // Untyped OCI documents: an index lists manifests, an image has a config
                if !document.manifests.is_empty() {
                    Some(ManifestType::OciIndex)
                } else if document.config.is_some() {
                    Some(ManifestType::OciManifest)
                } else {
                    None
                }
            })
            .ok_or_else(|| SyncError::Parse("Unsupported manifest media type".to_string()))?;

        let (blobs, children) = if manifest_type.is_index() {
            let children = document
                .manifests
                .into_iter()
                .map(|descriptor| descriptor.digest)
                .collect();
            (Vec::new(), children)
        } else {
            let config = document.config.ok_or_else(|| {
                SyncError::Parse("Image manifest has no config descriptor".to_string())
            })?;
            let blobs = std::iter::once(config)
                .chain(document.layers)
                // Foreign layers are fetched from their own URLs, not the registry
                .filter(|descriptor| descriptor.urls.is_empty())
                .map(|descriptor| descriptor.digest)
                .collect();
            (blobs, Vec::new())
        };

        for digest in blobs.iter().chain(children.iter()) {
            ValidationUtils::validate_digest(digest)?;
        }

        Ok(Self {
            manifest_type,
            bytes,
            blobs,
            children,
        })
    }

    pub fn content_type(&self) -> &'static str {
        self.manifest_type.to_content_type()
    }
}
