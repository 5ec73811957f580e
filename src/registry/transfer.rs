//! Registry-to-registry image copy
//!
//! Manifests are fetched from the source and uploaded to the destination
//! byte-for-byte. Blobs the destination already has are skipped; the rest are
//! streamed straight from the source download into the destination upload.

use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::auth::RegistryOperation;
use crate::registry::client::RegistryClient;
use crate::registry::manifest::Manifest;
use crate::registry::reference::{ImageReference, RepositoryReference};
use crate::registry::{ImageTransfer, RegistryAuth, TrustPolicy};
use async_trait::async_trait;
use reqwest::{Body, Client};
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct RegistryTransfer {
    client: Client,
    output: Logger,
}

impl RegistryTransfer {
    /// Build the shared HTTP client; `timeout` applies per request
    pub fn new(timeout: u64, skip_tls: bool, output: Logger) -> Result<Self> {
        let builder = if skip_tls {
            output.warning("TLS certificate verification is disabled");
            Client::builder().danger_accept_invalid_certs(true)
        } else {
            Client::builder()
        };

        let client = builder
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .user_agent(concat!("registry-tag-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, output))
    }

    pub fn with_client(client: Client, output: Logger) -> Self {
        Self { client, output }
    }

    /// The underlying client, shared with the OAuth token exchange
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    async fn connect(
        &self,
        repository: &RepositoryReference,
        auth: &RegistryAuth,
        operation: RegistryOperation,
    ) -> Result<RegistryClient> {
        RegistryClient::connect(
            self.client.clone(),
            repository,
            auth,
            operation,
            self.output.clone(),
        )
        .await
    }

    async fn copy_blobs(
        &self,
        source: &RegistryClient,
        destination: &RegistryClient,
        manifest: &Manifest,
    ) -> Result<()> {
        for digest in &manifest.blobs {
            if destination.blob_exists(digest).await? {
                self.output
                    .detail(&format!("Blob {} already exists, skipping", digest));
                continue;
            }

            let response = source.get_blob(digest).await?;
            let length = response.content_length();
            self.output.detail(&format!(
                "Copying blob {} ({})",
                digest,
                length.map_or_else(|| "unknown size".to_string(), |l| format!("{} bytes", l))
            ));

            let body = Body::wrap_stream(response.bytes_stream());
            destination.upload_blob(digest, body, length).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ImageTransfer for RegistryTransfer {
    async fn list_tags(&self, repository: &RepositoryReference, auth: &RegistryAuth) -> Result<Vec<String>> {
        let client = self.connect(repository, auth, RegistryOperation::Pull).await?;
        client.list_tags().await
    }

    async fn copy_image(
        &self,
        source: &ImageReference,
        destination: &ImageReference,
        source_auth: &RegistryAuth,
        destination_auth: &RegistryAuth,
        policy: TrustPolicy,
    ) -> Result<()> {
        if policy == TrustPolicy::Reject {
            return Err(SyncError::PolicyDenied(source.to_string()));
        }

        let source_client = self
            .connect(source.repository(), source_auth, RegistryOperation::Pull)
            .await?;
        let destination_client = self
            .connect(destination.repository(), destination_auth, RegistryOperation::Push)
            .await?;

        let manifest = source_client.get_manifest(source.tag()).await?;

        if manifest.manifest_type.is_index() {
            self.output.detail(&format!(
                "{} is a multi-platform index with {} manifests",
                source,
                manifest.children.len()
            ));
            for child_digest in &manifest.children {
                let child = source_client.get_manifest(child_digest).await?;
                if child.manifest_type.is_index() {
                    return Err(SyncError::Registry(format!(
                        "Nested manifest index {} in {} is not supported",
                        child_digest, source
                    )));
                }
                self.copy_blobs(&source_client, &destination_client, &child)
                    .await?;
                destination_client.put_manifest(child_digest, &child).await?;
            }
        } else {
            self.copy_blobs(&source_client, &destination_client, &manifest)
                .await?;
        }

        destination_client
            .put_manifest(destination.tag(), &manifest)
            .await
    }
}
