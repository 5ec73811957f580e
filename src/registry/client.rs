//! Registry client for one repository
//!
//! Implements the Docker Registry HTTP API v2 calls a copy needs:
//! - Tag listing (GET /v2/{name}/tags/list, following `Link` pagination)
//! - Manifest download and upload (GET/PUT /v2/{name}/manifests/{reference})
//! - Blob existence checks and download (HEAD/GET /v2/{name}/blobs/{digest})
//! - Monolithic blob upload (POST /v2/{name}/blobs/uploads/ then PUT ?digest=)

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::RegistryAuth;
use crate::registry::auth::{Auth, Authorization, RegistryOperation};
use crate::registry::manifest::{MANIFEST_ACCEPT, Manifest};
use crate::registry::reference::RepositoryReference;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, LINK, LOCATION};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// An authorized session against one repository
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    endpoint: String,
    repository: String,
    authorization: Option<Authorization>,
    output: Logger,
}

impl RegistryClient {
    /// Authenticate for `operation` on `reference` and return a ready session
    pub async fn connect(
        client: Client,
        reference: &RepositoryReference,
        credentials: &RegistryAuth,
        operation: RegistryOperation,
        output: Logger,
    ) -> Result<Self> {
        let endpoint = reference.endpoint();
        let auth = Auth::new(client.clone(), &endpoint, output.clone());
        let authorization = auth
            .authenticate(reference.repository(), operation, credentials)
            .await?;

        Ok(Self {
            client,
            endpoint,
            repository: reference.repository().to_string(),
            authorization,
            output,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.authorization {
            Some(authorization) => authorization.apply(request),
            None => request,
        }
    }

    fn repository_url(&self, suffix: &str) -> String {
        format!("{}/v2/{}/{}", self.endpoint, self.repository, suffix)
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, context))
    }

    async fn registry_error(response: Response, operation: &str) -> SyncError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        HttpErrorHandler::handle_registry_error(status, &error_text, operation)
    }

    /// List all tags in the repository
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        self.output
            .detail(&format!("Listing tags for repository: {}", self.repository));

        let mut tags = Vec::new();
        let mut next = Some(self.repository_url("tags/list"));

        while let Some(url) = next.take() {
            let response = self.send(self.request(Method::GET, &url), "tag listing").await?;
            if !response.status().is_success() {
                return Err(Self::registry_error(response, "tag listing").await);
            }

            next = next_page_url(&url, &response)?;

            let page: TagList = response
                .json()
                .await
                .map_err(|e| SyncError::Registry(format!("Failed to parse tags response: {}", e)))?;
            tags.extend(page.tags.unwrap_or_default());
        }

        Ok(tags)
    }

    /// Fetch a manifest by tag or digest
    pub async fn get_manifest(&self, reference: &str) -> Result<Manifest> {
        let url = self.repository_url(&format!("manifests/{}", reference));
        let request = self.request(Method::GET, &url).header(ACCEPT, MANIFEST_ACCEPT);
        let response = self.send(request, "manifest fetch").await?;

        if !response.status().is_success() {
            return Err(Self::registry_error(response, "manifest fetch").await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        Manifest::parse(bytes, content_type.as_deref())
    }

    /// Upload a manifest unchanged under `reference`
    pub async fn put_manifest(&self, reference: &str, manifest: &Manifest) -> Result<()> {
        let url = self.repository_url(&format!("manifests/{}", reference));
        let request = self
            .request(Method::PUT, &url)
            .header(CONTENT_TYPE, manifest.content_type())
            .body(manifest.bytes.clone());
        let response = self.send(request, "manifest upload").await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::registry_error(response, "manifest upload").await)
        }
    }

    /// Check if a blob exists in the repository
    pub async fn blob_exists(&self, digest: &str) -> Result<bool> {
        let url = self.repository_url(&format!("blobs/{}", digest));
        let response = self.send(self.request(Method::HEAD, &url), "blob check").await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(HttpErrorHandler::handle_registry_error(status, "", "blob check")),
        }
    }

    /// Start downloading a blob; the body is streamed by the caller
    pub async fn get_blob(&self, digest: &str) -> Result<Response> {
        let url = self.repository_url(&format!("blobs/{}", digest));
        let response = self.send(self.request(Method::GET, &url), "blob download").await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::registry_error(response, "blob download").await)
        }
    }

    /// Upload a blob in a single request
    pub async fn upload_blob(&self, digest: &str, body: Body, length: Option<u64>) -> Result<()> {
        let url = self.repository_url("blobs/uploads/");
        let response = self.send(self.request(Method::POST, &url), "blob upload").await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                "blob upload start",
            ));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| SyncError::Registry("No Location header in upload response".to_string()))?;

        let mut upload_url = Url::parse(&url)?.join(location)?;
        upload_url.query_pairs_mut().append_pair("digest", digest);

        let mut request = self
            .request(Method::PUT, upload_url.as_str())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body);
        if let Some(length) = length {
            request = request.header(CONTENT_LENGTH, length);
        }

        let response = self.send(request, "blob upload").await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                "blob upload",
            ))
        }
    }
}

/// Resolve the `Link: <...>; rel="next"` header against the current page URL
fn next_page_url(current: &str, response: &Response) -> Result<Option<String>> {
    let Some(link) = response.headers().get(LINK).and_then(|value| value.to_str().ok()) else {
        return Ok(None);
    };

    let Some(target) = link
        .split(',')
        .find(|part| part.contains("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            part.get(start..end)
        })
    else {
        return Ok(None);
    };

    Ok(Some(Url::parse(current)?.join(target)?.to_string()))
}
