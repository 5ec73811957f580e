//! Service-account key → OAuth access token exchange
//!
//! Implements the JWT bearer grant used by Google Cloud service accounts: an
//! RS256-signed assertion is posted to the key's token endpoint and the
//! returned access token is used as the registry password.

use crate::error::handlers::HttpErrorHandler;
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Storage scope granting pull and push on GCR-backed repositories
pub const STORAGE_READ_WRITE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);

/// Source of short-lived bearer tokens for a service-account key file
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self, key_path: &Path) -> Result<String>;
}

/// The fields of a service-account key document this exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            SyncError::TokenExchange(format!(
                "Failed to read service account key file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_slice(&data).map_err(|e| {
            SyncError::TokenExchange(format!(
                "Failed to parse service account key file {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Production [`TokenSource`] talking to the key's OAuth token endpoint
#[derive(Debug, Clone)]
pub struct ServiceAccountTokenSource {
    client: Client,
    scope: String,
    output: Logger,
}

impl ServiceAccountTokenSource {
    pub fn new(client: Client, output: Logger) -> Self {
        Self {
            client,
            scope: STORAGE_READ_WRITE_SCOPE.to_string(),
            output,
        }
    }

    /// Build the signed JWT assertion for `key`
    pub fn build_assertion(&self, key: &ServiceAccountKey) -> Result<String> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SyncError::TokenExchange(format!("System clock error: {}", e)))?
            .as_secs();

        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: &self.scope,
            aud: key.token_uri(),
            iat,
            exp: iat + ASSERTION_LIFETIME.as_secs(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            SyncError::TokenExchange(format!("Invalid service account private key: {}", e))
        })?;

        jsonwebtoken::encode(&header, &claims, &encoding_key)
            .map_err(|e| SyncError::TokenExchange(format!("Failed to sign JWT assertion: {}", e)))
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<String> {
        let assertion = self.build_assertion(key)?;
        self.output.detail(&format!(
            "Requesting access token for {} from {}",
            key.client_email,
            key.token_uri()
        ));

        let response = self
            .client
            .post(key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::TokenExchange(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            let err = HttpErrorHandler::handle_auth_error(status, &error_text);
            return Err(SyncError::TokenExchange(err.to_string()));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            SyncError::TokenExchange(format!("Failed to parse token response: {}", e))
        })?;

        if let Some(expires_in) = token_response.expires_in {
            self.output
                .detail(&format!("Access token expires in {} seconds", expires_in));
        }

        token_response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                SyncError::TokenExchange("Token response did not contain an access_token".to_string())
            })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self, key_path: &Path) -> Result<String> {
        let key = ServiceAccountKey::from_file(key_path)?;
        self.exchange(&key).await
    }
}
