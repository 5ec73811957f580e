//! Credential resolution for source and destination registries
//!
//! Secrets are matched by exact host equality against either host field of a
//! [`SecretRecord`]; the first matching record in declaration order wins. A
//! host with no record resolves to anonymous access, which is how public
//! repositories are read.

pub mod oauth;

use crate::config::SecretRecord;
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::RegistryAuth;
use std::fmt;
use std::sync::Arc;

pub use oauth::{ServiceAccountTokenSource, TokenSource};

/// Username GCR expects alongside an OAuth access token
pub const OAUTH_TOKEN_USERNAME: &str = "oauth2accesstoken";

/// Username/password pair for one registry; both empty means anonymous
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub username: String,
    pub password: String,
}

impl ResolvedCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    pub fn to_registry_auth(&self) -> RegistryAuth {
        if self.is_anonymous() {
            RegistryAuth::Anonymous
        } else {
            RegistryAuth::Basic {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        }
    }
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Looks up stored secrets and mints OAuth tokens where a record asks for it
#[derive(Clone)]
pub struct CredentialResolver {
    secrets: Arc<Vec<SecretRecord>>,
    token_source: Arc<dyn TokenSource>,
    output: Logger,
}

impl CredentialResolver {
    pub fn new(secrets: Vec<SecretRecord>, token_source: Arc<dyn TokenSource>, output: Logger) -> Self {
        Self {
            secrets: Arc::new(secrets),
            token_source,
            output,
        }
    }

    /// First record whose destination or source host equals `host`
    pub fn find_secret(&self, host: &str) -> Option<&SecretRecord> {
        self.secrets.iter().find(|secret| secret.matches_host(host))
    }

    /// Resolve the credential for `host`; the flag reports whether a record
    /// matched.
    ///
    /// A cloud-OAuth record with a service-account key is exchanged for a
    /// fresh access token. Failing that exchange is an error; a missing
    /// record is not.
    pub async fn resolve(&self, host: &str) -> Result<(ResolvedCredential, bool)> {
        let Some(secret) = self.find_secret(host) else {
            self.output
                .detail(&format!("No stored secret for {}, using anonymous access", host));
            return Ok((ResolvedCredential::anonymous(), false));
        };

        if secret.is_cloud_oauth() {
            if let Some(key_path) = secret.service_account_key() {
                self.output.step(&format!(
                    "Exchanging service account key for an access token for {}",
                    host
                ));
                let token = self.token_source.access_token(key_path).await?;
                return Ok((ResolvedCredential::new(OAUTH_TOKEN_USERNAME, token), true));
            }
        }

        Ok((
            ResolvedCredential::new(secret.username.clone(), secret.password.clone()),
            true,
        ))
    }

    /// Credential for reading from a source registry.
    ///
    /// Stored username/password are used only when the matched record sets a
    /// `source_type` that needs authentication; otherwise the source is read
    /// anonymously. No token exchange happens on this leg.
    pub fn resolve_source(&self, host: &str) -> ResolvedCredential {
        match self.find_secret(host) {
            Some(secret) if secret.requires_source_auth() => {
                self.output
                    .detail(&format!("Using stored credentials for source registry {}", host));
                ResolvedCredential::new(secret.username.clone(), secret.password.clone())
            }
            _ => ResolvedCredential::anonymous(),
        }
    }
}
