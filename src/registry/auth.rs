//! Authentication module for Docker registry access
//!
//! Follows the registry token flow: ping `/v2/`, read the `WWW-Authenticate`
//! challenge, and either fetch a scoped bearer token from the advertised realm
//! or fall back to basic auth.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::RegistryAuth;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Access a registry session needs on its repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    Pull,
    Push,
}

impl RegistryOperation {
    fn scope_actions(self) -> &'static str {
        match self {
            RegistryOperation::Pull => "pull",
            RegistryOperation::Push => "pull,push",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Credentials attached to every request of a session
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    Bearer(String),
    Basic { username: String, password: String },
}

impl Authorization {
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Authorization::Bearer(token) => request.bearer_auth(token),
            Authorization::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Authorization::Basic { username, .. } => write!(f, "Basic({})", username),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Auth {
    client: Client,
    endpoint: String,
    output: Logger,
}

impl Auth {
    pub fn new(client: Client, endpoint: &str, output: Logger) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            output,
        }
    }

    /// Work out how to authorize requests for `repository`.
    ///
    /// Returns `None` when the registry does not challenge at all.
    pub async fn authenticate(
        &self,
        repository: &str,
        operation: RegistryOperation,
        credentials: &RegistryAuth,
    ) -> Result<Option<Authorization>> {
        let Some(challenge_header) = self.get_auth_challenge().await? else {
            self.output
                .detail(&format!("No authentication challenge from {}", self.endpoint));
            return Ok(None);
        };

        if let Some(challenge) = parse_bearer_challenge(&challenge_header) {
            let scope = format!("repository:{}:{}", repository, operation.scope_actions());
            self.output.detail(&format!(
                "Auth challenge received: realm={}, service={}, scope={}",
                challenge.realm,
                challenge.service.as_deref().unwrap_or(""),
                scope
            ));
            let token = self.get_token(&challenge, &scope, credentials).await?;
            return Ok(Some(Authorization::Bearer(token)));
        }

        if challenge_header.trim_start().to_ascii_lowercase().starts_with("basic") {
            return match credentials {
                RegistryAuth::Basic { username, password } => Ok(Some(Authorization::Basic {
                    username: username.clone(),
                    password: password.clone(),
                })),
                RegistryAuth::Anonymous => Err(SyncError::Auth(format!(
                    "{} requires basic authentication but no credentials are configured",
                    self.endpoint
                ))),
            };
        }

        Err(SyncError::Auth(format!(
            "Unsupported authentication challenge from {}: {}",
            self.endpoint, challenge_header
        )))
    }

    async fn get_auth_challenge(&self) -> Result<Option<String>> {
        let url = format!("{}/v2/", self.endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "registry ping"))?;

        let status = response.status();
        self.output
            .detail(&format!("Auth challenge response status: {}", status));

        if status == StatusCode::UNAUTHORIZED {
            let header = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .ok_or_else(|| {
                    SyncError::Auth(format!(
                        "{} returned 401 without a WWW-Authenticate header",
                        self.endpoint
                    ))
                })?
                .to_str()
                .map_err(|e| SyncError::Auth(format!("Invalid auth header: {}", e)))?;
            return Ok(Some(header.to_string()));
        }

        if status.is_success() {
            return Ok(None);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(HttpErrorHandler::handle_registry_error(
            status,
            &error_text,
            "registry ping",
        ))
    }

    async fn get_token(
        &self,
        challenge: &AuthChallenge,
        scope: &str,
        credentials: &RegistryAuth,
    ) -> Result<String> {
        let mut query: Vec<(&str, &str)> = vec![("scope", scope)];
        if let Some(service) = challenge.service.as_deref() {
            query.push(("service", service));
        }

        let mut request = self.client.get(&challenge.realm).query(&query);
        if let RegistryAuth::Basic { username, password } = credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            self.output.detail(&format!(
                "Token request failed with status {}: {}",
                status, error_text
            ));
            return Err(HttpErrorHandler::handle_auth_error(status, &error_text));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("Failed to parse token response: {}", e)))?;

        if let Some(expires_in) = token_response.expires_in {
            self.output
                .detail(&format!("Token expires in {} seconds", expires_in));
        }

        token_response
            .token
            .or(token_response.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SyncError::Auth("Token response did not contain a token".to_string()))
    }
}

/// Parse `Bearer realm="...",service="...",scope="..."`
pub fn parse_bearer_challenge(header: &str) -> Option<AuthChallenge> {
    let header = header.trim();
    let (scheme, params_str) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let mut params = HashMap::new();
    let mut rest = params_str;
    while let Some((key, after_key)) = rest.split_once('=') {
        let key = key.trim().trim_start_matches(',').trim();
        let after_key = after_key.trim_start();

        // Quoted values may themselves contain commas, as scopes often do
        let (value, remainder) = if let Some(quoted) = after_key.strip_prefix('"') {
            match quoted.split_once('"') {
                Some((value, remainder)) => (value, remainder),
                None => (quoted, ""),
            }
        } else {
            match after_key.split_once(',') {
                Some((value, remainder)) => (value.trim(), remainder),
                None => (after_key.trim(), ""),
            }
        };

        params.insert(key.to_ascii_lowercase(), value.to_string());
        rest = remainder;
    }

    let realm = params.remove("realm")?;
    Some(AuthChallenge {
        realm,
        service: params.remove("service").filter(|s| !s.is_empty()),
        scope: params.remove("scope"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bearer_challenge() {
        let challenge = parse_bearer_challenge(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/nginx:pull,push""#,
        )
        .unwrap();

        assert_eq!(
            challenge,
            AuthChallenge {
                realm: "https://auth.docker.io/token".to_string(),
                service: Some("registry.docker.io".to_string()),
                scope: Some("repository:library/nginx:pull,push".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_challenge_without_service() {
        let challenge = parse_bearer_challenge(r#"Bearer realm="https://gcr.io/v2/token""#).unwrap();
        assert_eq!(challenge.realm, "https://gcr.io/v2/token");
        assert_eq!(challenge.service, None);
    }

    #[test]
    fn test_non_bearer_challenge() {
        assert!(parse_bearer_challenge(r#"Basic realm="Registry Realm""#).is_none());
        assert!(parse_bearer_challenge(r#"Bearer service="no-realm""#).is_none());
    }

    #[test]
    fn test_authorization_debug_redacts_token() {
        let auth = Authorization::Bearer("secret-token".to_string());
        assert!(!format!("{:?}", auth).contains("secret-token"));
    }
}
