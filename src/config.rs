//! Configuration documents: the registry pairs to sync and the stored secrets
//!
//! Both documents are YAML and are loaded once at startup:
//!
//! ```yaml
//! registries:
//!   - source_registry: docker.io
//!     source_repository: library/nginx
//!     dest_registry: gcr.io
//!     dest_repository: my-project/nginx
//!     tag_limit: 5
//!     exclude_patterns: ["alpine", "^1\\.2[0-3]\\."]
//! ```
//!
//! ```yaml
//! secrets:
//!   - dest_registry: gcr.io
//!     type: gcr
//!     service_account_key: /var/run/secrets/gcr-key.json
//! ```

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One configured source → destination sync job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySyncSpec {
    pub source_registry: String,
    pub source_repository: String,
    pub dest_registry: String,
    pub dest_repository: String,
    /// Maximum number of tags to sync; `0` syncs nothing
    #[serde(default)]
    pub tag_limit: usize,
    /// Regexes searched anywhere in a tag; a hit excludes the tag
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl RegistrySyncSpec {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("source_registry", &self.source_registry),
            ("source_repository", &self.source_repository),
            ("dest_registry", &self.dest_registry),
            ("dest_repository", &self.dest_repository),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(SyncError::Validation(format!(
                    "{} cannot be empty (sync job {})",
                    name, self
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for RegistrySyncSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} -> {}/{}",
            self.source_registry, self.source_repository, self.dest_registry, self.dest_repository
        )
    }
}

/// Registry provider kind as written in the secrets document
///
/// As `type`, only `gcr` changes behavior: with a `service_account_key` the
/// key is exchanged for an access token. As `source_type`, any kind except an
/// unrecognised one makes the stored `username`/`password` apply to the
/// source registry. An empty pair still means anonymous access, so
/// `source_type: gcr` without a password reads the source anonymously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// Google Container Registry, authenticated with a service-account key
    #[serde(alias = "cloud-oauth")]
    Gcr,
    /// Azure Container Registry, username/password
    Acr,
    /// Docker Hub, username/password or access token
    Dockerhub,
    /// Any registry accepting basic auth
    Basic,
    /// Unrecognised value; never enables source credentials
    #[serde(other)]
    Other,
}

/// A stored credential, matched against registry hosts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    #[serde(default)]
    pub dest_registry: Option<String>,
    #[serde(default)]
    pub source_registry: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<RegistryKind>,
    #[serde(default)]
    pub source_type: Option<RegistryKind>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub service_account_key: Option<PathBuf>,
}

impl SecretRecord {
    /// Exact, case-sensitive match on either host field
    pub fn matches_host(&self, host: &str) -> bool {
        self.dest_registry.as_deref() == Some(host) || self.source_registry.as_deref() == Some(host)
    }

    pub fn is_cloud_oauth(&self) -> bool {
        self.kind == Some(RegistryKind::Gcr)
    }

    /// Service-account key path, ignoring an empty string
    pub fn service_account_key(&self) -> Option<&Path> {
        self.service_account_key
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Whether this record explicitly marks its source registry as one that
    /// needs credentials
    pub fn requires_source_auth(&self) -> bool {
        matches!(self.source_type, Some(kind) if kind != RegistryKind::Other)
    }
}

/// The registry-list document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub registries: Vec<RegistrySyncSpec>,
}

impl SyncConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config: SyncConfig = load_yaml(path, "registry configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.registries.iter().try_for_each(RegistrySyncSpec::validate)
    }
}

/// The secrets document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub secrets: Vec<SecretRecord>,
}

impl Secrets {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        load_yaml(path, "secrets")
    }
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!(
            "Failed to read {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        SyncError::Config(format!(
            "Failed to parse {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_registry_config() {
        let file = write_temp(
            r#"
registries:
  - source_registry: docker.io
    source_repository: library/nginx
    dest_registry: gcr.io
    dest_repository: my-project/nginx
    tag_limit: 3
    exclude_patterns: ["alpine", "rc"]
  - source_registry: quay.io
    source_repository: coreos/etcd
    dest_registry: registry.example.com
    dest_repository: mirror/etcd
"#,
        );

        let config = SyncConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.registries.len(), 2);
        assert_eq!(config.registries[0].tag_limit, 3);
        assert_eq!(config.registries[0].exclude_patterns, vec!["alpine", "rc"]);
        assert_eq!(config.registries[1].tag_limit, 0);
        assert!(config.registries[1].exclude_patterns.is_empty());
        assert_eq!(
            config.registries[0].to_string(),
            "docker.io/library/nginx -> gcr.io/my-project/nginx"
        );
    }

    #[test]
    fn test_load_secrets() {
        let file = write_temp(
            r#"
secrets:
  - dest_registry: gcr.io
    type: gcr
    service_account_key: /keys/gcr.json
  - dest_registry: registry.example.com
    source_registry: docker.io
    type: basic
    source_type: dockerhub
    username: bot
    password: hunter2
  - dest_registry: other.example.com
    type: cloud-oauth
    source_type: something-else
"#,
        );

        let secrets = Secrets::load_from_file(file.path()).unwrap().secrets;
        assert_eq!(secrets.len(), 3);
        assert!(secrets[0].is_cloud_oauth());
        assert_eq!(secrets[0].service_account_key(), Some(Path::new("/keys/gcr.json")));
        assert!(secrets[1].matches_host("docker.io"));
        assert!(secrets[1].matches_host("registry.example.com"));
        assert!(!secrets[1].matches_host("Docker.io"));
        assert!(secrets[1].requires_source_auth());
        assert!(secrets[2].is_cloud_oauth());
        assert_eq!(secrets[2].source_type, Some(RegistryKind::Other));
        assert!(!secrets[2].requires_source_auth());
    }

    #[test]
    fn test_negative_tag_limit_is_rejected() {
        let file = write_temp(
            r#"
registries:
  - source_registry: docker.io
    source_repository: library/nginx
    dest_registry: gcr.io
    dest_repository: nginx
    tag_limit: -1
"#,
        );

        assert!(matches!(
            SyncConfig::load_from_file(file.path()),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_empty_host_fails_validation() {
        let file = write_temp(
            r#"
registries:
  - source_registry: ""
    source_repository: library/nginx
    dest_registry: gcr.io
    dest_repository: nginx
"#,
        );

        assert!(matches!(
            SyncConfig::load_from_file(file.path()),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Secrets::load_from_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
