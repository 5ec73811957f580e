use async_trait::async_trait;
use pretty_assertions::assert_eq;
use registry_tag_sync::config::{RegistryKind, RegistrySyncSpec, SecretRecord};
use registry_tag_sync::credentials::{CredentialResolver, TokenSource};
use registry_tag_sync::registry::{ImageReference, ImageTransfer, RegistryAuth, RepositoryReference, TrustPolicy};
use registry_tag_sync::sync::{SyncOptions, SyncOrchestrator};
use registry_tag_sync::{Logger, Result, SyncError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory registry: tags per source repository, with configurable failures
#[derive(Default)]
struct FakeTransfer {
    tags: HashMap<String, Vec<String>>,
    failing_tags: HashSet<String>,
    panicking_tags: HashSet<String>,
    delay: Duration,
    /// Per-tag overrides of `delay`
    tag_delays: HashMap<String, Duration>,
    finished: Mutex<Vec<String>>,
    copied: Mutex<Vec<(String, String)>>,
    list_auth: Mutex<Vec<RegistryAuth>>,
    copy_auth: Mutex<Vec<(RegistryAuth, RegistryAuth)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransfer {
    fn with_tags(repository: &str, tags: &[&str]) -> Self {
        let mut fake = Self::default();
        fake.tags.insert(
            repository.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        fake
    }

    fn copied_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .copied
            .lock()
            .unwrap()
            .iter()
            .map(|(source, _)| source.rsplit_once(':').unwrap().1.to_string())
            .collect();
        tags.sort();
        tags
    }
}

#[async_trait]
impl ImageTransfer for FakeTransfer {
    async fn list_tags(&self, repository: &RepositoryReference, auth: &RegistryAuth) -> Result<Vec<String>> {
        self.list_auth.lock().unwrap().push(auth.clone());
        self.tags
            .get(&repository.to_string())
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("repository {}", repository)))
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

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = self.tag_delays.get(source.tag()).copied().unwrap_or(self.delay);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(source.tag().to_string());

        if self.panicking_tags.contains(source.tag()) {
            panic!("simulated transfer panic");
        }
        if self.failing_tags.contains(source.tag()) {
            return Err(SyncError::Registry(format!("manifest unknown: {}", source)));
        }

        self.copy_auth
            .lock()
            .unwrap()
            .push((source_auth.clone(), destination_auth.clone()));
        self.copied
            .lock()
            .unwrap()
            .push((source.to_string(), destination.to_string()));
        Ok(())
    }
}

struct FakeTokenSource {
    fail: bool,
}

#[async_trait]
impl TokenSource for FakeTokenSource {
    async fn access_token(&self, key_path: &Path) -> Result<String> {
        if self.fail {
            Err(SyncError::TokenExchange(format!(
                "invalid key file {}",
                key_path.display()
            )))
        } else {
            Ok("ya29.fresh-token".to_string())
        }
    }
}

fn spec(source_repository: &str, dest_repository: &str, tag_limit: usize, exclude: &[&str]) -> RegistrySyncSpec {
    RegistrySyncSpec {
        source_registry: "docker.io".to_string(),
        source_repository: source_repository.to_string(),
        dest_registry: "gcr.io".to_string(),
        dest_repository: dest_repository.to_string(),
        tag_limit,
        exclude_patterns: exclude.iter().map(|p| p.to_string()).collect(),
    }
}

fn gcr_secret() -> SecretRecord {
    SecretRecord {
        dest_registry: Some("gcr.io".to_string()),
        kind: Some(RegistryKind::Gcr),
        service_account_key: Some(PathBuf::from("/keys/sa.json")),
        ..Default::default()
    }
}

fn orchestrator(
    transfer: Arc<FakeTransfer>,
    secrets: Vec<SecretRecord>,
    token_fails: bool,
    options: SyncOptions,
) -> SyncOrchestrator {
    let resolver = CredentialResolver::new(
        secrets,
        Arc::new(FakeTokenSource { fail: token_fails }),
        Logger::new_quiet(),
    );
    SyncOrchestrator::new(transfer, resolver, options, Logger::new_quiet())
}

fn accept_all() -> SyncOptions {
    SyncOptions::new(TrustPolicy::InsecureAcceptAnything)
}

#[tokio::test]
async fn test_selects_newest_tags_and_copies_them() {
    let transfer = Arc::new(FakeTransfer::with_tags(
        "docker.io/library/nginx",
        &["v1.2.0", "1.10.0", "v1.9.5", "latest", "1.10.0-alpine"],
    ));
    let orchestrator = orchestrator(transfer.clone(), vec![gcr_secret()], false, accept_all());

    let outcome = orchestrator
        .run(&spec("nginx", "my-project/nginx", 2, &["alpine"]))
        .await
        .unwrap();

    assert_eq!(outcome.selected_tags, vec!["1.10.0", "v1.9.5"]);
    assert_eq!(outcome.succeeded(), 2);
    assert_eq!(transfer.copied_tags(), vec!["1.10.0", "v1.9.5"]);

    let copied = transfer.copied.lock().unwrap().clone();
    assert!(copied.contains(&(
        "docker.io/library/nginx:v1.9.5".to_string(),
        "gcr.io/my-project/nginx:v1.9.5".to_string()
    )));

    let auth = transfer.copy_auth.lock().unwrap().clone();
    assert!(auth.iter().all(|(source, destination)| {
        *source == RegistryAuth::Anonymous
            && *destination
                == RegistryAuth::Basic {
                    username: "oauth2accesstoken".to_string(),
                    password: "ya29.fresh-token".to_string(),
                }
    }));
}

#[tokio::test]
async fn test_one_failing_tag_does_not_fail_the_spec() {
    let mut fake = FakeTransfer::with_tags("docker.io/library/app", &["1.0.0", "2.0.0", "3.0.0"]);
    fake.failing_tags.insert("2.0.0".to_string());
    let transfer = Arc::new(fake);
    let orchestrator = orchestrator(transfer.clone(), vec![], false, accept_all());

    let outcome = orchestrator.run(&spec("app", "mirror/app", 3, &[])).await.unwrap();

    assert_eq!(outcome.transfers.len(), 3);
    assert_eq!(outcome.succeeded(), 2);
    assert_eq!(outcome.failed(), 1);
    assert_eq!(transfer.copied_tags(), vec!["1.0.0", "3.0.0"]);

    let failed = outcome.transfers.iter().find(|t| !t.is_success()).unwrap();
    assert_eq!(failed.tag, "2.0.0");
    assert!(matches!(failed.error, Some(SyncError::Registry(_))));
}

#[tokio::test]
async fn test_panicking_transfer_is_recorded_as_failure() {
    let mut fake = FakeTransfer::with_tags("docker.io/library/app", &["1.0.0", "2.0.0"]);
    fake.panicking_tags.insert("1.0.0".to_string());
    let transfer = Arc::new(fake);
    let orchestrator = orchestrator(transfer.clone(), vec![], false, accept_all());

    let outcome = orchestrator.run(&spec("app", "mirror/app", 5, &[])).await.unwrap();

    assert_eq!(outcome.succeeded(), 1);
    let failed = outcome.transfers.iter().find(|t| t.tag == "1.0.0").unwrap();
    assert!(matches!(failed.error, Some(SyncError::Task(_))));
}

#[tokio::test]
async fn test_listing_failure_fails_only_that_spec() {
    let transfer = Arc::new(FakeTransfer::with_tags("docker.io/library/present", &["1.0.0"]));
    let orchestrator = orchestrator(transfer.clone(), vec![], false, accept_all());

    let report = orchestrator
        .run_all(&[
            spec("missing", "mirror/missing", 5, &[]),
            spec("present", "mirror/present", 5, &[]),
        ])
        .await;

    assert_eq!(report.completed(), 1);
    assert_eq!(report.failed(), 1);
    assert!(matches!(report.specs[0].result, Err(SyncError::NotFound(_))));
    assert_eq!(transfer.copied_tags(), vec!["1.0.0"]);
}

#[tokio::test]
async fn test_token_exchange_failure_skips_spec_before_listing() {
    let transfer = Arc::new(FakeTransfer::with_tags("docker.io/library/app", &["1.0.0"]));
    let orchestrator = orchestrator(transfer.clone(), vec![gcr_secret()], true, accept_all());

    let report = orchestrator.run_all(&[spec("app", "mirror/app", 5, &[])]).await;

    assert_eq!(report.failed(), 1);
    assert!(matches!(report.specs[0].result, Err(SyncError::TokenExchange(_))));
    assert!(transfer.list_auth.lock().unwrap().is_empty());
    assert!(transfer.copied_tags().is_empty());
}

#[tokio::test]
async fn test_zero_limit_copies_nothing() {
    let transfer = Arc::new(FakeTransfer::with_tags("docker.io/library/app", &["1.0.0", "2.0.0"]));
    let orchestrator = orchestrator(transfer.clone(), vec![], false, accept_all());

    let outcome = orchestrator.run(&spec("app", "mirror/app", 0, &[])).await.unwrap();

    assert!(outcome.selected_tags.is_empty());
    assert!(outcome.transfers.is_empty());
    assert!(transfer.copied_tags().is_empty());
}

#[tokio::test]
async fn test_concurrency_bound_is_honoured() {
    let tags: Vec<String> = (1..=8).map(|i| format!("1.0.{}", i)).collect();
    let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
    let mut fake = FakeTransfer::with_tags("docker.io/library/app", &tag_refs);
    fake.delay = Duration::from_millis(20);
    let transfer = Arc::new(fake);

    let options = accept_all().with_max_concurrent_transfers(Some(2));
    let orchestrator = orchestrator(transfer.clone(), vec![], false, options);

    let outcome = orchestrator.run(&spec("app", "mirror/app", 8, &[])).await.unwrap();

    assert_eq!(outcome.succeeded(), 8);
    assert!(transfer.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_reject_policy_fails_every_tag_but_completes() {
    let transfer = Arc::new(FakeTransfer::with_tags("docker.io/library/app", &["1.0.0", "1.1.0"]));
    let options = SyncOptions::new(TrustPolicy::Reject);
    let orchestrator = orchestrator(transfer.clone(), vec![], false, options);

    let report = orchestrator.run_all(&[spec("app", "mirror/app", 5, &[])]).await;

    assert_eq!(report.completed(), 1);
    assert_eq!(report.transfers_failed(), 2);
    assert_eq!(report.transfers_succeeded(), 0);
    assert!(transfer.copied_tags().is_empty());
}

#[tokio::test]
async fn test_source_credentials_used_when_source_type_set() {
    let transfer = Arc::new(FakeTransfer::with_tags("docker.io/library/app", &["1.0.0"]));
    let secret = SecretRecord {
        dest_registry: Some("registry.example.com".to_string()),
        source_registry: Some("docker.io".to_string()),
        kind: Some(RegistryKind::Basic),
        source_type: Some(RegistryKind::Dockerhub),
        username: "hub-user".to_string(),
        password: "hub-pass".to_string(),
        ..Default::default()
    };
    let orchestrator = orchestrator(transfer.clone(), vec![secret], false, accept_all());

    orchestrator.run(&spec("app", "mirror/app", 1, &[])).await.unwrap();

    let expected = RegistryAuth::Basic {
        username: "hub-user".to_string(),
        password: "hub-pass".to_string(),
    };
    assert_eq!(transfer.list_auth.lock().unwrap().clone(), vec![expected.clone()]);
    // gcr.io has no record of its own, so the push is anonymous
    assert_eq!(
        transfer.copy_auth.lock().unwrap().clone(),
        vec![(expected, RegistryAuth::Anonymous)]
    );
}

#[tokio::test]
async fn test_unbounded_fan_out_runs_every_tag_at_once() {
    let mut fake = FakeTransfer::with_tags(
        "docker.io/library/app",
        &["1.0.0", "1.1.0", "1.2.0", "1.3.0", "1.4.0"],
    );
    fake.delay = Duration::from_millis(50);
    let transfer = Arc::new(fake);
    let orchestrator = orchestrator(transfer.clone(), vec![], false, accept_all());

    let outcome = orchestrator.run(&spec("app", "mirror/app", 5, &[])).await.unwrap();

    assert_eq!(outcome.succeeded(), 5);
    assert_eq!(
        transfer.max_in_flight.load(Ordering::SeqCst),
        outcome.selected_tags.len()
    );
}

#[tokio::test]
async fn test_early_failure_does_not_disturb_slower_transfers() {
    let mut fake = FakeTransfer::with_tags("docker.io/library/app", &["1.0.0", "2.0.0", "3.0.0"]);
    fake.delay = Duration::from_millis(50);
    fake.failing_tags.insert("2.0.0".to_string());
    fake.tag_delays.insert("2.0.0".to_string(), Duration::ZERO);
    let transfer = Arc::new(fake);
    let orchestrator = orchestrator(transfer.clone(), vec![], false, accept_all());

    let outcome = orchestrator.run(&spec("app", "mirror/app", 3, &[])).await.unwrap();

    assert_eq!(transfer.finished.lock().unwrap().first().map(String::as_str), Some("2.0.0"));
    assert_eq!(outcome.succeeded(), 2);
    assert_eq!(outcome.failed(), 1);
    assert_eq!(transfer.copied_tags(), vec!["1.0.0", "3.0.0"]);
}

#[tokio::test]
async fn test_oversized_concurrency_limit_still_syncs() {
    let transfer = Arc::new(FakeTransfer::with_tags("docker.io/library/app", &["1.0.0", "2.0.0"]));
    let options = accept_all().with_max_concurrent_transfers(Some(usize::MAX));
    let orchestrator = orchestrator(transfer.clone(), vec![], false, options);

    let outcome = orchestrator.run(&spec("app", "mirror/app", 2, &[])).await.unwrap();

    assert_eq!(outcome.succeeded(), 2);
}
