//! Sync orchestration
//!
//! For each configured pair the orchestrator resolves credentials, lists the
//! source tags, selects the newest semver tags and copies each one in its own
//! task. Specs run one after another; the tags of a spec run concurrently,
//! optionally bounded by a semaphore. A failed tag never fails its spec, and a
//! failed spec never stops the next one.

pub mod transfer;

use crate::config::RegistrySyncSpec;
use crate::credentials::CredentialResolver;
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::{ImageTransfer, RegistryAuth, RepositoryReference, TrustPolicy};
use crate::tags::select_tags;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub use transfer::{TransferOutcome, transfer_tag};

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub trust_policy: TrustPolicy,
    /// Upper bound on concurrent tag transfers per spec; `None` is unbounded
    pub max_concurrent_transfers: Option<usize>,
}

impl SyncOptions {
    pub fn new(trust_policy: TrustPolicy) -> Self {
        Self {
            trust_policy,
            max_concurrent_transfers: None,
        }
    }

    /// `0` means unbounded; limits above what a semaphore can hold are clamped
    pub fn with_max_concurrent_transfers(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_transfers = limit
            .filter(|n| *n > 0)
            .map(|n| n.min(Semaphore::MAX_PERMITS));
        self
    }
}

/// What happened to one spec that got as far as its fan-out
#[derive(Debug, Clone)]
pub struct SpecOutcome {
    pub spec: String,
    pub selected_tags: Vec<String>,
    pub transfers: Vec<TransferOutcome>,
}

impl SpecOutcome {
    pub fn succeeded(&self) -> usize {
        self.transfers.iter().filter(|t| t.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.transfers.len() - self.succeeded()
    }
}

#[derive(Debug, Clone)]
pub struct SpecResult {
    pub spec: String,
    pub result: Result<SpecOutcome>,
}

/// Results of a whole run, in spec order
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub specs: Vec<SpecResult>,
}

impl SyncReport {
    pub fn completed(&self) -> usize {
        self.specs.iter().filter(|s| s.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.specs.len() - self.completed()
    }

    pub fn transfers_succeeded(&self) -> usize {
        self.outcomes().map(SpecOutcome::succeeded).sum()
    }

    pub fn transfers_failed(&self) -> usize {
        self.outcomes().map(SpecOutcome::failed).sum()
    }

    fn outcomes(&self) -> impl Iterator<Item = &SpecOutcome> {
        self.specs.iter().filter_map(|s| s.result.as_ref().ok())
    }
}

pub struct SyncOrchestrator {
    transfer: Arc<dyn ImageTransfer>,
    resolver: CredentialResolver,
    options: SyncOptions,
    output: Logger,
}

impl SyncOrchestrator {
    pub fn new(
        transfer: Arc<dyn ImageTransfer>,
        resolver: CredentialResolver,
        options: SyncOptions,
        output: Logger,
    ) -> Self {
        Self {
            transfer,
            resolver,
            options,
            output,
        }
    }

    /// Run every spec in order; failures are recorded, never propagated
    pub async fn run_all(&self, specs: &[RegistrySyncSpec]) -> SyncReport {
        let mut report = SyncReport::default();

        for spec in specs {
            let result = self.run(spec).await;
            if let Err(e) = &result {
                self.output
                    .error(&format!("Sync of {} failed: {}", spec, e));
            }
            report.specs.push(SpecResult {
                spec: spec.to_string(),
                result,
            });
        }

        report
    }

    /// Sync one spec.
    ///
    /// Returns an error only when the spec could not reach its fan-out:
    /// destination credentials or tag discovery failed. Tag failures are
    /// reported inside the outcome.
    pub async fn run(&self, spec: &RegistrySyncSpec) -> Result<SpecOutcome> {
        self.output.section(&format!("Syncing {}", spec));

        let (destination_credential, found) = self.resolver.resolve(&spec.dest_registry).await?;
        if !found {
            self.output.warning(&format!(
                "No secret configured for destination {}, pushing anonymously",
                spec.dest_registry
            ));
        }
        let source_credential = self.resolver.resolve_source(&spec.source_registry);

        let source_repository = RepositoryReference::new(&spec.source_registry, &spec.source_repository)?;
        let source_auth = source_credential.to_registry_auth();
        let tags = self.transfer.list_tags(&source_repository, &source_auth).await?;
        self.output.info(&format!(
            "Found {} tags in {}",
            tags.len(),
            source_repository
        ));

        let selected = select_tags(&tags, &spec.exclude_patterns, spec.tag_limit, &self.output);
        self.output.list("Selected tags", &selected);

        let transfers = self
            .fan_out(
                spec,
                &selected,
                source_auth,
                destination_credential.to_registry_auth(),
            )
            .await;

        let outcome = SpecOutcome {
            spec: spec.to_string(),
            selected_tags: selected,
            transfers,
        };
        self.output.info(&format!(
            "Finished {}: {} succeeded, {} failed",
            spec,
            outcome.succeeded(),
            outcome.failed()
        ));

        Ok(outcome)
    }

    async fn fan_out(
        &self,
        spec: &RegistrySyncSpec,
        tags: &[String],
        source_auth: RegistryAuth,
        destination_auth: RegistryAuth,
    ) -> Vec<TransferOutcome> {
        let spec_arc = Arc::new(spec.clone());
        let source_auth = Arc::new(source_auth);
        let destination_auth = Arc::new(destination_auth);
        let semaphore = self
            .options
            .max_concurrent_transfers
            .map(|limit| Arc::new(Semaphore::new(limit.min(Semaphore::MAX_PERMITS))));

        let handles = tags.iter().map(|tag| {
            let transfer = Arc::clone(&self.transfer);
            let spec = Arc::clone(&spec_arc);
            let source_auth = Arc::clone(&source_auth);
            let destination_auth = Arc::clone(&destination_auth);
            let semaphore = semaphore.clone();
            let policy = self.options.trust_policy;
            let output = self.output.clone();
            let tag = tag.clone();

            tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => match semaphore.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(e) => {
                            return TransferOutcome::failed(
                                &spec,
                                &tag,
                                SyncError::Task(format!("Failed to acquire transfer permit: {}", e)),
                            );
                        }
                    },
                    None => None,
                };

                transfer_tag(
                    transfer.as_ref(),
                    &spec,
                    &tag,
                    &source_auth,
                    &destination_auth,
                    policy,
                    &output,
                )
                .await
            })
        });

        join_all(handles)
            .await
            .into_iter()
            .zip(tags)
            .map(|(joined, tag)| {
                joined.unwrap_or_else(|e| {
                    let error = SyncError::from(e);
                    self.output
                        .error(&format!("Transfer of tag {} did not complete: {}", tag, error));
                    TransferOutcome::failed(spec, tag, error)
                })
            })
            .collect()
    }
}
