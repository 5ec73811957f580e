//! Runner: wires configuration, credentials and the transport together

use crate::cli::args::Args;
use crate::common::Timer;
use crate::config::{Secrets, SyncConfig};
use crate::credentials::{CredentialResolver, ServiceAccountTokenSource};
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::{RegistryTransfer, TrustPolicy};
use crate::sync::{SyncOptions, SyncOrchestrator, SyncReport};
use std::sync::Arc;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, output }
    }

    /// Load configuration and sync every registry pair.
    ///
    /// Only startup problems are returned as errors; per-pair and per-tag
    /// failures end up in the report.
    pub async fn run(&self) -> Result<SyncReport> {
        let timer = Timer::start("Registry sync");

        self.output.section("Registry Tag Sync");
        self.args.validate().map_err(SyncError::Validation)?;

        let config = SyncConfig::load_from_file(&self.args.registry_config)?;
        let secrets = Secrets::load_from_file(&self.args.secrets_config)?;
        self.output.summary_kv(
            "Configuration",
            &[
                ("Registry config", self.args.registry_config.display().to_string()),
                ("Secrets config", self.args.secrets_config.display().to_string()),
                ("Registry pairs", config.registries.len().to_string()),
                ("Stored secrets", secrets.secrets.len().to_string()),
                ("Trust policy", self.args.trust_policy.to_string()),
                (
                    "Max concurrent transfers",
                    self.args
                        .max_concurrent_transfers
                        .map_or_else(|| "unbounded".to_string(), |n| n.to_string()),
                ),
            ],
        );

        if self.args.trust_policy == TrustPolicy::InsecureAcceptAnything {
            self.output
                .warning("Trust policy accepts any image without signature verification");
        }

        let transfer = RegistryTransfer::new(self.args.timeout, self.args.skip_tls, self.output.clone())?;
        let token_source = ServiceAccountTokenSource::new(transfer.http_client().clone(), self.output.clone());
        let resolver = CredentialResolver::new(secrets.secrets, Arc::new(token_source), self.output.clone());

        let options = SyncOptions::new(self.args.trust_policy)
            .with_max_concurrent_transfers(self.args.max_concurrent_transfers);
        let orchestrator = SyncOrchestrator::new(Arc::new(transfer), resolver, options, self.output.clone());

        let report = orchestrator.run_all(&config.registries).await;
        self.print_summary(&report);
        timer.log_elapsed(&self.output);

        Ok(report)
    }

    fn print_summary(&self, report: &SyncReport) {
        self.output.summary_kv(
            "Summary",
            &[
                ("Registry pairs completed", report.completed().to_string()),
                ("Registry pairs failed", report.failed().to_string()),
                ("Tags copied", report.transfers_succeeded().to_string()),
                ("Tags failed", report.transfers_failed().to_string()),
            ],
        );

        for result in &report.specs {
            if let Err(e) = &result.result {
                self.output.warning(&format!("{}: {}", result.spec, e));
            }
        }
    }
}
