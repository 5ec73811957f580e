//! Per-tag transfer task

use crate::common::Timer;
use crate::config::RegistrySyncSpec;
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::{ImageReference, ImageTransfer, RegistryAuth, TrustPolicy};
use std::time::Duration;

/// Result of copying one tag
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub tag: String,
    pub source: String,
    pub destination: String,
    pub error: Option<SyncError>,
    pub duration: Duration,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Outcome for a task that never reported back
    pub fn failed(spec: &RegistrySyncSpec, tag: &str, error: SyncError) -> Self {
        Self {
            tag: tag.to_string(),
            source: format!("{}/{}:{}", spec.source_registry, spec.source_repository, tag),
            destination: format!("{}/{}:{}", spec.dest_registry, spec.dest_repository, tag),
            error: Some(error),
            duration: Duration::ZERO,
        }
    }
}

fn image_references(spec: &RegistrySyncSpec, tag: &str) -> Result<(ImageReference, ImageReference)> {
    let source = ImageReference::new(&spec.source_registry, &spec.source_repository, tag)?;
    let destination = ImageReference::new(&spec.dest_registry, &spec.dest_repository, tag)?;
    Ok((source, destination))
}

/// Copy a single tag from the spec's source to its destination.
///
/// Never returns an error: every failure is logged and recorded in the
/// outcome so sibling transfers are unaffected.
pub async fn transfer_tag<T: ImageTransfer + ?Sized>(
    transfer: &T,
    spec: &RegistrySyncSpec,
    tag: &str,
    source_auth: &RegistryAuth,
    destination_auth: &RegistryAuth,
    policy: TrustPolicy,
    output: &Logger,
) -> TransferOutcome {
    let timer = Timer::start(format!("Transfer of {}", tag));

    let (source, destination) = match image_references(spec, tag) {
        Ok(references) => references,
        Err(e) => {
            output.error(&format!("Skipping tag {} of {}: {}", tag, spec, e));
            return TransferOutcome::failed(spec, tag, e);
        }
    };

    output.step(&format!("Copying {} -> {}", source, destination));

    let result = transfer
        .copy_image(&source, &destination, source_auth, destination_auth, policy)
        .await;
    let duration = timer.stop();

    match &result {
        Ok(()) => output.success(&format!(
            "Copied {} -> {} in {}",
            source,
            destination,
            output.format_duration(duration)
        )),
        Err(e) => output.error(&format!(
            "Failed to copy {} -> {}: {}",
            source, destination, e
        )),
    }

    TransferOutcome {
        tag: tag.to_string(),
        source: source.to_string(),
        destination: destination.to_string(),
        error: result.err(),
        duration,
    }
}
