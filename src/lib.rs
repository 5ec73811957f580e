//! Registry Tag Sync Library
//!
//! Keeps destination registries stocked with the newest semver-tagged images
//! of their source repositories. Each configured pair resolves its
//! credentials, lists and ranks the source tags, and copies the selected tags
//! concurrently with per-tag failure isolation.

pub mod cli;
pub mod common;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod registry;
pub mod sync;
pub mod tags;

pub use config::{RegistrySyncSpec, SecretRecord, Secrets, SyncConfig};
pub use credentials::{CredentialResolver, ResolvedCredential};
pub use error::{Result, SyncError};
pub use logging::Logger;
pub use registry::{ImageTransfer, RegistryAuth, RegistryTransfer, TrustPolicy};
pub use sync::{SpecOutcome, SyncOptions, SyncOrchestrator, SyncReport, TransferOutcome};
pub use tags::{TagSelector, select_tags};
