//! Command-line argument parsing

use crate::registry::TrustPolicy;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::Semaphore;

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-tag-sync")]
#[command(about = "Sync the newest semver-tagged images from source registries to destination registries")]
#[command(version, author)]
pub struct Args {
    /// Registry sync configuration file
    #[arg(
        long = "registry-config",
        env = "REGISTRY_CONFIG_PATH",
        help = "Path to the YAML document listing registry pairs to sync"
    )]
    pub registry_config: PathBuf,

    /// Secrets configuration file
    #[arg(
        long = "secrets-config",
        env = "SECRETS_CONFIG_PATH",
        help = "Path to the YAML document holding registry credentials"
    )]
    pub secrets_config: PathBuf,

    /// Signature trust policy for every copy
    #[arg(
        long = "trust-policy",
        env = "SYNC_TRUST_POLICY",
        value_enum,
        help = "Signature policy applied to copies: insecure-accept-anything or reject"
    )]
    pub trust_policy: TrustPolicy,

    /// Bound on concurrent tag transfers per registry pair
    #[arg(
        long = "max-concurrent-transfers",
        short = 'j',
        env = "SYNC_MAX_CONCURRENT_TRANSFERS",
        value_parser = clap::value_parser!(usize),
        help = "Maximum concurrent tag transfers per registry pair (default: unbounded)"
    )]
    pub max_concurrent_transfers: Option<usize>,

    /// Timeout in seconds for network operations
    #[arg(
        long = "timeout",
        short = 't',
        default_value = "3600",
        help = "Timeout for each registry request in seconds"
    )]
    pub timeout: u64,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        short = 'k',
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    /// Verbose output
    #[arg(
        long = "verbose",
        short = 'v',
        help = "Enable verbose output"
    )]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only report errors"
    )]
    pub quiet: bool,

    /// Log filter
    #[arg(
        long = "log-level",
        default_value = "info",
        help = "Log level or tracing filter directive; RUST_LOG takes precedence"
    )]
    pub log_level: String,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.max_concurrent_transfers == Some(0) {
            return Err("Max concurrent transfers must be greater than 0".to_string());
        }

        if let Some(limit) = self.max_concurrent_transfers {
            if limit > Semaphore::MAX_PERMITS {
                return Err(format!(
                    "Max concurrent transfers must be at most {}",
                    Semaphore::MAX_PERMITS
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const REQUIRED: &[&str] = &[
        "registry-tag-sync",
        "--registry-config",
        "registries.yaml",
        "--secrets-config",
        "secrets.yaml",
    ];

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_trust_policy_is_required() {
        let result = Args::try_parse_from(REQUIRED);
        if std::env::var_os("SYNC_TRUST_POLICY").is_none() {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_parse_full_command_line() {
        let mut argv = REQUIRED.to_vec();
        argv.extend([
            "--trust-policy",
            "insecure-accept-anything",
            "-j",
            "4",
            "--timeout",
            "60",
            "--skip-tls",
        ]);

        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.trust_policy, TrustPolicy::InsecureAcceptAnything);
        assert_eq!(args.max_concurrent_transfers, Some(4));
        assert_eq!(args.timeout, 60);
        assert!(args.skip_tls);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--trust-policy", "reject", "-j", "0"]);

        let args = Args::try_parse_from(argv).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_oversized_concurrency_rejected() {
        let too_many = (Semaphore::MAX_PERMITS + 1).to_string();
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--trust-policy", "reject", "-j", too_many.as_str()]);

        let args = Args::try_parse_from(argv).unwrap();
        assert!(args.validate().is_err());
    }
}
