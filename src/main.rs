use registry_tag_sync::cli::{Args, Runner};
use registry_tag_sync::logging::init_tracing;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    if let Err(e) = init_tracing(&args.log_level, args.quiet) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // Per-pair and per-tag failures are logged by the runner and do not
    // affect the exit status
    if let Err(e) = Runner::new(args).run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
