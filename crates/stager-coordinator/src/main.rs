use clap::Parser;
use stager_client::PackageMetadata;
use stager_coordinator::{CoordinatorError, StagingCoordinator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "stager-coordinator",
    about = "Reference Staging Coordinator for local staging runs"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8321)]
    port: u16,

    /// Package archive served on GET /data.
    #[arg(long)]
    package: Option<PathBuf>,

    /// JSON metadata document served on GET /meta.
    #[arg(long)]
    metadata: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CoordinatorError> {
    let mut coordinator = StagingCoordinator::new();
    if let Some(path) = &cli.package {
        info!("package: {}", path.display());
        coordinator = coordinator.with_package(std::fs::read(path)?);
    }
    if let Some(path) = &cli.metadata {
        info!("metadata: {}", path.display());
        let doc: PackageMetadata = serde_json::from_slice(&std::fs::read(path)?)?;
        coordinator = coordinator.with_metadata(doc);
    }

    let addr = format!("0.0.0.0:{}", cli.port);
    info!("starting stager-coordinator on {addr}");
    stager_coordinator::run_server(&coordinator, &addr)
}
