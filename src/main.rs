use anyhow::Context;
use clap::Parser;
use nexis_downloader::config::Config;
use nexis_downloader::Orchestrator;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Download lists and tokens come from the environment:
/// `HF_REPOS_TO_DOWNLOAD`, `HUGGINGFACE_TOKEN`, `CIVITAI_TOKEN`,
/// `CIVITAI_CHECKPOINTS_TO_DOWNLOAD`, `CIVITAI_LORAS_TO_DOWNLOAD`,
/// `CIVITAI_VAES_TO_DOWNLOAD` and `DEBUG_MODE`.
#[derive(Parser)]
#[command(name = "nexis-downloader")]
#[command(about = "Stage Hugging Face repos and Civitai models for a workspace", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the staging root directory
    #[arg(long, value_name = "PATH")]
    staging_root: Option<PathBuf>,

    /// Exit with status 1 if any download failed
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(root) = cli.staging_root {
        config.staging.root = root;
    }

    init_logging(config.debug);
    tracing::debug!("Configuration: {config:?}");

    let report = Orchestrator::new(config)
        .run()
        .await
        .context("Download run aborted")?;

    tracing::info!(
        "Finished in {}s: {} successful, {} failed",
        (report.finished_at - report.started_at).num_seconds(),
        report.succeeded(),
        report.failed()
    );

    if cli.strict && report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `DEBUG_MODE` selects debug or info
fn init_logging(debug: bool) {
    let default_directive = if debug {
        "info,nexis_downloader=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
