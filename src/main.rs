use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use clipsmith::{
    batch::{BatchJob, BatchOrchestrator},
    config::Config,
    pipeline::RenditionEngine,
};

#[derive(Parser)]
#[command(
    name = "clipsmith",
    version,
    about = "Render Twitter and YouTube Shorts cuts of a folder of videos",
    long_about = "clipsmith renders every video in a folder twice: once at its own size for Twitter, and once as a 1080x1920 YouTube Shorts cut with a blurred background. Each rendition gets its outro appended, and originals are archived once both renditions succeed."
)]
struct Cli {
    /// Directory containing the source videos
    #[arg(long)]
    input_dir: PathBuf,

    /// Root directory for the twitter/ and youtube/ outputs
    #[arg(long)]
    output_dir: PathBuf,

    /// Directory the originals are copied to after both renditions succeed
    #[arg(long)]
    archive_dir: PathBuf,

    /// Outro appended to the Twitter rendition
    #[arg(long)]
    twitter_outro: PathBuf,

    /// Outro appended to the YouTube Shorts rendition
    #[arg(long)]
    youtube_outro: PathBuf,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of videos processed at the same time
    #[arg(short, long)]
    workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    info!("Starting clipsmith v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path).map_err(|e| anyhow::anyhow!(e.user_message()))?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    if let Some(workers) = cli.workers {
        config.batch.workers = workers;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.processing.threads)
        .build_global()
    {
        warn!("Could not size the frame worker pool: {}", e);
    }

    let job = BatchJob {
        input_dir: cli.input_dir,
        output_dir: cli.output_dir,
        archive_dir: cli.archive_dir,
        twitter_outro: cli.twitter_outro,
        youtube_outro: cli.youtube_outro,
    };

    let engine = RenditionEngine::new(config)?;
    let report = BatchOrchestrator::new(engine, job).run().await?;

    for file in report.files.iter().filter(|f| !f.succeeded()) {
        for rendition in &file.renditions {
            if let Err(e) = &rendition.result {
                error!("{} [{}]: {}", file.source.display(), rendition.format, e);
            }
        }
        if let Some(e) = &file.error {
            error!("{}: {}", file.source.display(), e);
        }
    }

    if !report.is_success() {
        let failed = report.files.iter().filter(|f| !f.succeeded()).count();
        anyhow::bail!("{} of {} videos did not complete", failed, report.total_files());
    }

    info!("All {} videos processed", report.total_files());
    Ok(())
}
