/// Asset Mirror - Main Entry Point
///
/// Fetches every cover and chapter asset referenced by the catalog into a
/// content-addressed directory, resuming from the last checkpoint.
use anyhow::Context;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;

use mirror_downloader::config::Config;
use mirror_downloader::fetch::{FetchEngine, ReqwestClient};
use mirror_downloader::orchestrator::{build_work_set, Orchestrator};
use mirror_downloader::store::ContentStore;
use mirror_shared::checkpoint::CheckpointStore;
use mirror_shared::models::load_catalog;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mirror_downloader=info,mirror_shared=info".into()),
        )
        .init();

    info!("=== Asset Mirror Starting ===");

    let config = Config::from_env()?;
    info!(
        "Catalog: {} | output: {} | checkpoint: {}",
        config.catalog_path.display(),
        config.output_dir.display(),
        config.checkpoint_path.display()
    );

    let catalog = load_catalog(&config.catalog_path)?;
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;

    let items = build_work_set(&catalog);
    info!("{} catalog entries, {} distinct asset URLs", catalog.len(), items.len());

    let checkpoint = CheckpointStore::load(config.checkpoint_paths(), catalog)?;
    let client = ReqwestClient::new(config.request_timeout).context("Failed to build HTTP client")?;
    let engine = FetchEngine::new(client, ContentStore::new(&config.output_dir));

    let progress = ProgressBar::with_draw_target(Some(items.len() as u64), ProgressDrawTarget::stderr());
    progress.set_style(
        ProgressStyle::with_template("{pos}/{len}").unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let orchestrator = Orchestrator::new(engine, checkpoint, config.flush_interval).with_progress(progress);
    let stats = orchestrator.run(items).await?;

    info!(
        "Run complete: {} total, {} resumed, {} stored, {} failed",
        stats.total, stats.resumed, stats.stored, stats.failed
    );
    Ok(())
}
