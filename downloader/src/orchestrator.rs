/// Run orchestration: builds the work set, skips resumed items, dispatches
/// every remaining item concurrently under its destination's limiter, and
/// applies the original-URL fallback.
use indicatif::ProgressBar;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use mirror_shared::checkpoint::CheckpointStore;
use mirror_shared::errors::MirrorResult;
use mirror_shared::limiter::{Destination, Destinations};
use mirror_shared::models::{CatalogEntry, Outcome};

use crate::fetch::{FetchEngine, HttpClient};
use crate::flush::FlushTimer;
use crate::resolver::{host_of, resolve, Resolution};

/// One distinct original URL and where it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub original: String,
    pub resolution: Resolution,
}

impl WorkItem {
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        let resolution = resolve(&original);
        Self {
            original,
            resolution,
        }
    }

    /// Whether there is no distinct resolved URL to fall back from.
    pub fn is_unwrapped(&self) -> bool {
        self.resolution.target() == self.original
    }

    /// Rate-limit domain for the first fetch.
    pub fn destination(&self) -> Destination {
        let host = host_of(self.resolution.target())
            .or_else(|| host_of(&self.original))
            .unwrap_or_default();
        Destination::Host(host)
    }
}

/// Cover and chapter URLs of every entry, deduplicated by original URL.
pub fn build_work_set(catalog: &[CatalogEntry]) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    catalog
        .iter()
        .flat_map(CatalogEntry::asset_urls)
        .filter(|url| seen.insert(*url))
        .map(WorkItem::new)
        .collect()
}

/// Counts for the end-of-run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub resumed: usize,
    pub stored: usize,
    pub failed: usize,
}

pub struct Orchestrator<C> {
    engine: Arc<FetchEngine<C>>,
    destinations: Destinations,
    checkpoint: CheckpointStore,
    flush_interval: Duration,
    progress: ProgressBar,
}

impl<C: HttpClient + 'static> Orchestrator<C> {
    pub fn new(engine: FetchEngine<C>, checkpoint: CheckpointStore, flush_interval: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            destinations: Destinations::new(),
            checkpoint,
            flush_interval,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn engine(&self) -> &FetchEngine<C> {
        &self.engine
    }

    /// Process every work item to a recorded outcome.
    pub async fn run(&self, mut items: Vec<WorkItem>) -> MirrorResult<RunStats> {
        let mut stats = RunStats {
            total: items.len(),
            ..RunStats::default()
        };
        self.progress.set_length(items.len() as u64);

        // Materialize resumed progress before any new work.
        self.checkpoint.flush_all().await?;

        items.shuffle(&mut rand::thread_rng());

        let timer = FlushTimer::start(self.checkpoint.clone(), self.flush_interval);
        let mut jobs = JoinSet::new();

        for item in items {
            if self.checkpoint.contains(&item.original).await {
                stats.resumed += 1;
                self.progress.inc(1);
                continue;
            }

            let engine = self.engine.clone();
            let destinations = self.destinations.clone();
            let checkpoint = self.checkpoint.clone();
            let progress = self.progress.clone();
            jobs.spawn(async move {
                let outcome = process_item(&engine, &destinations, &item).await;
                checkpoint.set(&item.original, outcome.clone()).await;
                progress.inc(1);
                outcome
            });
        }

        info!(
            "Dispatched {} fetches ({} already recorded)",
            stats.total - stats.resumed,
            stats.resumed
        );

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(Outcome::Stored(_)) => stats.stored += 1,
                Ok(Outcome::Failed(_)) => stats.failed += 1,
                Err(e) => {
                    error!("Fetch job aborted: {}", e);
                    stats.failed += 1;
                }
            }
        }

        timer.stop().await;
        self.checkpoint.flush_all().await?;
        self.progress.finish();

        for snapshot in self.destinations.stats().await {
            debug!(
                "Destination {}: {} in flight, {} waiting",
                snapshot.destination, snapshot.in_flight, snapshot.waiting
            );
        }
        info!("{} destinations used", self.destinations.len().await);

        Ok(stats)
    }
}

/// Fetch one item, falling back to its original URL through the retry
/// destination when the resolved URL fails.
async fn process_item<C: HttpClient>(
    engine: &FetchEngine<C>,
    destinations: &Destinations,
    item: &WorkItem,
) -> Outcome {
    let first = {
        let _permit = match destinations.acquire(&item.destination()).await {
            Ok(permit) => permit,
            Err(e) => return Outcome::Failed(e.to_string()),
        };
        if item.is_unwrapped() {
            // No distinct fallback exists; accept whatever comes back.
            return engine.fetch(&item.original, false).await;
        }
        engine.fetch(item.resolution.target(), true).await
    };

    if first.is_stored() {
        return first;
    }

    debug!(
        "Resolved URL for {} failed ({}), retrying original",
        item.original, first
    );
    let _permit = match destinations.acquire(&Destination::Retry).await {
        Ok(permit) => permit,
        Err(e) => return Outcome::Failed(e.to_string()),
    };
    engine.fetch(&item.original, false).await
}
