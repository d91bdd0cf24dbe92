/// Durable URL -> outcome map used to resume interrupted runs.
///
/// The map lives in memory and is written wholesale, together with the
/// denormalized output catalog, on every flush.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::MirrorResult;
use crate::models::{CatalogEntry, Outcome};

/// Where the checkpoint store reads and writes.
#[derive(Debug, Clone)]
pub struct CheckpointPaths {
    /// JSON object of original URL -> outcome string.
    pub checkpoint: PathBuf,
    /// Catalog with `coverPath`/`chapterPaths` filled in.
    pub output_catalog: PathBuf,
    /// Directory stored assets live under.
    pub output_dir: PathBuf,
}

#[derive(Clone)]
pub struct CheckpointStore {
    outcomes: Arc<Mutex<HashMap<String, Outcome>>>,
    catalog: Arc<Vec<CatalogEntry>>,
    paths: Arc<CheckpointPaths>,
    /// Serializes flushes so two writers never share the temp file.
    flush_lock: Arc<Mutex<()>>,
}

impl CheckpointStore {
    /// Load a previous checkpoint if one exists, otherwise start empty.
    pub fn load(paths: CheckpointPaths, catalog: Vec<CatalogEntry>) -> MirrorResult<Self> {
        let outcomes = match std::fs::read_to_string(&paths.checkpoint) {
            Ok(raw) => {
                let recorded: HashMap<String, String> = serde_json::from_str(&raw)?;
                recorded
                    .into_iter()
                    .map(|(url, value)| (url, Outcome::from_recorded(value, &paths.output_dir)))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Checkpoint loaded from {} ({} recorded outcomes)",
            paths.checkpoint.display(),
            outcomes.len()
        );

        Ok(Self {
            outcomes: Arc::new(Mutex::new(outcomes)),
            catalog: Arc::new(catalog),
            paths: Arc::new(paths),
            flush_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn get(&self, url: &str) -> Option<Outcome> {
        self.outcomes.lock().await.get(url).cloned()
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.outcomes.lock().await.contains_key(url)
    }

    /// Record the outcome for an original URL.
    pub async fn set(&self, url: &str, outcome: Outcome) {
        self.outcomes.lock().await.insert(url.to_string(), outcome);
    }

    pub async fn len(&self) -> usize {
        self.outcomes.lock().await.len()
    }

    pub fn paths(&self) -> &CheckpointPaths {
        &self.paths
    }

    /// Write the checkpoint and the denormalized output catalog.
    pub async fn flush_all(&self) -> MirrorResult<()> {
        let _flushing = self.flush_lock.lock().await;

        // Snapshot under the lock, serialize outside it.
        let recorded: BTreeMap<String, String> = {
            let outcomes = self.outcomes.lock().await;
            outcomes
                .iter()
                .map(|(url, outcome)| (url.clone(), outcome.to_recorded()))
                .collect()
        };

        let checkpoint_json = serde_json::to_vec(&recorded)?;
        write_atomic(&self.paths.checkpoint, &checkpoint_json).await?;

        let output = materialize(&self.catalog, &recorded);
        let output_json = serde_json::to_vec_pretty(&output)?;
        write_atomic(&self.paths.output_catalog, &output_json).await?;

        debug!(
            "Flushed {} outcomes to {}",
            recorded.len(),
            self.paths.checkpoint.display()
        );
        Ok(())
    }
}

/// Copy recorded outcomes into each entry's `coverPath` and `chapterPaths`.
///
/// Chapter order follows `chapterUrls`; absent URLs and URLs without an
/// outcome yet produce `null`.
pub fn materialize(
    catalog: &[CatalogEntry],
    recorded: &BTreeMap<String, String>,
) -> Vec<CatalogEntry> {
    let lookup = |url: &Option<String>| url.as_ref().and_then(|u| recorded.get(u)).cloned();

    catalog
        .iter()
        .map(|entry| {
            let mut entry = entry.clone();
            entry.cover_path = lookup(&entry.cover);
            entry.chapter_paths = Some(entry.chapter_urls.iter().map(lookup).collect());
            entry
        })
        .collect()
}

/// Replace `path` via a sibling temp file so readers never see a torn write.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
