/// Runtime configuration read from the environment (and `.env`).
use std::path::PathBuf;
use std::time::Duration;

use mirror_shared::checkpoint::CheckpointPaths;
use mirror_shared::errors::{MirrorError, MirrorResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub output_dir: PathBuf,
    pub checkpoint_path: PathBuf,
    pub output_catalog_path: PathBuf,
    pub flush_interval: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> MirrorResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> MirrorResult<Self> {
        let path = |key: &str, default: &str| {
            PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()))
        };
        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let flush_secs = secs("FLUSH_INTERVAL_SECS", 60);
        if flush_secs == 0 {
            return Err(MirrorError::Config(
                "FLUSH_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            catalog_path: path("CATALOG_PATH", "./catalog.json"),
            output_dir: path("OUTPUT_DIR", "images"),
            checkpoint_path: path("CHECKPOINT_PATH", "./checkpoint.json"),
            output_catalog_path: path("OUTPUT_CATALOG_PATH", "./catalog.out.json"),
            flush_interval: Duration::from_secs(flush_secs),
            request_timeout: Duration::from_secs(secs("REQUEST_TIMEOUT_SECS", 60)),
        })
    }

    pub fn checkpoint_paths(&self) -> CheckpointPaths {
        CheckpointPaths {
            checkpoint: self.checkpoint_path.clone(),
            output_catalog: self.output_catalog_path.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}
