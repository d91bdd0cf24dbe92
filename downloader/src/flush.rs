/// Periodic checkpoint flushing.
///
/// One background task ticks on a fixed interval until stopped. The final
/// flush is left to the caller once `stop` has returned.
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use mirror_shared::checkpoint::CheckpointStore;

pub struct FlushTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl FlushTimer {
    /// Start flushing every `period`; the first flush happens one period from now.
    pub fn start(store: CheckpointStore, period: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = store.flush_all().await {
                            error!("Periodic checkpoint flush failed: {}", e);
                        }
                    }
                }
            }
            debug!("Flush timer stopped");
        });

        Self { token, handle }
    }

    /// Stop the timer and wait for an in-progress flush to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("Flush timer task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_shared::checkpoint::CheckpointPaths;
    use mirror_shared::models::Outcome;

    fn store_in(dir: &std::path::Path) -> CheckpointStore {
        let paths = CheckpointPaths {
            checkpoint: dir.join("checkpoint.json"),
            output_catalog: dir.join("catalog.out.json"),
            output_dir: dir.join("images"),
        };
        CheckpointStore::load(paths, Vec::new()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_flushes_every_period() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .set("https://a/x.png", Outcome::Failed("Response code 410 (Gone)".into()))
            .await;
        let checkpoint = store.paths().checkpoint.clone();

        let timer = FlushTimer::start(store, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!checkpoint.exists());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(checkpoint.exists());
        timer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_flush_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let checkpoint = store.paths().checkpoint.clone();

        let timer = FlushTimer::start(store, Duration::from_secs(60));
        timer.stop().await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(!checkpoint.exists());
    }
}
