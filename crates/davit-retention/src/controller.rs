use crate::CleanupEngine;
use davit_storage::ArtifactStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Settings for the periodic snapshot cleanup task.
#[derive(Debug, Clone)]
pub struct CleanupSchedule {
    pub enabled: bool,
    /// Duration string such as `1h` or `30m`.
    pub interval: String,
}

/// Drives [`CleanupEngine`] on a fixed interval.
///
/// `pause` only affects upcoming ticks; a cleanup that is already underway
/// always runs to completion, as does one still in flight when `stop` fires.
pub struct CleanupController<S> {
    engine: Arc<CleanupEngine<S>>,
    schedule: CleanupSchedule,
    paused: Arc<Mutex<bool>>,
    shutdown: watch::Sender<bool>,
}

impl<S: ArtifactStore + Send + Sync + 'static> CleanupController<S> {
    pub fn new(engine: CleanupEngine<S>, schedule: CleanupSchedule) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            engine: Arc::new(engine),
            schedule,
            paused: Arc::new(Mutex::new(false)),
            shutdown,
        }
    }

    /// Launch the background ticker. Returns immediately; a no-op when the
    /// schedule is disabled.
    pub fn start(&self) {
        if !self.schedule.enabled {
            tracing::info!("snapshot cleanup task is disabled");
            return;
        }

        let interval = humantime::parse_duration(&self.schedule.interval).unwrap_or_else(|error| {
            tracing::warn!(
                %error,
                interval = %self.schedule.interval,
                "invalid snapshot cleanup interval, using default 1h"
            );
            DEFAULT_INTERVAL
        });

        let engine = Arc::clone(&self.engine);
        let paused = Arc::clone(&self.paused);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() fires immediately; the first cleanup belongs one
            // full period out
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *paused.lock() {
                            continue;
                        }
                        tracing::info!("starting snapshot cleanup");
                        match engine.run_cleanup().await {
                            Ok(()) => tracing::info!("snapshot cleanup finished"),
                            Err(error) => tracing::error!(%error, "snapshot cleanup failed"),
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn pause(&self) {
        *self.paused.lock() = true;
    }

    pub fn resume(&self) {
        *self.paused.lock() = false;
    }

    pub fn status(&self) -> &'static str {
        if *self.paused.lock() {
            "paused"
        } else {
            "running"
        }
    }

    /// Operator override: run one cleanup on a fresh task, paused or not.
    pub fn trigger(&self) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            if let Err(error) = engine.run_cleanup().await {
                tracing::error!(%error, "manually triggered snapshot cleanup failed");
            }
        });
    }

    /// Synchronous one-shot pass over the tree.
    pub async fn run_cleanup(&self) -> anyhow::Result<()> {
        self.engine.run_cleanup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RetentionPolicy;
    use davit_storage::FsStorage;
    use std::path::Path;
    use std::time::SystemTime;

    const STALE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    async fn stale_artifact(root: &Path, store: &FsStorage, rel: &str) {
        store.save(rel, &mut &b"old"[..]).await.unwrap();
        let file = std::fs::File::options()
            .write(true)
            .open(root.join(rel))
            .unwrap();
        file.set_modified(SystemTime::now() - STALE).unwrap();
    }

    fn controller(store: FsStorage, enabled: bool, interval: &str) -> CleanupController<FsStorage> {
        let engine = CleanupEngine::new(
            store,
            RetentionPolicy {
                keep_days: 7,
                keep_latest_only: false,
            },
        );
        CleanupController::new(
            engine,
            CleanupSchedule {
                enabled,
                interval: interval.to_string(),
            },
        )
    }

    async fn wait_until_deleted(store: &FsStorage, rel: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.head(rel).await.unwrap() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("artifact was never cleaned up");
    }

    #[tokio::test]
    async fn status_follows_pause_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(FsStorage::new(dir.path()).unwrap(), false, "1h");

        assert_eq!(ctl.status(), "running");
        ctl.pause();
        assert_eq!(ctl.status(), "paused");
        ctl.resume();
        assert_eq!(ctl.status(), "running");
    }

    #[tokio::test]
    async fn ticker_respects_pause_until_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();
        let rel = "g/a/1.0-SNAPSHOT/a-1.0-SNAPSHOT.jar";
        stale_artifact(dir.path(), &store, rel).await;

        let ctl = controller(store.clone(), true, "25ms");
        ctl.pause();
        ctl.start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.head(rel).await.unwrap(), "paused ticker must not clean");

        ctl.resume();
        wait_until_deleted(&store, rel).await;
        ctl.stop();
    }

    #[tokio::test]
    async fn trigger_overrides_pause() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();
        let rel = "g/a/2.0-SNAPSHOT/a-2.0-SNAPSHOT.jar";
        stale_artifact(dir.path(), &store, rel).await;

        let ctl = controller(store.clone(), true, "1h");
        ctl.pause();
        ctl.trigger();

        wait_until_deleted(&store, rel).await;
    }

    #[tokio::test]
    async fn disabled_schedule_never_starts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();
        let rel = "g/a/3.0-SNAPSHOT/a-3.0-SNAPSHOT.jar";
        stale_artifact(dir.path(), &store, rel).await;

        let ctl = controller(store.clone(), false, "10ms");
        ctl.start();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.head(rel).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_interval_falls_back_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(FsStorage::new(dir.path()).unwrap(), true, "not-a-duration");
        ctl.start();
        assert_eq!(ctl.status(), "running");
        ctl.stop();
    }

    #[tokio::test]
    async fn stop_ends_the_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();

        let ctl = controller(store.clone(), true, "25ms");
        ctl.start();
        ctl.stop();

        // A file made stale after stop stays put because no tick fires.
        let rel = "g/a/4.0-SNAPSHOT/a-4.0-SNAPSHOT.jar";
        stale_artifact(dir.path(), &store, rel).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.head(rel).await.unwrap());
    }
}
