use crate::snapshot_version;
use davit_storage::{ArtifactStore, StorageResult, WalkControl};
use metrics::counter;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// What survives in each snapshot version directory.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Delete version groups whose newest file is older than this many days.
    /// 0 disables the age rule.
    pub keep_days: u32,
    /// Keep only the most recently touched version group per directory.
    pub keep_latest_only: bool,
}

/// Walks the storage tree for `-SNAPSHOT` directories and applies the
/// retention policy to each. Holds no locks on the store; an upload landing
/// mid-cleanup is either considered this pass or the next one.
pub struct CleanupEngine<S> {
    store: S,
    policy: RetentionPolicy,
}

struct VersionGroup {
    key: String,
    files: Vec<String>,
    max_modified: SystemTime,
}

impl<S: ArtifactStore + Send + Sync> CleanupEngine<S> {
    pub fn new(store: S, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    /// One full pass over the storage tree. Per-directory failures are
    /// logged and do not abort the pass.
    pub async fn run_cleanup(&self) -> anyhow::Result<()> {
        let mut snapshot_dirs = Vec::new();
        self.store
            .walk(".", &mut |path, is_dir| {
                if is_dir && path.ends_with("-SNAPSHOT") {
                    snapshot_dirs.push(path.to_string());
                }
                WalkControl::Continue
            })
            .await?;

        tracing::info!(
            count = snapshot_dirs.len(),
            "found snapshot directories to check"
        );
        for dir in &snapshot_dirs {
            tracing::info!(%dir, "cleaning up snapshot directory");
            if let Err(error) = self.cleanup_dir(dir).await {
                tracing::warn!(%dir, %error, "failed to clean up snapshot directory");
            }
        }
        Ok(())
    }

    /// Apply the retention rules to one `-SNAPSHOT` directory.
    pub async fn cleanup_dir(&self, dir: &str) -> StorageResult<()> {
        let Some(entries) = self.store.list(dir).await? else {
            return Ok(());
        };

        let mut grouped: HashMap<String, Vec<(String, SystemTime)>> = HashMap::new();
        for entry in entries {
            if entry.is_dir || entry.name.starts_with("maven-metadata") {
                continue;
            }
            grouped
                .entry(snapshot_version(&entry.name))
                .or_default()
                .push((entry.name, entry.modified));
        }

        let mut versions: Vec<VersionGroup> = grouped
            .into_iter()
            .map(|(key, files)| {
                let max_modified = files
                    .iter()
                    .map(|(_, modified)| *modified)
                    .max()
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                VersionGroup {
                    key,
                    files: files.into_iter().map(|(name, _)| name).collect(),
                    max_modified,
                }
            })
            .collect();

        // newest first; ties settle on the key so the ranking is deterministic
        versions.sort_by(|a, b| {
            b.max_modified
                .cmp(&a.max_modified)
                .then_with(|| a.key.cmp(&b.key))
        });

        tracing::info!(%dir, versions = versions.len(), "snapshot versions found");

        let now = SystemTime::now();
        let keep_for = Duration::from_secs(u64::from(self.policy.keep_days) * 24 * 60 * 60);

        for (rank, group) in versions.iter().enumerate() {
            let age = now.duration_since(group.max_modified).unwrap_or_default();
            let expired = self.policy.keep_days > 0 && age > keep_for;
            let not_latest = self.policy.keep_latest_only && rank > 0;

            let reason = if expired {
                "expired"
            } else if not_latest {
                "not latest"
            } else {
                tracing::debug!(key = %group.key, files = group.files.len(), "keeping snapshot version");
                continue;
            };

            tracing::info!(
                key = %group.key,
                reason,
                age_days = age.as_secs() / 86_400,
                "deleting snapshot version"
            );
            for name in &group.files {
                let path = format!("{}/{}", dir.trim_end_matches('/'), name);
                match self.store.delete(&path).await {
                    Ok(()) => counter!("davit_snapshot_files_deleted_total").increment(1),
                    Err(error) => tracing::warn!(%path, %error, "failed to delete snapshot file"),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use davit_storage::FsStorage;
    use std::path::Path;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    async fn seed(store: &FsStorage, root: &Path, rel: &str, age: Duration) {
        store.save(rel, &mut &b"dummy content"[..]).await.unwrap();
        let file = std::fs::File::options()
            .write(true)
            .open(root.join(rel))
            .unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    async fn names(store: &FsStorage, dir: &str) -> Vec<String> {
        let mut names: Vec<String> = store
            .list(dir)
            .await
            .unwrap()
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn keep_latest_only_leaves_one_version_group() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();
        let snap = "com/example/app/1.0-SNAPSHOT";

        seed(&store, dir.path(), &format!("{snap}/app-1.0-20231020.120000-1.jar"), 30 * DAY).await;
        seed(&store, dir.path(), &format!("{snap}/app-1.0-20250101.120000-2.jar"), 10 * DAY).await;
        seed(&store, dir.path(), &format!("{snap}/app-1.0-20251219.120000-3.jar"), DAY).await;
        seed(&store, dir.path(), &format!("{snap}/app-1.0-20251220.120000-4.jar"), Duration::ZERO).await;
        seed(&store, dir.path(), &format!("{snap}/app-1.0-SNAPSHOT.pom"), DAY).await;
        seed(&store, dir.path(), &format!("{snap}/maven-metadata.xml"), 40 * DAY).await;

        let engine = CleanupEngine::new(
            store.clone(),
            RetentionPolicy {
                keep_days: 0,
                keep_latest_only: true,
            },
        );
        engine.run_cleanup().await.unwrap();

        assert_eq!(
            names(&store, snap).await,
            vec![
                "app-1.0-20251220.120000-4.jar".to_string(),
                "maven-metadata.xml".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn classifier_files_are_deleted_with_their_group() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();
        let snap = "com/example/app/2.0-SNAPSHOT";

        seed(&store, dir.path(), &format!("{snap}/app-2.0-20240101.090000-1.jar"), 5 * DAY).await;
        seed(&store, dir.path(), &format!("{snap}/app-2.0-20240101.090000-1-sources.jar"), 5 * DAY).await;
        seed(&store, dir.path(), &format!("{snap}/app-2.0-20240301.090000-2.jar"), Duration::ZERO).await;

        let engine = CleanupEngine::new(
            store.clone(),
            RetentionPolicy {
                keep_days: 0,
                keep_latest_only: true,
            },
        );
        engine.cleanup_dir(snap).await.unwrap();

        assert_eq!(
            names(&store, snap).await,
            vec!["app-2.0-20240301.090000-2.jar".to_string()]
        );
    }

    #[tokio::test]
    async fn age_rule_only_deletes_expired_groups() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();
        let snap = "org/acme/lib/0.3-SNAPSHOT";

        seed(&store, dir.path(), &format!("{snap}/lib-0.3-20230101.000000-1.jar"), 30 * DAY).await;
        seed(&store, dir.path(), &format!("{snap}/lib-0.3-20250601.000000-2.jar"), 2 * DAY).await;
        seed(&store, dir.path(), &format!("{snap}/lib-0.3-SNAPSHOT.pom"), 2 * DAY).await;

        let engine = CleanupEngine::new(
            store.clone(),
            RetentionPolicy {
                keep_days: 7,
                keep_latest_only: false,
            },
        );
        engine.run_cleanup().await.unwrap();

        // Every surviving group is younger than the cutoff.
        assert_eq!(
            names(&store, snap).await,
            vec![
                "lib-0.3-20250601.000000-2.jar".to_string(),
                "lib-0.3-SNAPSHOT.pom".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn zero_keep_days_disables_the_age_rule() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();
        let snap = "org/acme/lib/0.4-SNAPSHOT";

        seed(&store, dir.path(), &format!("{snap}/lib-0.4-SNAPSHOT.jar"), 365 * DAY).await;

        let engine = CleanupEngine::new(
            store.clone(),
            RetentionPolicy {
                keep_days: 0,
                keep_latest_only: false,
            },
        );
        engine.run_cleanup().await.unwrap();

        assert_eq!(
            names(&store, snap).await,
            vec!["lib-0.4-SNAPSHOT.jar".to_string()]
        );
    }

    #[tokio::test]
    async fn non_snapshot_directories_are_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path()).unwrap();

        seed(&store, dir.path(), "com/example/app/1.0/app-1.0.jar", 400 * DAY).await;

        let engine = CleanupEngine::new(
            store.clone(),
            RetentionPolicy {
                keep_days: 1,
                keep_latest_only: true,
            },
        );
        engine.run_cleanup().await.unwrap();

        assert!(store.head("com/example/app/1.0/app-1.0.jar").await.unwrap());
    }
}
