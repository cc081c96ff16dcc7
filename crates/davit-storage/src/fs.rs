use crate::{ArtifactStore, BlobReader, Entry, StorageError, StorageResult, WalkControl};
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncRead;

/// Blob store rooted at a local directory.
#[derive(Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Resolve a repository path against the root, refusing anything that
    /// could escape it.
    fn abs_path(&self, path: &str) -> StorageResult<PathBuf> {
        let mut full = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(segment) => full.push(segment),
                Component::CurDir => {}
                _ => {
                    return Err(StorageError::ServiceError(
                        io::Error::from(io::ErrorKind::InvalidInput).into(),
                    ))
                }
            }
        }
        Ok(full)
    }
}

#[async_trait]
impl ArtifactStore for FsStorage {
    async fn save(
        &self,
        path: &str,
        data: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()> {
        let path = self.abs_path(path)?;
        let parent = path.parent().unwrap();
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&path).await?;
        tokio::io::copy(data, &mut file).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> StorageResult<Option<BlobReader>> {
        let path = self.abs_path(path)?;
        match fs::File::open(&path).await {
            Ok(file) => {
                if file.metadata().await?.is_dir() {
                    return Ok(None);
                }
                Ok(Some(Box::pin(file)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, path: &str) -> StorageResult<bool> {
        let path = self.abs_path(path)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, path: &str) -> StorageResult<Option<Vec<Entry>>> {
        let path = self.abs_path(path)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let mut dir = fs::read_dir(&path).await?;
        let mut entries = Vec::new();
        while let Some(child) = dir.next_entry().await? {
            // A child vanishing mid-listing is not worth failing the whole
            // directory over.
            let Ok(meta) = child.metadata().await else {
                continue;
            };
            entries.push(Entry {
                name: child.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(Some(entries))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let path = self.abs_path(path)?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        match removed {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn walk(
        &self,
        path: &str,
        visit: &mut (dyn for<'a> FnMut(&'a str, bool) -> WalkControl + Send),
    ) -> StorageResult<()> {
        let start = self.abs_path(path)?;
        let mut iter = walkdir::WalkDir::new(&start).into_iter();
        while let Some(node) = iter.next() {
            let node = match node {
                Ok(node) => node,
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable node during storage walk");
                    continue;
                }
            };
            let rel = node
                .path()
                .strip_prefix(&self.root)
                .unwrap_or_else(|_| node.path());
            let rel = if rel.as_os_str().is_empty() {
                ".".into()
            } else {
                rel.to_string_lossy()
            };
            let is_dir = node.file_type().is_dir();
            if visit(rel.as_ref(), is_dir) == WalkControl::SkipSubtree && is_dir {
                iter.skip_current_dir();
            }
        }
        Ok(())
    }
}
