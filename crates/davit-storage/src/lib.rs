use async_trait::async_trait;
use std::pin::Pin;
use std::time::SystemTime;
use tokio::io::AsyncRead;

mod error;
pub mod fs;

pub use error::{StorageError, StorageResult};
pub use fs::FsStorage;

/// Streaming handle to a stored artifact. Ownership transfers to the caller,
/// who is responsible for driving it to completion or dropping it.
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// One child of a listed directory.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// Returned by a walk visitor to steer the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Skip the descendants of the directory that was just visited.
    SkipSubtree,
}

/// Path-addressed byte storage for repository artifacts.
///
/// Paths are forward-slash separated and relative to the store root; parent
/// traversal and absolute paths are rejected. There is no cross-operation
/// locking: concurrent writers to the same path are permitted and the last
/// close wins.
#[async_trait]
pub trait ArtifactStore {
    /// Stream `data` to completion into the file at `path`, creating parent
    /// directories and truncating any previous content.
    async fn save(
        &self,
        path: &str,
        data: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()>;

    /// Open the artifact for reading. A missing path is `Ok(None)`, not an
    /// error.
    async fn get(&self, path: &str) -> StorageResult<Option<BlobReader>>;

    /// Existence probe without opening the file.
    async fn head(&self, path: &str) -> StorageResult<bool>;

    /// One-level enumeration. `Ok(None)` when the path is missing or not a
    /// directory.
    async fn list(&self, path: &str) -> StorageResult<Option<Vec<Entry>>>;

    /// Remove the target, recursively for directories. A missing target is
    /// `Ok(())`.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Depth-first traversal starting at `path` (the root node included).
    /// Paths handed to `visit` are relative to the store base.
    async fn walk(
        &self,
        path: &str,
        visit: &mut (dyn for<'a> FnMut(&'a str, bool) -> WalkControl + Send),
    ) -> StorageResult<()>;
}
