//! Origin of source media bytes.
//!
//! The content route reads originals through a [`MediaSource`]; the
//! interceptor consumes the same reader when it materializes a source into
//! the cache.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use hlscache_common::{Error, Result};
use tokio::io::AsyncRead;

/// Owned, sendable byte stream of a source file.
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// Something that can open a logical source path.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn open(&self, path: &str) -> Result<SourceReader>;
}

/// Serves files below a local directory.
#[derive(Debug, Clone)]
pub struct LocalMediaSource {
    root: PathBuf,
}

impl LocalMediaSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a logical path below the root.
    ///
    /// A leading `/` is relative to the root. Parent, prefix and other
    /// non-normal components are rejected.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            return Err(Error::invalid_input("empty path"));
        }

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(Error::invalid_input(format!("invalid path: {path:?}"))),
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl MediaSource for LocalMediaSource {
    async fn open(&self, path: &str) -> Result<SourceReader> {
        let resolved = self.resolve(path)?;
        match tokio::fs::File::open(&resolved).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found("file", path)),
            Err(e) => Err(e.into()),
        }
    }
}
