//! Write-once materialization of source bytes into the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use hlscache_common::{CacheKey, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{CacheLayout, TEMP_PREFIX};
use crate::source::SourceReader;

/// Copies a source into `<key>.dat` at most once per key.
///
/// Concurrent callers for the same key are serialized on a per-key lock:
/// the first copies, the others find the finished file once they get the
/// lock. The copy goes to a temporary file that is renamed into place, so a
/// partial copy is never visible under the final name.
pub struct Materializer {
    layout: CacheLayout,
    loading: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl Materializer {
    pub fn new(layout: CacheLayout) -> Self {
        Self {
            layout,
            loading: DashMap::new(),
        }
    }

    /// Ensure the local copy for `key` exists and return its path.
    ///
    /// `reader` is dropped unread when the copy already exists.
    pub async fn ensure_local_copy(
        &self,
        key: &CacheKey,
        reader: SourceReader,
    ) -> Result<PathBuf> {
        let path = self.layout.source_path(key);

        // Fast path: already materialized.
        if tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }

        let lock = self.loading.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.copy_once(key, &path, reader).await
        };
        drop(lock);
        self.loading.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);

        result.map(|()| path)
    }

    async fn copy_once(
        &self,
        key: &CacheKey,
        path: &Path,
        mut reader: SourceReader,
    ) -> Result<()> {
        // Re-check under the per-key lock.
        if tokio::fs::try_exists(path).await? {
            tracing::debug!(cache_key = %key, "Source already materialized");
            return Ok(());
        }

        let tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(self.layout.root())?;
        let mut file = tokio::fs::File::from_std(tmp.reopen()?);

        let bytes = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        match tmp.persist_noclobber(path) {
            Ok(_) => {
                tracing::info!(cache_key = %key, bytes, "Materialized source");
                Ok(())
            }
            // Another process won the race; its copy is complete.
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.error.into()),
        }
    }
}
