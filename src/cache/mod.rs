//! On-disk cache layout.
//!
//! Every artifact for a key lives directly under the cache root:
//!
//! ```text
//! <key>.dat              materialized source
//! <key>.dat.m3u8         playlist, appended to by the transcoder
//! <key>.dat_transcoded/  segments: 000.ts, 001.ts, ...
//! <key>.dat.status       job status marker (JSON)
//! ```

mod materializer;

pub use materializer::Materializer;

use std::path::{Path, PathBuf};

use hlscache_av::hls::SEGMENT_EXTENSION;
use hlscache_common::{CacheKey, Error, Result};

/// Suffix of the segment directory, appended to the cache file name.
const SEGMENT_DIR_SUFFIX: &str = "_transcoded";

/// Suffix of the playlist, appended to the cache file name.
const PLAYLIST_SUFFIX: &str = ".m3u8";

/// Suffix of the status marker, appended to the cache file name.
pub(crate) const STATUS_SUFFIX: &str = ".status";

/// Prefix of in-flight temporary files.
pub(crate) const TEMP_PREFIX: &str = ".tmp-";

/// Maps cache keys to their paths below the cache root.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache root if needed.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn source_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.cache_file_name())
    }

    pub fn playlist_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{}{PLAYLIST_SUFFIX}", key.cache_file_name()))
    }

    pub fn segment_dir(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{}{SEGMENT_DIR_SUFFIX}", key.cache_file_name()))
    }

    pub fn status_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{}{STATUS_SUFFIX}", key.cache_file_name()))
    }

    /// Path of a segment, rejecting anything that is not a plain segment
    /// file name.
    pub fn segment_path(&self, key: &CacheKey, segment: &str) -> Result<PathBuf> {
        validate_segment_name(segment)?;
        Ok(self.segment_dir(key).join(segment))
    }

    /// Names of the segments produced so far, in playback order.
    pub fn list_segments(&self, key: &CacheKey) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(self.segment_dir(key)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().to_string();
            if validate_segment_name(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Keys that have a segment directory or a status marker on disk.
    pub fn known_keys(&self) -> std::io::Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            let cache_file = name
                .strip_suffix(SEGMENT_DIR_SUFFIX)
                .or_else(|| name.strip_suffix(STATUS_SUFFIX));
            if let Some(key) = cache_file.and_then(|f| CacheKey::from_cache_file_name(f).ok()) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Leftover temporary files from an interrupted write.
    pub fn stale_temp_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut stale = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                stale.push(entry.path());
            }
        }
        Ok(stale)
    }
}

/// Accept only `[A-Za-z0-9_-]+.ts`.
pub fn validate_segment_name(name: &str) -> Result<()> {
    let valid = name
        .strip_suffix(SEGMENT_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .is_some_and(|stem| {
            !stem.is_empty()
                && stem
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_input(format!("invalid segment name: {name:?}")))
    }
}
