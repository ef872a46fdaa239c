//! Segment responder.

use hlscache_common::{CacheKey, Error, Result};

use crate::cache::CacheLayout;

/// An opened segment ready to be streamed.
#[derive(Debug)]
pub struct Segment {
    pub file: tokio::fs::File,
    pub len: u64,
}

/// Open `segment` of the job identified by its public cache file name.
///
/// Both names are validated before touching the filesystem. A segment that
/// has not been produced yet is [`Error::NotFound`].
pub async fn open_segment(
    layout: &CacheLayout,
    cache_file_name: &str,
    segment: &str,
) -> Result<Segment> {
    let key = CacheKey::from_cache_file_name(cache_file_name)?;
    let path = layout.segment_path(&key, segment)?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found("segment", segment));
        }
        Err(e) => {
            tracing::info!(cache_key = %key, segment, error = %e, "Couldn't read transcoded segment");
            return Err(e.into());
        }
    };
    let len = file.metadata().await?.len();
    Ok(Segment { file, len })
}
