//! Playlist responder.

use bytes::Bytes;
use hlscache_common::{CacheKey, Result};

use crate::cache::CacheLayout;

/// Empty event playlist returned before the transcoder has written one.
/// Clients parse it and poll again.
pub const SKELETON_PLAYLIST: &str =
    "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-ALLOW-CACHE:YES\n";

/// Current playlist bytes for `key`: the file on disk verbatim, or the
/// skeleton if none exists yet. Never waits for the job.
pub async fn read_playlist(layout: &CacheLayout, key: &CacheKey) -> Result<Bytes> {
    match tokio::fs::read(layout.playlist_path(key)).await {
        Ok(content) => Ok(Bytes::from(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(Bytes::from_static(SKELETON_PLAYLIST.as_bytes()))
        }
        Err(e) => {
            tracing::warn!(cache_key = %key, error = %e, "Couldn't read playlist file");
            Err(e.into())
        }
    }
}
