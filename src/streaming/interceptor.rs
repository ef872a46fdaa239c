//! Response interception for transcode requests.
//!
//! [`HlsInterceptor::intercept`] takes the original response body and the
//! request query and decides what the client gets instead. It knows nothing
//! about how the host dispatches requests.

use std::sync::Arc;

use bytes::Bytes;
use hlscache_common::paths::is_video_file;
use hlscache_common::{Blacklist, CacheKey, Result, SessionContext};
use serde::Deserialize;

use super::playlist::read_playlist;
use crate::cache::{CacheLayout, Materializer};
use crate::source::SourceReader;
use crate::transcode::{JobState, JobSupervisor};

/// Value of `transcode` that requests HLS output.
pub const TRANSCODE_HLS: &str = "hls";

/// Query of the content route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentQuery {
    pub path: String,
    #[serde(default)]
    pub transcode: Option<String>,
}

impl ContentQuery {
    pub fn wants_hls(&self) -> bool {
        self.transcode.as_deref() == Some(TRANSCODE_HLS)
    }
}

/// What to send instead of (or as) the original body.
pub enum Interception {
    /// Not a transcode request; send the original unchanged.
    PassThrough(SourceReader),
    /// Current playlist bytes, served as `application/x-mpegURL`.
    Playlist(Bytes),
    /// The job failed; send the materialized original untranscoded.
    Fallback(SourceReader),
}

impl std::fmt::Debug for Interception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interception::PassThrough(_) => f.write_str("PassThrough"),
            Interception::Playlist(bytes) => f.debug_tuple("Playlist").field(bytes).finish(),
            Interception::Fallback(_) => f.write_str("Fallback"),
        }
    }
}

/// Turns content responses for video sources into HLS playlists.
pub struct HlsInterceptor {
    layout: CacheLayout,
    blacklist: Blacklist,
    materializer: Materializer,
    supervisor: Arc<JobSupervisor>,
}

impl HlsInterceptor {
    pub fn new(blacklist: Blacklist, supervisor: Arc<JobSupervisor>) -> Self {
        let layout = supervisor.layout().clone();
        Self {
            materializer: Materializer::new(layout.clone()),
            layout,
            blacklist,
            supervisor,
        }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn supervisor(&self) -> &Arc<JobSupervisor> {
        &self.supervisor
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Decide the response for a content request.
    ///
    /// Non-HLS requests, non-video sources and blacklisted formats pass
    /// through. Otherwise the source is materialized, the job is started if
    /// needed and the current playlist is returned without waiting.
    pub async fn intercept(
        &self,
        body: SourceReader,
        query: &ContentQuery,
        session: &SessionContext,
    ) -> Result<Interception> {
        if !query.wants_hls() || !is_video_file(&query.path) {
            return Ok(Interception::PassThrough(body));
        }
        if self.blacklist.contains_path(&query.path) {
            tracing::debug!(path = %query.path, "Format is blacklisted, not transcoding");
            return Ok(Interception::PassThrough(body));
        }

        let key = CacheKey::derive(session, &query.path);
        let local = self.materializer.ensure_local_copy(&key, body).await?;

        if let JobState::Failed(reason) = self.supervisor.ensure_started(&key)? {
            tracing::warn!(cache_key = %key, error = %reason, "Transcode failed, serving original");
            let file = tokio::fs::File::open(&local).await?;
            return Ok(Interception::Fallback(Box::new(file)));
        }

        Ok(Interception::Playlist(read_playlist(&self.layout, &key).await?))
    }
}
