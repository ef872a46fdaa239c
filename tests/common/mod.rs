//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which lays out media and cache directories in a
//! tempdir and wires a full [`AppContext`] around [`FakeEngine`] and
//! [`FakeProber`], so no ffmpeg install is needed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::sync::watch;
use tower::ServiceExt;

use hlscache::config::Config;
use hlscache::server::{create_router, AppContext, TranscodeBackends};
use hlscache::source::LocalMediaSource;
use hlscache::streaming::HlsInterceptor;
use hlscache::transcode::JobSupervisor;
use hlscache_av::{ProbeResult, ProbeStream, Prober, TranscodeEngine, TranscodeJob};
use hlscache_common::{CacheKey, SessionContext};

/// Header every playlist written by [`FakeEngine`] starts with.
pub const FAKE_PLAYLIST_HEADER: &str = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:EVENT\n";

/// Engine that writes numbered segments and a finished playlist.
pub struct FakeEngine {
    calls: AtomicUsize,
    segments: usize,
    fail: Option<String>,
    delay: Option<Duration>,
    gate: Option<watch::Receiver<bool>>,
    staged: bool,
    panics: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            segments: 3,
            fail: None,
            delay: None,
            gate: None,
            staged: false,
            panics: false,
        }
    }

    /// Fail every job with `message` after it was started.
    pub fn failing(mut self, message: &str) -> Self {
        self.fail = Some(message.to_string());
        self
    }

    /// Panic inside every job.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::new()
        }
    }

    /// Sleep before producing output.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every job until the gate is opened with `send(true)`.
    /// Nothing is written before the gate opens.
    pub fn gated(mut self, gate: watch::Receiver<bool>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Like [`FakeEngine::gated`], but segment `000.ts` and a playlist listing
    /// it are published before waiting on the gate.
    pub fn staged(mut self, gate: watch::Receiver<bool>) -> Self {
        self.gate = Some(gate);
        self.staged = true;
        self
    }

    /// Number of jobs started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Write segment `index` and append its entry to `playlist`.
async fn write_segment(
    job: &TranscodeJob,
    index: usize,
    playlist: &mut String,
) -> std::io::Result<()> {
    let name = format!("{:03}.ts", index);
    tokio::fs::write(job.segment_dir.join(&name), format!("segment {}", index)).await?;
    playlist.push_str(&format!(
        "#EXTINF:10.000000,\n{}{}\n",
        job.segment_base_url, name
    ));
    Ok(())
}

/// Replace the playlist atomically, the way ffmpeg's `temp_file` flag does.
async fn publish_playlist(job: &TranscodeJob, playlist: &str) -> std::io::Result<()> {
    let tmp = job.playlist.with_extension("m3u8.partial");
    tokio::fs::write(&tmp, playlist).await?;
    tokio::fs::rename(&tmp, &job.playlist).await
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn transcode(&self, job: &TranscodeJob) -> hlscache_av::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("fake engine crashed");
        }

        let mut playlist = String::from(FAKE_PLAYLIST_HEADER);
        let mut written = 0;
        if self.staged {
            write_segment(job, 0, &mut playlist).await?;
            publish_playlist(job, &playlist).await?;
            written = 1;
        }

        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            let _ = gate.wait_for(|open| *open).await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail {
            return Err(hlscache_av::Error::tool_failed("fake", message.clone()));
        }

        for i in written..self.segments {
            write_segment(job, i, &mut playlist).await?;
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        publish_playlist(job, &playlist).await?;
        Ok(())
    }
}

/// Prober returning a fixed result.
pub struct FakeProber {
    result: Result<ProbeResult, String>,
}

impl FakeProber {
    /// A one minute file with a video and an audio stream.
    pub fn video() -> Self {
        Self {
            result: Ok(ProbeResult {
                duration_secs: 60.0,
                bit_rate: 2_000_000,
                streams: vec![
                    ProbeStream {
                        codec_type: "video".to_string(),
                        codec_name: "h264".to_string(),
                        pixel_format: "yuv420p".to_string(),
                    },
                    ProbeStream {
                        codec_type: "audio".to_string(),
                        codec_name: "aac".to_string(),
                        pixel_format: String::new(),
                    },
                ],
            }),
        }
    }

    /// A video file whose container reports `duration_secs`.
    pub fn with_duration(duration_secs: f64) -> Self {
        let mut prober = Self::video();
        if let Ok(result) = &mut prober.result {
            result.duration_secs = duration_secs;
        }
        prober
    }

    /// A file with only an audio stream.
    pub fn audio_only() -> Self {
        Self {
            result: Ok(ProbeResult {
                duration_secs: 60.0,
                bit_rate: 128_000,
                streams: vec![ProbeStream {
                    codec_type: "audio".to_string(),
                    codec_name: "mp3".to_string(),
                    pixel_format: String::new(),
                }],
            }),
        }
    }

    /// Every probe fails.
    pub fn failing() -> Self {
        Self {
            result: Err("probe exploded".to_string()),
        }
    }
}

#[async_trait]
impl Prober for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, _path: &Path) -> hlscache_av::Result<ProbeResult> {
        match &self.result {
            Ok(result) => Ok(result.clone()),
            Err(message) => Err(hlscache_av::Error::tool_failed("ffprobe", message.clone())),
        }
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] over a tempdir.
pub struct TestHarness {
    pub ctx: AppContext,
    pub engine: Arc<FakeEngine>,
    pub media_root: PathBuf,
    pub cache_root: PathBuf,
    _dir: TempDir,
}

impl TestHarness {
    /// Default harness: no blacklist, succeeding engine.
    pub fn new() -> Self {
        Self::build(FakeEngine::new(), FakeProber::video(), |_| {})
    }

    /// Harness around a custom engine.
    pub fn with_engine(engine: FakeEngine) -> Self {
        Self::build(engine, FakeProber::video(), |_| {})
    }

    /// Harness with a tweaked configuration.
    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(FakeEngine::new(), FakeProber::video(), configure)
    }

    pub fn build(
        engine: FakeEngine,
        prober: FakeProber,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let media_root = dir.path().join("media");
        let cache_root = dir.path().join("cache");
        std::fs::create_dir_all(&media_root).unwrap();
        std::fs::create_dir_all(&cache_root).unwrap();

        let mut config = Config::default();
        config.media.root = media_root.clone();
        config.cache.root = cache_root.clone();
        config.transcoder.blacklist_format = String::new();
        configure(&mut config);

        let engine = Arc::new(engine);
        let backends = TranscodeBackends {
            engine: engine.clone(),
            prober: Arc::new(prober),
        };
        let media = Arc::new(LocalMediaSource::new(media_root.clone()));
        let ctx = AppContext::new(config, media, Some(backends));

        Self {
            ctx,
            engine,
            media_root,
            cache_root,
            _dir: dir,
        }
    }

    pub fn hls(&self) -> &Arc<HlsInterceptor> {
        self.ctx.hls.as_ref().expect("transcoding is disabled")
    }

    pub fn supervisor(&self) -> &Arc<JobSupervisor> {
        self.hls().supervisor()
    }

    /// Write a file below the media root.
    pub fn write_media(&self, rel: &str, content: &[u8]) {
        let path = self.media_root.join(rel.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// Cache key of an anonymous request for `path`.
    pub fn key_for(&self, path: &str) -> CacheKey {
        CacheKey::derive(&SessionContext::anonymous(), path)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_as(&self, uri: &str, session: &str) -> (StatusCode, HeaderMap, Bytes) {
        let header = self.ctx.config.media.session_header.clone();
        self.send(
            Request::get(uri)
                .header(header, session)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = create_router(self.ctx.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }
}

/// Content route URI requesting HLS output for `path`.
pub fn hls_uri(path: &str) -> String {
    format!("/api/files/cat?path={}&transcode=hls", path)
}

/// Poll until `path` exists.
pub async fn wait_for_file(path: &Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never appeared", path.display());
}

pub fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
