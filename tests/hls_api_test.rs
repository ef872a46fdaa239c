//! Integration tests for the content interception and HLS routes.

mod common;

use axum::http::StatusCode;
use common::{
    content_type, hls_uri, wait_for_file, FakeEngine, FakeProber, TestHarness,
    FAKE_PLAYLIST_HEADER,
};
use hlscache::server::routes_hls::JobStatusResponse;
use hlscache::streaming::SKELETON_PLAYLIST;
use hlscache::transcode::{JobState, Phase};
use tokio::sync::watch;

const VIDEO: &[u8] = b"not really an mp4 but close enough";

#[tokio::test]
async fn health_check() {
    let h = TestHarness::new();
    let (status, _, _) = h.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn first_request_returns_skeleton_and_starts_one_job() {
    let (gate, rx) = watch::channel(false);
    let h = TestHarness::with_engine(FakeEngine::new().gated(rx));
    h.write_media("/movie.mp4", VIDEO);
    let key = h.key_for("/movie.mp4");

    let (status, headers, body) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "application/x-mpegURL");
    assert_eq!(body, SKELETON_PLAYLIST.as_bytes());

    // Still running: same skeleton, no second job
    let (status, _, body) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SKELETON_PLAYLIST.as_bytes());

    gate.send(true).unwrap();
    assert_eq!(h.supervisor().wait(&key).await.unwrap(), JobState::Done);
    assert_eq!(h.engine.calls(), 1);

    // Materialized copy matches the original bytes
    let cached = std::fs::read(h.cache_root.join(key.cache_file_name())).unwrap();
    assert_eq!(cached, VIDEO);

    let (_, headers, body) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(content_type(&headers), "application/x-mpegURL");
    let playlist = String::from_utf8(body.to_vec()).unwrap();
    assert!(playlist.ends_with("#EXT-X-ENDLIST\n"));
    assert!(playlist.contains(&format!("/hls?path={}&file=000.ts", key.cache_file_name())));
    assert_eq!(h.engine.calls(), 1);
}

#[tokio::test]
async fn segments_are_served_after_transcode() {
    let h = TestHarness::new();
    h.write_media("/movie.mp4", VIDEO);
    let key = h.key_for("/movie.mp4");

    h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(h.supervisor().wait(&key).await.unwrap(), JobState::Done);

    let uri = format!("/hls?path={}&file=001.ts", key.cache_file_name());
    let (status, headers, body) = h.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "video/mp2t");
    assert_eq!(headers.get("content-length").unwrap(), "9");
    assert_eq!(body, "segment 1".as_bytes());
}

#[tokio::test]
async fn running_job_serves_partial_playlist() {
    let (gate, rx) = watch::channel(false);
    let h = TestHarness::with_engine(FakeEngine::new().staged(rx));
    h.write_media("/movie.mp4", VIDEO);
    let key = h.key_for("/movie.mp4");
    let name = key.cache_file_name();

    h.get(&hls_uri("/movie.mp4")).await;
    wait_for_file(&h.hls().layout().playlist_path(&key)).await;

    let (status, headers, partial) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "application/x-mpegURL");
    let expected = format!(
        "{}#EXTINF:10.000000,\n/hls?path={}&file=000.ts\n",
        FAKE_PLAYLIST_HEADER, name
    );
    assert_eq!(partial, expected.as_bytes());
    assert_eq!(h.supervisor().state(&key).unwrap(), JobState::Running);

    // Listed segments are servable while the job runs
    let segment_uri = format!("/hls?path={}&file=000.ts", name);
    let (status, _, segment) = h.get(&segment_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(segment, "segment 0".as_bytes());

    gate.send(true).unwrap();
    assert_eq!(h.supervisor().wait(&key).await.unwrap(), JobState::Done);

    let (_, _, full) = h.get(&hls_uri("/movie.mp4")).await;
    assert!(full.starts_with(&partial));
    assert!(full.ends_with(b"#EXT-X-ENDLIST\n"));
    let (_, _, again) = h.get(&segment_uri).await;
    assert_eq!(again, segment);
    assert_eq!(h.engine.calls(), 1);
}

#[tokio::test]
async fn segment_route_rejects_traversal() {
    let h = TestHarness::new();
    let key = h.key_for("/movie.mp4");

    let uri = format!("/hls?path={}&file=../../etc/passwd", key.cache_file_name());
    let (status, _, body) = h.get(&uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "invalid_input");

    let (status, _, _) = h.get("/hls?path=../cache.dat&file=000.ts").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_segment_is_not_found() {
    let h = TestHarness::new();
    let key = h.key_for("/movie.mp4");

    let uri = format!("/hls?path={}&file=999.ts", key.cache_file_name());
    let (status, _, _) = h.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn plain_requests_pass_through() {
    let h = TestHarness::new();
    h.write_media("/movie.mp4", VIDEO);
    h.write_media("/notes.txt", b"hello");

    let (status, headers, body) = h.get("/api/files/cat?path=/movie.mp4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "video/mp4");
    assert_eq!(body, VIDEO);

    // Not a video: transcode flag is ignored
    let (status, headers, body) = h.get(&hls_uri("/notes.txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "text/plain");
    assert_eq!(body, "hello".as_bytes());

    assert_eq!(h.engine.calls(), 0);
    assert!(std::fs::read_dir(&h.cache_root).unwrap().next().is_none());
}

#[tokio::test]
async fn blacklisted_format_passes_through() {
    let h = TestHarness::with_config(|c| c.transcoder.blacklist_format = "mkv, avi".to_string());
    h.write_media("/movie.mkv", VIDEO);
    let key = h.key_for("/movie.mkv");

    let (status, headers, body) = h.get(&hls_uri("/movie.mkv")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "video/x-matroska");
    assert_eq!(body, VIDEO);

    assert_eq!(h.engine.calls(), 0);
    assert!(!h.cache_root.join(key.cache_file_name()).exists());
    assert_eq!(h.supervisor().state(&key).unwrap(), JobState::NotStarted);
}

#[tokio::test]
async fn missing_source_is_not_found() {
    let h = TestHarness::new();
    let (status, _, _) = h.get(&hls_uri("/nope.mp4")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = h.get(&hls_uri("/../outside.mp4")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_job_falls_back_to_original() {
    let h = TestHarness::with_engine(FakeEngine::new().failing("encoder crashed"));
    h.write_media("/movie.mp4", VIDEO);
    let key = h.key_for("/movie.mp4");

    let (_, _, body) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(body, SKELETON_PLAYLIST.as_bytes());

    let state = h.supervisor().wait(&key).await.unwrap();
    assert!(matches!(state, JobState::Failed(ref reason) if reason.contains("encoder crashed")));

    let (status, headers, body) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "video/mp4");
    assert_eq!(body, VIDEO);

    // A failed key is not retried by later requests
    assert_eq!(h.engine.calls(), 1);
}

#[tokio::test]
async fn no_video_stream_fails_without_transcoding() {
    let h = TestHarness::build(FakeEngine::new(), FakeProber::audio_only(), |_| {});
    h.write_media("/movie.mp4", VIDEO);
    let key = h.key_for("/movie.mp4");

    h.get(&hls_uri("/movie.mp4")).await;
    let state = h.supervisor().wait(&key).await.unwrap();
    assert_eq!(state.phase(), Phase::Failed);
    assert_eq!(state.error(), Some("Unsupported: no video stream"));
    assert_eq!(h.engine.calls(), 0);

    let (_, _, body) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(body, VIDEO);
}

#[tokio::test]
async fn job_status_reports_progress() {
    let h = TestHarness::new();
    h.write_media("/movie.mp4", VIDEO);
    let key = h.key_for("/movie.mp4");
    let uri = format!("/hls/status?path={}", key.cache_file_name());

    let (status, _, _) = h.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    h.get(&hls_uri("/movie.mp4")).await;
    h.supervisor().wait(&key).await.unwrap();

    let (status, headers, body) = h.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "application/json");
    let report: JobStatusResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.cache_key, key.to_string());
    assert_eq!(report.state, Phase::Done);
    assert_eq!(report.error, None);
    assert_eq!(report.segments, 3);
    assert_eq!(report.duration_secs, Some(60.0));
    assert!(report.started_at.is_some());
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn invalidate_removes_output_and_allows_restart() {
    let h = TestHarness::new();
    h.write_media("/movie.mp4", VIDEO);
    let key = h.key_for("/movie.mp4");
    let layout = h.hls().layout().clone();

    h.get(&hls_uri("/movie.mp4")).await;
    h.supervisor().wait(&key).await.unwrap();

    let uri = format!("/hls/status?path={}", key.cache_file_name());
    let (status, _, _) = h.delete(&uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(!layout.segment_dir(&key).exists());
    assert!(!layout.playlist_path(&key).exists());
    assert!(!layout.status_path(&key).exists());
    assert!(layout.source_path(&key).exists());
    assert!(layout.stale_temp_files().unwrap().is_empty());

    let (_, _, body) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(body, SKELETON_PLAYLIST.as_bytes());
    assert_eq!(h.supervisor().wait(&key).await.unwrap(), JobState::Done);
    assert_eq!(h.engine.calls(), 2);
}

#[tokio::test]
async fn invalidate_running_job_conflicts() {
    let (gate, rx) = watch::channel(false);
    let h = TestHarness::with_engine(FakeEngine::new().gated(rx));
    h.write_media("/movie.mp4", VIDEO);
    let key = h.key_for("/movie.mp4");

    h.get(&hls_uri("/movie.mp4")).await;

    let uri = format!("/hls/status?path={}", key.cache_file_name());
    let (status, _, _) = h.delete(&uri).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(h.hls().layout().segment_dir(&key).exists());

    gate.send(true).unwrap();
    assert_eq!(h.supervisor().wait(&key).await.unwrap(), JobState::Done);
}

#[tokio::test]
async fn sessions_get_separate_jobs() {
    let h = TestHarness::new();
    h.write_media("/movie.mp4", VIDEO);

    h.get_as(&hls_uri("/movie.mp4"), "alice").await;
    h.get_as(&hls_uri("/movie.mp4"), "bob").await;

    let alice = hlscache_common::CacheKey::derive(
        &hlscache_common::SessionContext::new("alice"),
        "/movie.mp4",
    );
    let bob = hlscache_common::CacheKey::derive(
        &hlscache_common::SessionContext::new("bob"),
        "/movie.mp4",
    );
    assert_ne!(alice, bob);
    assert_eq!(h.supervisor().wait(&alice).await.unwrap(), JobState::Done);
    assert_eq!(h.supervisor().wait(&bob).await.unwrap(), JobState::Done);
    assert_eq!(h.engine.calls(), 2);
}

#[tokio::test]
async fn override_script_lists_blacklist() {
    let h = TestHarness::with_config(|c| c.transcoder.blacklist_format = "mkv".to_string());

    let (status, headers, body) = h.get("/overrides/video-transcoder.js").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "application/javascript");
    let script = String::from_utf8(body.to_vec()).unwrap();
    assert!(script.contains("\"video/x-matroska\""));
    assert!(script.contains("&transcode=hls"));
}

#[tokio::test]
async fn disabled_transcoder_serves_originals_only() {
    let h = TestHarness::with_config(|c| c.transcoder.enabled = false);
    assert!(h.ctx.hls.is_none());
    h.write_media("/movie.mp4", VIDEO);

    let (status, headers, body) = h.get(&hls_uri("/movie.mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "video/mp4");
    assert_eq!(body, VIDEO);

    let (status, _, _) = h.get("/hls?path=x.dat&file=000.ts").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = h.get("/overrides/video-transcoder.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
