//! HLS routes: segments, job status and the client rewrite script.
//!
//! Mounted only when transcoding is available and enabled.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use hlscache_common::paths::SEGMENT_MIME_TYPE;
use hlscache_common::{CacheKey, Error};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use super::{AppContext, AppError};
use crate::streaming::{open_segment, render_override_script, OVERRIDE_SCRIPT_ROUTE};
use crate::transcode::Phase;

/// Create HLS routes below the configured segment route (e.g. `/hls`).
pub fn hls_routes(segment_route: &str) -> Router<AppContext> {
    Router::new()
        .route(segment_route, get(get_segment))
        .route(
            &format!("{segment_route}/status"),
            get(get_job_status).delete(invalidate_job),
        )
        .route(OVERRIDE_SCRIPT_ROUTE, get(override_script))
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SegmentQuery {
    /// Public cache file name (`<key>.dat`)
    pub path: String,
    /// Segment file name (e.g. `000.ts`)
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Public cache file name (`<key>.dat`)
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub cache_key: String,
    pub state: Phase,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    /// Segments produced so far
    pub segments: usize,
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_segment(
    State(ctx): State<AppContext>,
    Query(query): Query<SegmentQuery>,
) -> Result<Response, AppError> {
    let hls = ctx.hls()?;
    let segment = open_segment(hls.layout(), &query.path, &query.file).await?;

    Ok((
        [
            (header::CONTENT_TYPE, SEGMENT_MIME_TYPE.to_string()),
            (header::CONTENT_LENGTH, segment.len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(segment.file)),
    )
        .into_response())
}

async fn get_job_status(
    State(ctx): State<AppContext>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let hls = ctx.hls()?;
    let key = CacheKey::from_cache_file_name(&query.path)?;
    let record = hls
        .supervisor()
        .record(&key)?
        .ok_or_else(|| Error::not_found("transcode job", &query.path))?;
    let segments = hls.layout().list_segments(&key)?.len();

    Ok(Json(JobStatusResponse {
        cache_key: key.to_string(),
        state: record.state,
        error: record.error,
        started_at: record.started_at,
        finished_at: record.finished_at,
        duration_secs: record.duration_secs,
        segments,
    }))
}

async fn invalidate_job(
    State(ctx): State<AppContext>,
    Query(query): Query<StatusQuery>,
) -> Result<StatusCode, AppError> {
    let hls = ctx.hls()?;
    let key = CacheKey::from_cache_file_name(&query.path)?;
    hls.supervisor().invalidate(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn override_script(State(ctx): State<AppContext>) -> Result<Response, AppError> {
    let hls = ctx.hls()?;
    Ok((
        [(header::CONTENT_TYPE, "application/javascript")],
        render_override_script(hls.blacklist()),
    )
        .into_response())
}
