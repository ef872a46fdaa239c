//! Content route.
//!
//! Streams original files from the media source. When transcoding is
//! enabled every response passes through the [`HlsInterceptor`] first.
//!
//! [`HlsInterceptor`]: crate::streaming::HlsInterceptor

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hlscache_common::paths::{mime_type, HLS_MIME_TYPE};
use hlscache_common::SessionContext;
use tokio_util::io::ReaderStream;

use super::{AppContext, AppError};
use crate::source::SourceReader;
use crate::streaming::{ContentQuery, Interception};

/// Route serving original file bytes.
pub const CONTENT_ROUTE: &str = "/api/files/cat";

/// Create content routes.
pub fn content_routes() -> Router<AppContext> {
    Router::new().route(CONTENT_ROUTE, get(cat_file))
}

/// Session discriminator from the configured header, `anonymous` if absent.
pub fn session_from_headers(headers: &HeaderMap, header_name: &str) -> SessionContext {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(SessionContext::new)
        .unwrap_or_default()
}

async fn cat_file(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(query): Query<ContentQuery>,
) -> Result<Response, AppError> {
    let body = ctx.media.open(&query.path).await?;
    let content_type = mime_type(&query.path);

    let Some(hls) = &ctx.hls else {
        return Ok(stream_response(content_type, body));
    };

    let session = session_from_headers(&headers, &ctx.config.media.session_header);
    let response = match hls.intercept(body, &query, &session).await? {
        Interception::PassThrough(body) | Interception::Fallback(body) => {
            stream_response(content_type, body)
        }
        Interception::Playlist(playlist) => {
            ([(header::CONTENT_TYPE, HLS_MIME_TYPE)], playlist).into_response()
        }
    };
    Ok(response)
}

fn stream_response(content_type: &'static str, body: SourceReader) -> Response {
    (
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(ReaderStream::new(body)),
    )
        .into_response()
}
