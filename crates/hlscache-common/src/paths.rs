//! Path utilities for detecting video files and their mime types by extension.
//!
//! The transcoder only intercepts requests whose source resolves to a `video/*`
//! mime type; the same table feeds the client rewrite script so both sides
//! agree on what a blacklisted format looks like.

use std::path::Path;

/// Mime type of an HLS manifest.
pub const HLS_MIME_TYPE: &str = "application/x-mpegURL";

/// Mime type of an MPEG transport stream segment.
pub const SEGMENT_MIME_TYPE: &str = "video/mp2t";

/// Fallback for unknown extensions.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Known extensions and their mime types.
const MIME_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("wmv", "video/x-ms-wmv"),
    ("flv", "video/x-flv"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    ("ogv", "video/ogg"),
    ("3gp", "video/3gpp"),
    ("ts", "video/mp2t"),
    ("m3u8", "application/x-mpegURL"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("wav", "audio/wav"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("txt", "text/plain"),
    ("html", "text/html"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
];

/// Lowercased extension of a path, if any.
fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Look up the mime type for a bare extension (without the dot).
pub fn mime_type_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_lowercase();
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// Infer a mime type from a path's extension.
///
/// # Examples
///
/// ```
/// use hlscache_common::paths::mime_type;
///
/// assert_eq!(mime_type("/movies/a.mkv"), "video/x-matroska");
/// assert_eq!(mime_type("notes"), "application/octet-stream");
/// ```
pub fn mime_type(path: &str) -> &'static str {
    extension(path)
        .and_then(|ext| mime_type_for_extension(&ext))
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Check if a path resolves to a `video/*` mime type.
///
/// # Examples
///
/// ```
/// use hlscache_common::paths::is_video_file;
///
/// assert!(is_video_file("movie.mkv"));
/// assert!(is_video_file("/path/to/video.MP4"));
/// assert!(!is_video_file("subtitle.srt"));
/// ```
pub fn is_video_file(path: &str) -> bool {
    mime_type(path).starts_with("video/")
}
