//! Format blacklist.
//!
//! Formats listed here are never transcoded: the server passes them through
//! untouched and the client rewrite script leaves their sources alone.
//! Entries are compared by mime type, so `m4v` and `mp4` are equivalent.

use crate::paths::{mime_type, mime_type_for_extension};

/// Parsed comma-separated list of formats exempted from transcoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    formats: Vec<String>,
}

impl Blacklist {
    /// Parse a list such as `"mkv, avi"`. Blank entries are ignored.
    pub fn parse(raw: &str) -> Self {
        let formats = raw
            .split(',')
            .map(|f| f.trim().trim_start_matches('.').to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        Self { formats }
    }

    /// The normalized format names.
    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Mime types of the blacklisted formats (unknown formats are skipped).
    pub fn mime_types(&self) -> Vec<&'static str> {
        let mut mimes: Vec<&'static str> = Vec::new();
        for mime in self.formats.iter().filter_map(|f| mime_type_for_extension(f)) {
            if !mimes.contains(&mime) {
                mimes.push(mime);
            }
        }
        mimes
    }

    /// Whether a source path's format is blacklisted.
    pub fn contains_path(&self, path: &str) -> bool {
        let mime = mime_type(path);
        self.mime_types().contains(&mime)
    }

    /// True when no format is blacklisted.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}
