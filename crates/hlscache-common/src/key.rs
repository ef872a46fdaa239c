//! Cache key derivation.
//!
//! A [`CacheKey`] namespaces every artifact produced for one logical
//! transcoding job. It is derived from the viewer's session discriminator and
//! the logical source path, since the same path can resolve to different bytes
//! for different sessions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Prefix shared by every cache key.
const KEY_PREFIX: &str = "vid_";

/// Hex characters kept from the session digest.
const SESSION_HASH_LEN: usize = 16;

/// Hex characters kept from the path digest.
const PATH_HASH_LEN: usize = 10;

/// Extension of the materialized source file; also the suffix of the public
/// cache file name handed to clients.
pub const SOURCE_EXTENSION: &str = "dat";

/// Session used when the request carries no session discriminator.
pub const ANONYMOUS_SESSION: &str = "anonymous";

/// Per-viewer discriminator supplied by the surrounding middleware.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionContext {
    id: String,
}

impl SessionContext {
    /// Create a session context from an opaque identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The session used for requests without a discriminator.
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_SESSION)
    }

    /// The opaque session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Stable identifier for a (session, source path) pair.
///
/// Keys have the shape `vid_<16 hex>_<10 hex>` and are safe to use as a path
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a session and a source path.
    ///
    /// Deterministic across process restarts, so previously produced
    /// artifacts stay reusable.
    pub fn derive(session: &SessionContext, source_path: &str) -> Self {
        let session_hash = truncated_digest(session.id(), SESSION_HASH_LEN);
        let path_hash = truncated_digest(source_path, PATH_HASH_LEN);
        Self(format!("{KEY_PREFIX}{session_hash}_{path_hash}"))
    }

    /// Parse and validate a bare key (no extension).
    pub fn parse(raw: &str) -> Result<Self> {
        if is_valid_key(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::invalid_input(format!("invalid cache key: {raw:?}")))
        }
    }

    /// Parse the public cache file name (`<key>.dat`) used by the segment
    /// endpoint.
    pub fn from_cache_file_name(name: &str) -> Result<Self> {
        let stem = name
            .strip_suffix(SOURCE_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .ok_or_else(|| Error::invalid_input(format!("invalid cache file name: {name:?}")))?;
        Self::parse(stem)
    }

    /// The public cache file name, `<key>.dat`.
    pub fn cache_file_name(&self) -> String {
        format!("{}.{SOURCE_EXTENSION}", self.0)
    }

    /// The bare key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn truncated_digest(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(len);
    hex
}

fn is_valid_key(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix(KEY_PREFIX) else {
        return false;
    };
    let Some((session, path)) = rest.split_once('_') else {
        return false;
    };
    is_lower_hex(session, SESSION_HASH_LEN) && is_lower_hex(path, PATH_HASH_LEN)
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
