//! hlscache-common: shared types, constants, and utilities.
//!
//! This crate provides common functionality used across hlscache:
//!
//! - **Cache keys**: Deterministic, filesystem-safe identifiers for a
//!   (session, source path) pair
//! - **Path utilities**: Extension based video detection and mime lookup
//! - **Blacklist**: Parsing of the comma-separated format blacklist
//! - **Error handling**: Common error type with HTTP status mapping
//!
//! # Examples
//!
//! ```
//! use hlscache_common::{CacheKey, SessionContext};
//! use hlscache_common::paths::is_video_file;
//!
//! let session = SessionContext::new("alice");
//! let key = CacheKey::derive(&session, "/movies/holiday.mp4");
//! assert!(key.as_str().starts_with("vid_"));
//!
//! assert!(is_video_file("movie.mkv"));
//! ```

pub mod blacklist;
pub mod error;
pub mod key;
pub mod paths;

pub use blacklist::Blacklist;
pub use error::{Error, Result};
pub use key::{CacheKey, SessionContext};
