//! hlscache - On-demand HLS transcoding cache
//!
//! This library crate exposes the core functionality for integration testing.

pub mod cache;
pub mod config;
pub mod probe;
pub mod server;
pub mod source;
pub mod streaming;
pub mod transcode;
