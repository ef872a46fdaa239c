//! # hlscache-av
//!
//! External media tooling for the hlscache server.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`], [`Capabilities`]) -- find ffmpeg
//!   and ffprobe, and decide once whether transcoding can run on this host.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support; long-running commands stream stderr into the log.
//! - **Probing** ([`Prober`], [`FfprobeProber`]) -- duration, bit rate and
//!   per-stream codec information.
//! - **Transcoding** ([`TranscodeEngine`], [`FfmpegEngine`]) -- single
//!   rendition HLS output with an event playlist.

pub mod command;
pub mod error;
pub mod hls;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use hls::{FfmpegEngine, RenditionSettings, TranscodeEngine, TranscodeJob};
pub use probe::{FfprobeProber, ProbeResult, ProbeStream, Prober};
pub use tools::{Capabilities, ToolInfo, ToolRegistry, ToolsConfig, TranscoderAvailability};
