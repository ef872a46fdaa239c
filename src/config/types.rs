use hlscache_av::{RenditionSettings, ToolsConfig};
use hlscache_common::Blacklist;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable supplying the default blacklist.
pub const BLACKLIST_ENV: &str = "FEATURE_TRANSCODING_VIDEO_BLACKLIST";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub transcoder: TranscoderConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8334
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Directory holding materialized sources, playlists and segments
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("data/cache/video")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Origin directory served by the content route
    #[serde(default = "default_media_root")]
    pub root: PathBuf,

    /// Request header carrying the viewer's session discriminator
    #[serde(default = "default_session_header")]
    pub session_header: String,
}

fn default_media_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_session_header() -> String {
    "x-session-id".to_string()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            session_header: default_session_header(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscoderConfig {
    /// Enable on-demand transcoding. Only effective when ffmpeg and ffprobe
    /// are installed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Comma-separated formats that are never transcoded (e.g. "mkv, avi")
    #[serde(default = "default_blacklist_format")]
    pub blacklist_format: String,

    /// Upper bound on a single transcode job (default: 4 hours)
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    #[serde(default)]
    pub rendition: RenditionSettings,
}

fn default_true() -> bool {
    true
}

fn default_blacklist_format() -> String {
    std::env::var(BLACKLIST_ENV).unwrap_or_default()
}

fn default_job_timeout() -> u64 {
    4 * 60 * 60
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blacklist_format: default_blacklist_format(),
            job_timeout_secs: default_job_timeout(),
            rendition: RenditionSettings::default(),
        }
    }
}

impl TranscoderConfig {
    pub fn blacklist(&self) -> Blacklist {
        Blacklist::parse(&self.blacklist_format)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}
