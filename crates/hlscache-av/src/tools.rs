//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of ffmpeg and
//! ffprobe. [`Capabilities::detect`] turns the registry into the typed
//! availability flag the server consults once at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of the transcoder binary.
pub const FFMPEG: &str = "ffmpeg";

/// Name of the probe binary.
pub const FFPROBE: &str = "ffprobe";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[FFMPEG, FFPROBE];

/// Optional overrides for tool locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to ffmpeg. Falls back to `PATH` lookup when unset or missing.
    pub ffmpeg_path: Option<PathBuf>,
    /// Path to ffprobe. Falls back to `PATH` lookup when unset or missing.
    pub ffprobe_path: Option<PathBuf>,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// If the config supplies a custom path **and** that path exists, it is
    /// used directly. Otherwise [`which::which`] locates the tool in `PATH`.
    /// Tools that are not found are omitted from the registry.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                FFMPEG => tools_config.ffmpeg_path.as_deref(),
                FFPROBE => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, path = %p.display(), "Configured tool path does not exist, searching PATH");
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tools.insert(name.to_string(), path);
            }
        }

        Self { tools }
    }

    /// Register a tool at an explicit path.
    pub fn with_tool(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(name.into(), path.into());
        self
    }

    /// Path of the given tool, or [`Error::ToolNotFound`] if discovery did not
    /// find it.
    pub fn require(&self, name: &str) -> Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::tool_not_found(name))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

/// Whether on-demand transcoding can run on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscoderAvailability {
    /// Both binaries were found.
    Available { ffmpeg: PathBuf, ffprobe: PathBuf },
    /// At least one binary is missing.
    Missing { tools: Vec<String> },
}

/// Host capabilities detected once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub transcoder: TranscoderAvailability,
}

impl Capabilities {
    /// Discover tools and derive availability.
    pub fn detect(tools_config: &ToolsConfig) -> Self {
        Self::from_registry(&ToolRegistry::discover(tools_config))
    }

    /// Derive availability from an existing registry.
    pub fn from_registry(registry: &ToolRegistry) -> Self {
        let transcoder = match (registry.require(FFMPEG), registry.require(FFPROBE)) {
            (Ok(ffmpeg), Ok(ffprobe)) => TranscoderAvailability::Available {
                ffmpeg: ffmpeg.to_path_buf(),
                ffprobe: ffprobe.to_path_buf(),
            },
            (ffmpeg, ffprobe) => {
                let mut tools = Vec::new();
                if ffmpeg.is_err() {
                    tools.push(FFMPEG.to_string());
                }
                if ffprobe.is_err() {
                    tools.push(FFPROBE.to_string());
                }
                TranscoderAvailability::Missing { tools }
            }
        };
        Self { transcoder }
    }

    /// True when both ffmpeg and ffprobe are installed.
    pub fn transcoder_available(&self) -> bool {
        matches!(self.transcoder, TranscoderAvailability::Available { .. })
    }
}
