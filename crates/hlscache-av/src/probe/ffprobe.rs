//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`ProbeResult`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::types::{ProbeResult, ProbeStream};
use super::Prober;
use crate::command::ToolCommand;
use crate::tools::FFPROBE;
use crate::{Error, Result};

/// Probes should finish quickly; a stuck probe must not hold a job forever.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which(FFPROBE).ok().map(Self::new)
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        FFPROBE
    }

    async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy());
        cmd.timeout(PROBE_TIMEOUT);

        let output = cmd.execute().await?;
        parse_ffprobe_json(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    pix_fmt: Option<String>,
}

/// Parse ffprobe's JSON report.
///
/// ffprobe encodes numbers as strings. An absent field means unknown (0); a
/// present field that is not a number is a parse error.
pub fn parse_ffprobe_json(raw: &[u8]) -> Result<ProbeResult> {
    let output: FfprobeOutput = serde_json::from_slice(raw)
        .map_err(|e| Error::parse_error(FFPROBE, format!("invalid JSON: {e}")))?;

    let duration_secs = match output.format.duration.as_deref() {
        Some(s) => s
            .parse::<f64>()
            .map_err(|e| Error::parse_error(FFPROBE, format!("invalid duration {s:?}: {e}")))?,
        None => 0.0,
    };
    let bit_rate = match output.format.bit_rate.as_deref() {
        Some(s) => s
            .parse::<u64>()
            .map_err(|e| Error::parse_error(FFPROBE, format!("invalid bit_rate {s:?}: {e}")))?,
        None => 0,
    };

    let streams = output
        .streams
        .into_iter()
        .map(|s| ProbeStream {
            codec_type: s.codec_type.unwrap_or_default(),
            codec_name: s.codec_name.unwrap_or_default(),
            pixel_format: s.pix_fmt.unwrap_or_default(),
        })
        .collect();

    Ok(ProbeResult {
        duration_secs,
        bit_rate,
        streams,
    })
}
