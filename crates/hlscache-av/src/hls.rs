//! HLS transcoding through ffmpeg.
//!
//! A single fixed rendition is produced: height capped at
//! [`RenditionSettings::max_height`], fixed-length MPEG-TS segments named
//! `000.ts`, `001.ts`... and an event playlist that ffmpeg only ever appends
//! to. Segment URIs in the playlist are `<segment_base_url><index>.ts`, so
//! they route back through the segment endpoint.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use crate::tools::FFMPEG;
use crate::Result;

/// Zero-padded running index used for segment file names.
pub const SEGMENT_PATTERN: &str = "%03d.ts";

/// Extension of produced segments.
pub const SEGMENT_EXTENSION: &str = "ts";

/// x264 tuning that favours encoding speed over compression, so segments
/// appear faster than real time on modest hardware.
const X264_FAST_OPTS: &str =
    "subme=0:me_range=4:rc_lookahead=10:me=dia:no_chroma_me:8x8dct=0:partitions=none";

/// Encoding policy for the single output rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenditionSettings {
    /// Maximum output height; width follows the aspect ratio (default: 720).
    pub max_height: u32,
    /// Target segment length in seconds (default: 10).
    pub segment_seconds: u32,
    /// Video encoder (default: libx264).
    pub video_encoder: String,
    /// Encoder preset (default: veryfast).
    pub preset: String,
    /// Audio encoder (default: aac). `libfdk_aac` enables VBR mode 5.
    pub audio_encoder: String,
    /// Output pixel format (default: yuv420p).
    pub pixel_format: String,
    /// Route segment URIs point at (default: /hls).
    pub segment_route: String,
}

impl Default for RenditionSettings {
    fn default() -> Self {
        Self {
            max_height: 720,
            segment_seconds: 10,
            video_encoder: "libx264".to_string(),
            preset: "veryfast".to_string(),
            audio_encoder: "aac".to_string(),
            pixel_format: "yuv420p".to_string(),
            segment_route: "/hls".to_string(),
        }
    }
}

impl RenditionSettings {
    /// Base URL embedded before each segment name for a given cache file.
    pub fn segment_base_url(&self, cache_file_name: &str) -> String {
        format!("{}?path={}&file=", self.segment_route, cache_file_name)
    }
}

/// Everything the engine needs for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    /// Materialized source file.
    pub source: PathBuf,
    /// Directory receiving segment files.
    pub segment_dir: PathBuf,
    /// Playlist path written and appended to by the engine.
    pub playlist: PathBuf,
    /// Prefix of every segment URI in the playlist.
    pub segment_base_url: String,
    /// Upper bound on the job's runtime.
    pub timeout: Duration,
}

/// Something that can turn a source file into an HLS rendition.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Human-readable engine name.
    fn name(&self) -> &'static str;

    /// Run the job to completion. Returns once the output process exits.
    async fn transcode(&self, job: &TranscodeJob) -> Result<()>;
}

/// Production engine shelling out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    settings: RenditionSettings,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: PathBuf, settings: RenditionSettings) -> Self {
        Self {
            ffmpeg_path,
            settings,
        }
    }

    pub fn settings(&self) -> &RenditionSettings {
        &self.settings
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        FFMPEG
    }

    async fn transcode(&self, job: &TranscodeJob) -> Result<()> {
        let args = build_ffmpeg_args(job, &self.settings);
        tracing::debug!("FFmpeg args: {:?}", args);

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(args);
        cmd.timeout(job.timeout);
        cmd.run_logged().await
    }
}

/// Build the ffmpeg argument list for a job.
pub fn build_ffmpeg_args(job: &TranscodeJob, settings: &RenditionSettings) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        path_arg(&job.source),
        "-vf".to_string(),
        format!("scale=-2:{}", settings.max_height),
        "-vcodec".to_string(),
        settings.video_encoder.clone(),
        "-preset".to_string(),
        settings.preset.clone(),
        "-acodec".to_string(),
        settings.audio_encoder.clone(),
    ];

    if settings.audio_encoder == "libfdk_aac" {
        args.extend(["-vbr".to_string(), "5".to_string()]);
    }

    args.extend([
        "-pix_fmt".to_string(),
        settings.pixel_format.clone(),
    ]);

    if settings.video_encoder == "libx264" {
        args.extend(["-x264opts:0".to_string(), X264_FAST_OPTS.to_string()]);
    }

    args.extend([
        "-f".to_string(),
        "hls".to_string(),
        "-hls_playlist_type".to_string(),
        "event".to_string(),
        // Segments are renamed into place once complete
        "-hls_flags".to_string(),
        "temp_file".to_string(),
        "-hls_base_url".to_string(),
        job.segment_base_url.clone(),
        "-hls_time".to_string(),
        format!("{}.00", settings.segment_seconds),
        "-hls_segment_filename".to_string(),
        path_arg(&job.segment_dir.join(SEGMENT_PATTERN)),
        "-copyts".to_string(),
        "-vsync".to_string(),
        "2".to_string(),
        path_arg(&job.playlist),
    ]);

    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
