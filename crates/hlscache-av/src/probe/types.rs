//! Probe result types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Metadata describing a source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Container duration in seconds (0 when unknown).
    pub duration_secs: f64,
    /// Overall bit rate in bits per second (0 when unknown).
    pub bit_rate: u64,
    /// Streams in container order.
    pub streams: Vec<ProbeStream>,
}

/// A single stream of a probed file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStream {
    /// `video`, `audio`, `subtitle`, `data`...
    pub codec_type: String,
    pub codec_name: String,
    pub pixel_format: String,
}

impl ProbeResult {
    /// True if at least one stream is a video stream.
    pub fn has_video(&self) -> bool {
        self.streams.iter().any(|s| s.codec_type == "video")
    }

    /// Duration, if the container reported a usable one.
    pub fn duration(&self) -> Option<Duration> {
        if self.duration_secs > 0.0 {
            Duration::try_from_secs_f64(self.duration_secs).ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_video() {
        let mut result = ProbeResult::default();
        assert!(!result.has_video());
        result.streams.push(ProbeStream {
            codec_type: "audio".into(),
            codec_name: "aac".into(),
            pixel_format: String::new(),
        });
        assert!(!result.has_video());
        result.streams.push(ProbeStream {
            codec_type: "video".into(),
            codec_name: "h264".into(),
            pixel_format: "yuv420p".into(),
        });
        assert!(result.has_video());
    }

    #[test]
    fn duration_ignores_unknown() {
        let mut result = ProbeResult::default();
        assert_eq!(result.duration(), None);
        result.duration_secs = 12.5;
        assert_eq!(result.duration(), Some(Duration::from_millis(12_500)));
    }

    #[test]
    fn duration_out_of_range_is_none() {
        let mut result = ProbeResult::default();
        for secs in [1e300, f64::INFINITY, f64::NAN, -3.0] {
            result.duration_secs = secs;
            assert_eq!(result.duration(), None, "{secs}");
        }
    }
}
