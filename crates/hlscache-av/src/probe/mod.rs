//! Source probing.
//!
//! The [`Prober`] trait is the seam the job supervisor probes through;
//! [`FfprobeProber`] is the production backend.

pub mod ffprobe;
pub mod types;

use std::path::Path;

use async_trait::async_trait;

pub use self::ffprobe::FfprobeProber;
pub use self::types::{ProbeResult, ProbeStream};

use crate::Result;

/// A media file prober capable of extracting source metadata.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
#[async_trait]
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Probe a media file at the given path.
    ///
    /// A process that cannot be launched and output that cannot be parsed
    /// are reported as different [`crate::Error`] variants.
    async fn probe(&self, path: &Path) -> Result<ProbeResult>;
}
