// Re-export probe functionality from hlscache-av
pub use hlscache_av::probe::*;
pub use hlscache_av::{ToolInfo, ToolRegistry, ToolsConfig};

use anyhow::{Context, Result};
use hlscache_av::tools::FFPROBE;
use std::path::Path;

/// Probe a media file with ffprobe
pub async fn probe_file(tools: &ToolsConfig, path: &Path) -> Result<ProbeResult> {
    let registry = ToolRegistry::discover(tools);
    let ffprobe = registry.require(FFPROBE)?;
    FfprobeProber::new(ffprobe.to_path_buf())
        .probe(path)
        .await
        .with_context(|| format!("Failed to probe {:?}", path))
}
