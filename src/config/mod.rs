mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./hlscache.toml",
        "./config.toml",
        "~/.config/hlscache/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.media.session_header.trim().is_empty() {
        anyhow::bail!("media.session_header cannot be empty");
    }

    let transcoder = &config.transcoder;
    if transcoder.job_timeout_secs == 0 {
        anyhow::bail!("transcoder.job_timeout_secs must be greater than 0");
    }

    let rendition = &transcoder.rendition;
    if rendition.segment_seconds == 0 {
        anyhow::bail!("transcoder.rendition.segment_seconds must be greater than 0");
    }
    if rendition.max_height == 0 || rendition.max_height % 2 != 0 {
        anyhow::bail!(
            "transcoder.rendition.max_height must be a positive even number, got {}",
            rendition.max_height
        );
    }
    if !rendition.segment_route.starts_with('/') || rendition.segment_route.len() < 2 {
        anyhow::bail!(
            "transcoder.rendition.segment_route must be an absolute route, got {:?}",
            rendition.segment_route
        );
    }

    for format in transcoder.blacklist().formats() {
        if hlscache_common::paths::mime_type_for_extension(format).is_none() {
            tracing::warn!("Blacklisted format {:?} has no known mime type and will be ignored", format);
        }
    }

    Ok(())
}
