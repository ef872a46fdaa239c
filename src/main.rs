mod cli;

use hlscache::{cache::CacheLayout, config, probe, server};
use hlscache_av::{Capabilities, TranscoderAvailability};
use hlscache_common::{CacheKey, SessionContext};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting hlscache server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let layout = CacheLayout::new(config.cache.root.clone());
    layout
        .ensure_root()
        .with_context(|| format!("Failed to create cache root {:?}", layout.root()))?;
    tracing::info!("Cache root: {:?}", layout.root());

    // Detect ffmpeg/ffprobe once; routes are registered from the result
    let capabilities = Capabilities::detect(&config.tools);
    let ctx = server::AppContext::from_capabilities(config, &capabilities);

    match &ctx.hls {
        Some(hls) => match hls.supervisor().reconcile_orphans() {
            Ok(count) if count > 0 => {
                tracing::info!(
                    "Reset {} orphaned transcode jobs from previous session",
                    count
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to reset orphaned transcode jobs: {}", e);
            }
        },
        None => tracing::info!("Transcoding disabled"),
    }

    server::start_server(ctx).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlscache=trace,hlscache_av=trace,tower_http=debug".to_string()
        } else {
            "hlscache=debug,hlscache_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => probe_file(&file, cli.config.as_deref(), json),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Key { session, path } => {
            let key = CacheKey::derive(&SessionContext::new(session), &path);
            println!("{}", key);
            println!("{}", key.cache_file_name());
            Ok(())
        }
        Commands::Version => {
            println!("hlscache {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn probe_file(
    file: &std::path::Path,
    config_path: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(probe::probe_file(&config.tools, file))?;

    if json {
        let json_str = serde_json::to_string_pretty(&result)?;
        println!("{}", json_str);
    } else {
        println!("File: {}", file.display());
        if let Some(duration) = result.duration() {
            let secs = duration.as_secs();
            let mins = secs / 60;
            let hours = mins / 60;
            println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
        }
        println!("Bit rate: {} bit/s", result.bit_rate);

        println!("\nStreams: {}", result.streams.len());
        for (i, stream) in result.streams.iter().enumerate() {
            print!("  [{}] {} {}", i, stream.codec_type, stream.codec_name);
            if !stream.pixel_format.is_empty() {
                print!(" ({})", stream.pixel_format);
            }
            println!();
        }

        if !result.has_video() {
            println!("\nNo video stream: this file would not be transcoded.");
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let registry = probe::ToolRegistry::discover(&config.tools);
    let tools = registry.check_all();

    for tool in &tools {
        let status = if tool.available { "✓" } else { "✗" };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    match Capabilities::from_registry(&registry).transcoder {
        TranscoderAvailability::Available { .. } => {
            println!("All required tools are available!");
        }
        TranscoderAvailability::Missing { tools } => {
            println!(
                "Missing {}. On-demand transcoding will be disabled.",
                tools.join(", ")
            );
        }
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            print_summary(&config::Config::default());
        }
    }

    Ok(())
}

fn print_summary(config: &config::Config) {
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Cache root: {:?}", config.cache.root);
    println!("  Media root: {:?}", config.media.root);
    println!("  Transcoder enabled: {}", config.transcoder.enabled);
    let blacklist = config.transcoder.blacklist();
    if !blacklist.is_empty() {
        println!("  Blacklisted formats: {}", blacklist.formats().join(", "));
    }
    println!(
        "  Rendition: {}p, {}s segments",
        config.transcoder.rendition.max_height, config.transcoder.rendition.segment_seconds
    );
}
