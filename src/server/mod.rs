use crate::cache::CacheLayout;
use crate::config::Config;
use crate::source::{LocalMediaSource, MediaSource};
use crate::streaming::HlsInterceptor;
use crate::transcode::{JobSupervisor, SupervisorOptions};
use anyhow::{Context, Result};
use axum::{
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use hlscache_av::{
    Capabilities, FfmpegEngine, FfprobeProber, Prober, TranscodeEngine, TranscoderAvailability,
};
use hlscache_common::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

mod error;
pub mod routes_content;
pub mod routes_hls;

pub use error::AppError;

/// Engine and prober backing the transcode jobs
#[derive(Clone)]
pub struct TranscodeBackends {
    pub engine: Arc<dyn TranscodeEngine>,
    pub prober: Arc<dyn Prober>,
}

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Origin of the files served by the content route
    pub media: Arc<dyn MediaSource>,
    /// Present only when transcoding is enabled and available
    pub hls: Option<Arc<HlsInterceptor>>,
}

impl AppContext {
    /// Build a context. Transcoding is wired up when `backends` is given and
    /// the config enables it.
    pub fn new(
        config: Config,
        media: Arc<dyn MediaSource>,
        backends: Option<TranscodeBackends>,
    ) -> Self {
        let hls = backends
            .filter(|_| config.transcoder.enabled)
            .map(|backends| {
                let supervisor = JobSupervisor::new(
                    CacheLayout::new(config.cache.root.clone()),
                    backends.engine,
                    backends.prober,
                    SupervisorOptions {
                        job_timeout: config.transcoder.job_timeout(),
                        rendition: config.transcoder.rendition.clone(),
                    },
                );
                Arc::new(HlsInterceptor::new(
                    config.transcoder.blacklist(),
                    Arc::new(supervisor),
                ))
            });

        Self {
            config: Arc::new(config),
            media,
            hls,
        }
    }

    /// Production wiring: local media, ffmpeg and ffprobe when installed.
    pub fn from_capabilities(config: Config, capabilities: &Capabilities) -> Self {
        let backends = match &capabilities.transcoder {
            TranscoderAvailability::Available { ffmpeg, ffprobe } => Some(TranscodeBackends {
                engine: Arc::new(FfmpegEngine::new(
                    ffmpeg.clone(),
                    config.transcoder.rendition.clone(),
                )),
                prober: Arc::new(FfprobeProber::new(ffprobe.clone())),
            }),
            TranscoderAvailability::Missing { tools } => {
                if config.transcoder.enabled {
                    for tool in tools {
                        tracing::warn!("{} needs to be installed, transcoding disabled", tool);
                    }
                }
                None
            }
        };
        let media = Arc::new(LocalMediaSource::new(config.media.root.clone()));
        Self::new(config, media, backends)
    }

    pub fn transcoding_enabled(&self) -> bool {
        self.hls.is_some()
    }

    fn hls(&self) -> std::result::Result<&Arc<HlsInterceptor>, AppError> {
        self.hls
            .as_ref()
            .ok_or_else(|| AppError::new(Error::not_found("route", "transcoding is disabled")))
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::DELETE])
        .allow_headers(Any);

    let mut app = Router::new()
        // Health check
        .route("/health", get(health_check))
        .merge(routes_content::content_routes());

    // HLS routes only exist while transcoding is available
    if ctx.transcoding_enabled() {
        app = app.merge(routes_hls::hls_routes(
            &ctx.config.transcoder.rendition.segment_route,
        ));
        tracing::info!("Transcoding routes enabled");
    }

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
