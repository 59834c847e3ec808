use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::Parser;
use tracing::{info, warn};
use xgrab_tools::{
    cache::VideoCache,
    config::{DEFAULT_CONFIG_PATH, DetectionStrategy, ServiceConfig},
    extractor::YtDlp,
    logging,
    server::{AppState, router},
    supervisor::shutdown_signal,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve direct video URLs for X/Twitter posts.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the env-style config file")]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Override the bind address")]
    host: Option<String>,
    #[arg(long = "port", value_name = "PORT", help = "Override the listen port")]
    port: Option<u16>,
    #[arg(
        long = "cookies-file",
        value_name = "PATH",
        help = "Override the Netscape cookie jar used for restricted posts"
    )]
    cookies_file: Option<PathBuf>,
    #[arg(
        long = "detection",
        value_name = "MODE",
        help = "Cookie strategy: manual or auto"
    )]
    detection: Option<DetectionStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let mut config = ServiceConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(cookies_file) = cli.cookies_file {
        config.cookies_file = cookies_file;
    }
    if let Some(detection) = cli.detection {
        config.detection = detection;
    }

    let ytdlp = YtDlp::new(&config.ytdlp_path);
    if let Err(err) = ytdlp.ensure_available() {
        warn!(error = %err, "yt-dlp does not look usable; extraction requests will fail");
    }

    let ttl = TimeDelta::try_seconds(config.cache_ttl_secs)
        .with_context(|| format!("cache TTL of {}s is out of range", config.cache_ttl_secs))?;
    let cache = VideoCache::new(ttl);
    let state = AppState::new(
        Arc::new(ytdlp),
        Arc::new(cache),
        config.cookies_file.clone(),
        config.detection,
    );
    let app = router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(
        %addr,
        cookies = %config.cookies_file.display(),
        detection = ?config.detection,
        cache_ttl_secs = config.cache_ttl_secs,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    info!("API server stopped");
    Ok(())
}
