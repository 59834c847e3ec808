use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use xgrab_tools::{
    config::{DEFAULT_CONFIG_PATH, ServiceConfig},
    logging,
    supervisor::{API_BINARY, Outcome, Supervisor, find_executable, shutdown_signal},
    watcher::CookieWatcher,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run the API server and the cookie watcher together."
)]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the env-style config file")]
    config: PathBuf,
    #[arg(
        long = "backend",
        value_name = "PATH",
        help = "API server executable (defaults to the sibling `backend` binary)"
    )]
    backend: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config = ServiceConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let backend = match cli.backend {
        Some(path) => path,
        None => find_executable(API_BINARY)?,
    };

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    info!(
        port = config.port,
        watch_dir = %config.watch_dir.display(),
        "starting xgrab services"
    );
    let watcher = CookieWatcher::new(&config.watch_dir, &config.cookies_file);
    let outcome = Supervisor::new(backend)
        .arg("--config")
        .arg(&cli.config)
        .with_watcher(watcher)
        .run(shutdown)
        .await?;

    match outcome {
        Outcome::Stopped(_) => Ok(()),
        Outcome::ChildExited(status) => bail!("API server exited with {status}"),
    }
}
