use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use xgrab_tools::{
    config::{DEFAULT_CONFIG_PATH, ServiceConfig},
    logging,
    supervisor::shutdown_signal,
    watcher::{CookieWatcher, RAW_COOKIES_FILE},
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert dropped browser cookie exports into a Netscape cookie jar."
)]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the env-style config file")]
    config: PathBuf,
    #[arg(
        long = "dir",
        value_name = "PATH",
        help = "Directory to watch for raw_cookies.json"
    )]
    dir: Option<PathBuf>,
    #[arg(long = "output", value_name = "PATH", help = "Cookie jar to write")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config = ServiceConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let dir = cli.dir.unwrap_or(config.watch_dir);
    let output = cli.output.unwrap_or(config.cookies_file);
    info!(
        "drop {RAW_COOKIES_FILE} into {} to refresh {}",
        dir.display(),
        output.display()
    );

    let shutdown = CancellationToken::new();
    let watcher = tokio::spawn(CookieWatcher::new(dir, output).run(shutdown.clone()));

    shutdown_signal().await;
    shutdown.cancel();
    watcher.await.context("joining cookie watcher")??;
    Ok(())
}
