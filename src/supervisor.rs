//! Runs the API server as a child process next to the in-process cookie
//! watcher, relays the child's output into our log, and tears both down
//! together.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::signal;
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::watcher::CookieWatcher;

pub const API_BINARY: &str = "backend";
/// How long the API child gets to exit after SIGTERM before it is killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Resolves a sibling binary: `CARGO_BIN_EXE_<name>` first, then the
/// directory of the running executable.
pub fn find_executable(name: &str) -> Result<PathBuf> {
    let from_env = env::var_os(format!("CARGO_BIN_EXE_{name}")).map(PathBuf::from);
    let current = env::current_exe().context("locating the running executable")?;
    locate_executable(name, from_env, &current)
}

fn locate_executable(
    name: &str,
    from_env: Option<PathBuf>,
    current_exe: &Path,
) -> Result<PathBuf> {
    if let Some(path) = from_env
        && path.exists()
    {
        return Ok(path);
    }

    let mut sibling = current_exe.to_path_buf();
    sibling.set_file_name(name);
    if sibling.exists() {
        return Ok(sibling);
    }

    bail!("{name} binary not found. Build it with `cargo build --bin {name}`.");
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match unix_signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Shutdown was requested and the child has been stopped.
    Stopped(ExitStatus),
    /// The child exited without being asked to.
    ChildExited(ExitStatus),
}

pub struct Supervisor {
    program: PathBuf,
    args: Vec<OsString>,
    watcher: Option<CookieWatcher>,
    grace: Duration,
}

impl Supervisor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            watcher: None,
            grace: SHUTDOWN_GRACE,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_watcher(mut self, watcher: CookieWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Starts everything and waits for either `shutdown` or the child to
    /// exit. The watcher is stopped in both cases.
    pub async fn run(self, shutdown: CancellationToken) -> Result<Outcome> {
        info!(program = %self.program.display(), "starting API server");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", self.program.display()))?;

        let relays = [
            relay(child.stdout.take(), "stdout"),
            relay(child.stderr.take(), "stderr"),
        ];

        let watcher_token = shutdown.child_token();
        let watcher_task = self
            .watcher
            .map(|watcher| tokio::spawn(watcher.run(watcher_token.clone())));

        let exited = tokio::select! {
            status = child.wait() => Some(status.context("waiting for API server")?),
            _ = shutdown.cancelled() => None,
        };

        let outcome = match exited {
            Some(status) => {
                warn!(%status, "API server exited unexpectedly");
                Outcome::ChildExited(status)
            }
            None => {
                info!("stopping API server");
                Outcome::Stopped(stop_child(&mut child, self.grace).await?)
            }
        };

        watcher_token.cancel();
        if let Some(task) = watcher_task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "cookie watcher failed"),
                Err(err) => warn!(error = %err, "cookie watcher task panicked"),
            }
        }
        for handle in relays {
            let _ = handle.await;
        }

        info!("all services stopped");
        Ok(outcome)
    }
}

/// SIGTERM, then SIGKILL once `grace` has passed.
async fn stop_child(child: &mut Child, grace: Duration) -> Result<ExitStatus> {
    if let Some(raw) = child.id() {
        match i32::try_from(raw) {
            Ok(pid) => {
                if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
                    warn!(pid, error = %err, "failed to signal API server");
                }
            }
            Err(_) => warn!(pid = raw, "child pid out of range"),
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status.context("waiting for API server"),
        Err(_) => {
            warn!(grace_secs = grace.as_secs_f64(), "API server ignored SIGTERM; killing it");
            child.kill().await.context("killing API server")?;
            child.wait().await.context("waiting for API server")
        }
    }
}

fn relay<R>(reader: Option<R>, stream: &'static str) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match reader {
            Some(reader) => forward_lines(reader, stream).await,
            None => 0,
        }
    })
}

/// Logs every line read from `reader` with an `[API]` prefix and returns
/// how many were forwarded.
async fn forward_lines<R>(reader: R, stream: &'static str) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut forwarded = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!(stream, "[API] {line}");
                forwarded += 1;
            }
            Ok(None) => break,
            Err(err) => {
                warn!(stream, error = %err, "stopped relaying API output");
                break;
            }
        }
    }
    forwarded
}
