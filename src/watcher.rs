//! Polling watcher that converts dropped browser cookie exports into the
//! service's cookie jar.
//!
//! The watched directory is scanned (non-recursively) on a fixed interval.
//! A `raw_cookies.json` that was not there on the previous scan is a
//! *create*; one whose size or mtime changed is a *modify*. Either triggers a
//! conversion, subject to a per-path cooldown so a writer flushing in chunks
//! does not cause a burst of conversions.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cookies::{CookieError, CookieJar, convert_export_file};

/// File name (case-insensitive) the watcher reacts to.
pub const RAW_COOKIES_FILE: &str = "raw_cookies.json";
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Grace period for the writer to finish before the file is read.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const COOLDOWN: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Created,
    Modified,
}

impl WatchEvent {
    fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

/// Converts `input` into the jar at `output` and removes `input` on success.
/// Failing to remove the source is logged and otherwise ignored.
pub fn convert_and_cleanup(input: &Path, output: &Path) -> Result<CookieJar, CookieError> {
    let jar = convert_export_file(input, output)?;
    info!(
        source = %input.display(),
        jar = %output.display(),
        records = jar.records_seen,
        lines = jar.lines_written,
        "converted browser cookies"
    );
    if let Err(err) = fs::remove_file(input) {
        warn!(source = %input.display(), error = %err, "could not remove converted cookie export");
    }
    Ok(jar)
}

pub struct CookieWatcher {
    dir: PathBuf,
    output: PathBuf,
    poll_interval: Duration,
    settle_delay: Duration,
    cooldown: Duration,
    seen: HashMap<PathBuf, FileStamp>,
    last_processed: HashMap<PathBuf, Instant>,
}

impl CookieWatcher {
    pub fn new(dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            output: output.into(),
            poll_interval: POLL_INTERVAL,
            settle_delay: SETTLE_DELAY,
            cooldown: COOLDOWN,
            seen: HashMap::new(),
            last_processed: HashMap::new(),
        }
    }

    pub fn with_timing(
        mut self,
        poll_interval: Duration,
        settle_delay: Duration,
        cooldown: Duration,
    ) -> Self {
        self.poll_interval = poll_interval;
        self.settle_delay = settle_delay;
        self.cooldown = cooldown;
        self
    }

    /// Compares the directory against the previous scan.
    fn scan(&mut self) -> io::Result<Vec<(PathBuf, WatchEvent)>> {
        let mut current = HashMap::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().eq_ignore_ascii_case(RAW_COOKIES_FILE) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            current.insert(
                entry.path(),
                FileStamp {
                    modified: metadata.modified().ok(),
                    len: metadata.len(),
                },
            );
        }

        let mut events = Vec::new();
        for (path, stamp) in &current {
            match self.seen.get(path) {
                None => events.push((path.clone(), WatchEvent::Created)),
                Some(previous) if previous != stamp => {
                    events.push((path.clone(), WatchEvent::Modified))
                }
                Some(_) => {}
            }
        }
        self.seen = current;
        Ok(events)
    }

    /// Per-path debounce: at most one conversion per cooldown window.
    fn cooling_down(&self, path: &Path, now: Instant) -> bool {
        self.last_processed
            .get(path)
            .is_some_and(|last| now.duration_since(*last) < self.cooldown)
    }

    fn mark_processed(&mut self, path: &Path, now: Instant) {
        self.last_processed.insert(path.to_path_buf(), now);
    }

    /// One synchronous pass over files that already exist when the watcher
    /// starts. Returns the jars that were written.
    pub fn process_existing(&mut self) -> Result<Vec<CookieJar>> {
        let events = self
            .scan()
            .with_context(|| format!("scanning {}", self.dir.display()))?;
        let mut jars = Vec::new();
        for (path, _) in events {
            if self.seen.get(&path).is_some_and(|stamp| stamp.len == 0) {
                // Still being written; let the poll loop report it as new.
                self.seen.remove(&path);
                continue;
            }
            info!(source = %path.display(), "found existing cookie export");
            self.mark_processed(&path, Instant::now());
            match convert_and_cleanup(&path, &self.output) {
                Ok(jar) => jars.push(jar),
                Err(err) => {
                    warn!(source = %path.display(), error = %err, "cookie conversion failed")
                }
            }
        }
        Ok(jars)
    }

    async fn handle(&mut self, path: PathBuf, event: WatchEvent) {
        if self.cooling_down(&path, Instant::now()) {
            debug!(source = %path.display(), "skipping cookie export within cooldown");
            return;
        }
        info!(source = %path.display(), event = event.label(), "cookie export changed");
        tokio::time::sleep(self.settle_delay).await;

        // An empty file does not start the cooldown, so the write that fills
        // it is still picked up.
        let non_empty = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        if !non_empty {
            debug!(source = %path.display(), "cookie export vanished or is empty");
            return;
        }
        self.mark_processed(&path, Instant::now());

        let output = self.output.clone();
        let input = path.clone();
        match task::spawn_blocking(move || convert_and_cleanup(&input, &output)).await {
            Ok(Ok(_)) => info!("cookies are ready for use"),
            Ok(Err(err)) => warn!(
                source = %path.display(),
                error = %err,
                "cookie conversion failed; check the file format"
            ),
            Err(err) => warn!(error = %err, "cookie conversion task panicked"),
        }
    }

    /// Startup pass, then poll until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            dir = %self.dir.display(),
            jar = %self.output.display(),
            file = RAW_COOKIES_FILE,
            "starting cookie watcher"
        );
        self.process_existing()?;

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let events = match self.scan() {
                Ok(events) => events,
                Err(err) => {
                    warn!(dir = %self.dir.display(), error = %err, "cookie watch scan failed");
                    continue;
                }
            };
            for (path, event) in events {
                self.handle(path, event).await;
            }
        }

        info!("cookie watcher stopped");
        Ok(())
    }
}
