//! Boundary to the external extractor.
//!
//! The service never parses X pages itself; it shells out to `yt-dlp
//! --dump-single-json` and reads back the metadata and format list. The
//! [`Extractor`] trait is the seam the HTTP layer depends on so tests can
//! swap in canned results.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::error::FetchError;
use crate::formats::FormatDescriptor;

/// Post used to check whether a cookie jar still authenticates.
pub const COOKIE_PROBE_URL: &str = "https://x.com/elonmusk/status/1";

/// Subset of yt-dlp's `--dump-single-json` payload. Everything is optional
/// because the extractor omits fields it could not scrape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub upload_date: Option<String>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub repost_count: Option<i64>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

/// Posts with several videos come back as a playlist; the first entry is the
/// one the service reports on.
#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(flatten)]
    info: VideoInfo,
    #[serde(default)]
    entries: Vec<VideoInfo>,
}

impl RawPayload {
    fn into_primary(self) -> VideoInfo {
        if self.info.formats.is_empty()
            && let Some(first) = self.entries.into_iter().next()
        {
            return first;
        }
        self.info
    }
}

/// Anything that can turn a post URL into metadata plus formats. Calls block
/// until the extractor finishes.
pub trait Extractor: Send + Sync {
    fn extract(&self, url: &str, cookies: Option<&Path>) -> Result<VideoInfo, FetchError>;
}

/// Runs the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `<program> --version` to fail loudly when yt-dlp is missing.
    pub fn ensure_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("checking for {}", self.program.display()))?;

        if !status.success() {
            bail!("{} --version exited with {status}", self.program.display());
        }
        Ok(())
    }
}

impl Extractor for YtDlp {
    fn extract(&self, url: &str, cookies: Option<&Path>) -> Result<VideoInfo, FetchError> {
        let mut command = Command::new(&self.program);
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--no-playlist");

        if let Some(jar) = cookies {
            command.arg("--cookies").arg(jar);
        }
        command.arg(url);

        let output = command
            .output()
            .map_err(|err| FetchError::Launch(format!("{}: {err}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            let text = if stderr.is_empty() {
                format!("yt-dlp exited with {}", output.status)
            } else {
                stderr
            };
            return Err(FetchError::classify(text));
        }

        let payload: RawPayload = serde_json::from_slice(&output.stdout)
            .map_err(|err| FetchError::Upstream(format!("unreadable extractor output: {err}")))?;
        Ok(payload.into_primary())
    }
}

/// Outcome of testing a cookie jar against a known post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieProbe {
    pub valid: bool,
    pub message: String,
}

impl CookieProbe {
    fn new(valid: bool, message: &str) -> Self {
        Self {
            valid,
            message: message.to_owned(),
        }
    }
}

/// Extracts [`COOKIE_PROBE_URL`] with the jar and interprets the result. Only
/// failures that clearly point at permissions or login count as invalid;
/// anything else is reported as inconclusive but usable.
pub fn probe_cookies(extractor: &dyn Extractor, jar: &Path) -> CookieProbe {
    match extractor.extract(COOKIE_PROBE_URL, Some(jar)) {
        Ok(_) => CookieProbe::new(true, "Cookies are valid and working!"),
        Err(err) => {
            let text = err.to_string().to_lowercase();
            if text.contains("private") || text.contains("protected") {
                CookieProbe::new(
                    false,
                    "Cookies are loaded but may not have sufficient permissions for private content",
                )
            } else if text.contains("login") || text.contains("auth") {
                CookieProbe::new(
                    false,
                    "Cookies are invalid or expired. Please update your cookies.",
                )
            } else {
                CookieProbe::new(
                    true,
                    "Cookies are loaded (validation inconclusive but likely working)",
                )
            }
        }
    }
}
