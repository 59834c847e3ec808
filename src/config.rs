use anyhow::{Context, Result, anyhow, bail};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/xgrab-env";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_COOKIES_FILE: &str = "cookies.txt";
pub const DEFAULT_WATCH_DIR: &str = ".";
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
pub const DEFAULT_CACHE_TTL_SECS: i64 = 3600;

/// How the service decides whether to hand cookies to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionStrategy {
    /// Cookies only when the caller flags the post as adult content.
    #[default]
    Manual,
    /// Try anonymously first, retry once with cookies when the failure
    /// looks like a restricted post.
    Auto,
}

impl FromStr for DetectionStrategy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            other => bail!("unknown detection mode '{other}' (expected manual or auto)"),
        }
    }
}

/// Values read from the env file. Unset keys stay `None` so later layers can
/// tell "absent" from "default".
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cookies_file: Option<PathBuf>,
    pub watch_dir: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    pub detection: Option<DetectionStrategy>,
    pub cache_ttl_secs: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub cookies_file: PathBuf,
    pub watch_dir: PathBuf,
    pub ytdlp_path: PathBuf,
    pub detection: DetectionStrategy,
    pub cache_ttl_secs: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            cookies_file: PathBuf::from(DEFAULT_COOKIES_FILE),
            watch_dir: PathBuf::from(DEFAULT_WATCH_DIR),
            ytdlp_path: PathBuf::from(DEFAULT_YTDLP_PATH),
            detection: DetectionStrategy::Manual,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

fn apply_entry(cfg: &mut EnvConfig, key: &str, value: &str, origin: &str) -> Result<()> {
    match key {
        "HOST" => {
            if !value.is_empty() {
                cfg.host = Some(value.to_string());
            }
        }
        "PORT" => {
            let port: u16 = value
                .parse()
                .with_context(|| format!("Parsing PORT from {origin}"))?;
            cfg.port = Some(port);
        }
        "COOKIES_FILE" => cfg.cookies_file = Some(PathBuf::from(value)),
        "WATCH_DIR" => cfg.watch_dir = Some(PathBuf::from(value)),
        "YTDLP_PATH" => cfg.ytdlp_path = Some(PathBuf::from(value)),
        "DETECTION_MODE" => {
            let mode: DetectionStrategy = value
                .parse()
                .with_context(|| format!("Parsing DETECTION_MODE from {origin}"))?;
            cfg.detection = Some(mode);
        }
        "CACHE_TTL_SECS" => {
            let secs: i64 = value
                .parse()
                .with_context(|| format!("Parsing CACHE_TTL_SECS from {origin}"))?;
            if secs <= 0 {
                bail!("CACHE_TTL_SECS must be positive in {origin}");
            }
            cfg.cache_ttl_secs = Some(secs);
        }
        _ => {}
    }
    Ok(())
}

const KNOWN_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "COOKIES_FILE",
    "WATCH_DIR",
    "YTDLP_PATH",
    "DETECTION_MODE",
    "CACHE_TTL_SECS",
];

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let origin = path.display().to_string();
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            apply_entry(&mut cfg, key.trim(), value, &origin)?;
        }
    }
    Ok(Some(cfg))
}

/// Overlays process environment variables (or any lookup, for tests) on top
/// of the file values.
pub fn apply_env_overrides<F>(mut cfg: EnvConfig, lookup: F) -> Result<EnvConfig>
where
    F: Fn(&str) -> Option<String>,
{
    for key in KNOWN_KEYS {
        if let Some(value) = lookup(key) {
            apply_entry(&mut cfg, key, value.trim(), "the environment")?;
        }
    }
    Ok(cfg)
}

impl ServiceConfig {
    /// File (if present) < environment. Missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_cfg = read_env_config(path.as_ref())?.unwrap_or_default();
        let cfg = apply_env_overrides(file_cfg, lookup)?;
        Ok(Self::from_env_config(cfg))
    }

    pub fn from_env_config(cfg: EnvConfig) -> Self {
        let defaults = Self::default();
        Self {
            host: cfg.host.unwrap_or(defaults.host),
            port: cfg.port.unwrap_or(defaults.port),
            cookies_file: cfg.cookies_file.unwrap_or(defaults.cookies_file),
            watch_dir: cfg.watch_dir.unwrap_or(defaults.watch_dir),
            ytdlp_path: cfg.ytdlp_path.unwrap_or(defaults.ytdlp_path),
            detection: cfg.detection.unwrap_or(defaults.detection),
            cache_ttl_secs: cfg.cache_ttl_secs.unwrap_or(defaults.cache_ttl_secs),
        }
    }

    pub fn bind_addr(&self) -> Result<std::net::SocketAddr> {
        let ip: std::net::IpAddr = self
            .host
            .parse()
            .map_err(|err| anyhow!("invalid HOST '{}': {err}", self.host))?;
        Ok(std::net::SocketAddr::new(ip, self.port))
    }
}
