//! Conversion of browser-exported cookie JSON into the Netscape cookie-jar
//! text format that yt-dlp reads via `--cookies`.
//!
//! Browser extensions disagree on the export shape: some emit a bare array,
//! others wrap it as `{"cookies": [...]}`. Both are accepted. Individual
//! records are loosely typed on input and normalized into [`CookieJarLine`]
//! with fixed defaulting rules.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

pub const JAR_HEADER: &str = "# Netscape HTTP Cookie File";
const GENERATED_NOTICE: &str = "# This is a generated file! Do not edit.";
const UPLOADED_NOTICE: &str = "# Generated by xgrab-tools";

/// Domain whose cookies are mirrored onto [`ALIAS_DOMAIN`].
pub const PRIMARY_DOMAIN: &str = "x.com";
pub const ALIAS_DOMAIN: &str = "twitter.com";

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("invalid cookie JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a cookie array or an object with a 'cookies' array")]
    Shape,
    #[error("cookie file I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// One cookie as exported by a browser extension.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCookie {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: Option<bool>,
    pub expiration_date: Option<Value>,
    pub expires: Option<Value>,
    pub name: Option<String>,
    pub value: Option<String>,
}

impl BrowserCookie {
    /// `expirationDate` (Chrome exports) takes precedence over `expires`.
    /// Numbers and numeric strings are truncated to whole seconds; anything
    /// else becomes 0, i.e. a session cookie.
    pub fn expiry(&self) -> i64 {
        self.expiration_date
            .as_ref()
            .filter(|value| !value.is_null())
            .or(self.expires.as_ref())
            .and_then(coerce_epoch)
            .unwrap_or(0)
    }
}

fn coerce_epoch(value: &Value) -> Option<i64> {
    let seconds = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    seconds.is_finite().then(|| seconds.trunc() as i64)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CookieExport {
    Bare(Vec<BrowserCookie>),
    Wrapped { cookies: Vec<BrowserCookie> },
}

/// Accepts either export shape. Malformed JSON and JSON of the wrong shape
/// are reported separately.
pub fn parse_cookie_export(raw: &str) -> Result<Vec<BrowserCookie>, CookieError> {
    let value: Value = serde_json::from_str(raw)?;
    match serde_json::from_value::<CookieExport>(value) {
        Ok(CookieExport::Bare(cookies)) | Ok(CookieExport::Wrapped { cookies }) => Ok(cookies),
        Err(_) => Err(CookieError::Shape),
    }
}

/// A single line of a Netscape cookie jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieJarLine {
    pub domain: String,
    /// Second column. `TRUE` when the cookie applies to every subdomain,
    /// which the format signals with a leading dot on the domain.
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub expires: i64,
    pub name: String,
    pub value: String,
}

impl CookieJarLine {
    /// Applies the defaulting rules of the watcher transform. Returns `None`
    /// when the name, value or domain is missing or empty.
    pub fn from_browser(cookie: &BrowserCookie) -> Option<Self> {
        let name = cookie.name.clone().filter(|n| !n.is_empty())?;
        let value = cookie.value.clone().filter(|v| !v.is_empty())?;
        let mut domain = cookie.domain.clone().filter(|d| !d.is_empty())?;
        if !domain.starts_with('.') {
            domain.insert(0, '.');
        }

        Some(Self {
            include_subdomains: domain.starts_with('.'),
            domain,
            path: cookie.path.clone().unwrap_or_else(|| "/".to_owned()),
            secure: cookie.secure.unwrap_or(false),
            expires: cookie.expiry(),
            name,
            value,
        })
    }

    /// Copy of the line rewritten onto the alias domain, if the cookie
    /// belongs to the primary domain or one of its subdomains.
    pub fn alias(&self) -> Option<Self> {
        let bare = self.domain.trim_start_matches('.');
        let subdomain = if bare == PRIMARY_DOMAIN {
            ""
        } else {
            let head = bare.strip_suffix(PRIMARY_DOMAIN)?;
            if !head.ends_with('.') {
                return None;
            }
            head
        };
        let dot = if self.domain.starts_with('.') { "." } else { "" };
        Some(Self {
            domain: format!("{dot}{subdomain}{ALIAS_DOMAIN}"),
            ..self.clone()
        })
    }
}

impl fmt::Display for CookieJarLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.domain,
            flag(self.include_subdomains),
            self.path,
            flag(self.secure),
            self.expires,
            self.name,
            self.value
        )
    }
}

fn flag(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// Rendered jar plus counters for logging and API responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieJar {
    pub text: String,
    /// Records present in the input, valid or not.
    pub records_seen: usize,
    /// Lines written, alias duplicates included.
    pub lines_written: usize,
}

/// Watcher transform: normalizes every record and mirrors primary-domain
/// cookies onto the alias domain.
pub fn render_cookie_jar(cookies: &[BrowserCookie]) -> CookieJar {
    let lines: Vec<CookieJarLine> = cookies
        .iter()
        .filter_map(CookieJarLine::from_browser)
        .flat_map(|line| {
            let alias = line.alias();
            std::iter::once(line).chain(alias)
        })
        .collect();
    assemble(GENERATED_NOTICE, cookies.len(), &lines)
}

/// Upload transform used by `POST /auth/cookies`: records are written as
/// given, with defaults only for missing fields.
pub fn render_uploaded_jar(cookies: &[BrowserCookie]) -> CookieJar {
    let lines: Vec<CookieJarLine> = cookies
        .iter()
        .map(|cookie| {
            let domain = cookie.domain.clone().unwrap_or_default();
            CookieJarLine {
                include_subdomains: domain.starts_with('.'),
                domain,
                path: cookie.path.clone().unwrap_or_else(|| "/".to_owned()),
                secure: cookie.secure.unwrap_or(false),
                expires: cookie.expiry(),
                name: cookie.name.clone().unwrap_or_default(),
                value: cookie.value.clone().unwrap_or_default(),
            }
        })
        .collect();
    assemble(UPLOADED_NOTICE, cookies.len(), &lines)
}

fn assemble(notice: &str, records_seen: usize, lines: &[CookieJarLine]) -> CookieJar {
    let mut text = format!("{JAR_HEADER}\n{notice}\n\n");
    for line in lines {
        text.push_str(&line.to_string());
        text.push('\n');
    }
    CookieJar {
        text,
        records_seen,
        lines_written: lines.len(),
    }
}

/// Replaces the jar at `path`. The text is staged in a sibling temp file and
/// renamed into place so readers never see a partial jar.
pub fn write_cookie_jar(path: &Path, jar: &CookieJar) -> Result<(), CookieError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(jar.text.as_bytes())?;
    staged.flush()?;
    staged.persist(path).map_err(|err| CookieError::Io(err.error))?;
    Ok(())
}

/// Reads a browser export from `input` and writes the converted jar to
/// `output`.
pub fn convert_export_file(input: &Path, output: &Path) -> Result<CookieJar, CookieError> {
    let raw = fs::read_to_string(input)?;
    let cookies = parse_cookie_export(&raw)?;
    let jar = render_cookie_jar(&cookies);
    write_cookie_jar(output, &jar)?;
    Ok(jar)
}

/// Number of cookie lines in a jar, ignoring comments and blank lines.
pub fn count_jar_entries(path: &Path) -> io::Result<usize> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .count())
}
