//! Normalization and validation of X/Twitter post URLs.

use std::{fmt, sync::LazyLock};

use regex::Regex;

use crate::error::FetchError;

pub const CANONICAL_DOMAIN: &str = "x.com";
pub const LEGACY_DOMAIN: &str = "twitter.com";

static POST_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(twitter\.com|x\.com)/(i/web|[^/?#\s]+)/status/\d+")
        .expect("post URL pattern compiles")
});

/// Trims whitespace and rewrites the legacy domain to the canonical one.
pub fn normalize_post_url(raw: &str) -> String {
    raw.trim().replace(LEGACY_DOMAIN, CANONICAL_DOMAIN)
}

/// Accepts `scheme://(x.com|twitter.com)/<user>/status/<digits>` and the
/// `/i/web/status/<digits>` share form; anything after the status id (query
/// strings, `/video/1`) is tolerated.
pub fn is_valid_post_url(url: &str) -> bool {
    POST_URL.is_match(url)
}

/// A normalized URL that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostUrl(String);

impl PostUrl {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let normalized = normalize_post_url(raw);
        if is_valid_post_url(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(FetchError::InvalidUrl(raw.trim().to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_domains() {
        assert!(is_valid_post_url("https://x.com/alice/status/12345"));
        assert!(is_valid_post_url("https://twitter.com/bob/status/1"));
        assert!(is_valid_post_url("http://x.com/carol/status/42?s=20"));
    }

    #[test]
    fn accepts_web_share_links() {
        assert!(is_valid_post_url("https://x.com/i/web/status/1672884416430096384"));
        let url = PostUrl::parse("https://twitter.com/i/web/status/7").unwrap();
        assert_eq!(url.as_str(), "https://x.com/i/web/status/7");
    }

    #[test]
    fn rejects_missing_user_and_foreign_domains() {
        assert!(!is_valid_post_url("https://x.com/status/123"));
        assert!(!is_valid_post_url("https://example.com/alice/status/1"));
        assert!(!is_valid_post_url("https://x.com/alice/status/abc"));
        assert!(!is_valid_post_url("ftp://x.com/alice/status/1"));
    }

    #[test]
    fn normalize_trims_and_rewrites_domain() {
        assert_eq!(
            normalize_post_url("  https://twitter.com/bob/status/1 \n"),
            "https://x.com/bob/status/1"
        );
    }

    #[test]
    fn parse_returns_canonical_url() {
        let url = PostUrl::parse(" https://twitter.com/bob/status/9 ").unwrap();
        assert_eq!(url.as_str(), "https://x.com/bob/status/9");
    }

    #[test]
    fn parse_rejects_invalid_input() {
        let err = PostUrl::parse("https://example.com/alice/status/1").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
