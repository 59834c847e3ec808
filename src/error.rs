//! Failure taxonomy shared by the extraction path and the HTTP layer.
//!
//! yt-dlp only reports problems as free-form text on stderr, so upstream
//! failures are bucketed by substring matching. Every upstream variant keeps
//! the raw text so callers can still log or inspect what the extractor said.

use thiserror::Error;

/// Everything that can go wrong between receiving a post URL and handing back
/// a ranked download URL.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid post URL: {0}")]
    InvalidUrl(String),
    #[error("No video formats found")]
    NoFormats,
    #[error("No {0} video formats available")]
    NoMatchingFormats(String),
    #[error("Could not extract download URL")]
    MissingDownloadUrl,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Unextractable(String),
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Upstream(String),
    #[error("failed to run extractor: {0}")]
    Launch(String),
}

/// Lowercase needles that make the auto-detection strategy retry a failed
/// extraction with cookies. Matching error text is a heuristic and can
/// misclassify both ways.
const RESTRICTION_NEEDLES: &[&str] = &[
    "403",
    "401",
    "forbidden",
    "unauthorized",
    "private",
    "protected",
    "sensitive",
    "age",
    "nsfw",
    "login",
];

impl FetchError {
    /// Buckets raw extractor output into a variant. Order matters: the first
    /// matching rule wins, mirroring how the messages overlap in practice
    /// (e.g. "HTTP Error 404: Not Found").
    pub fn classify(text: impl Into<String>) -> Self {
        let text = text.into();
        let lower = text.to_lowercase();
        if text.contains("HTTP Error 404") || text.contains("Not Found") {
            Self::NotFound(text)
        } else if text.contains("HTTP Error 403") || text.contains("Forbidden") {
            Self::Forbidden(text)
        } else if text.contains("HTTP Error 429") || text.contains("Too Many Requests") {
            Self::RateLimited(text)
        } else if text.contains("HTTP Error 401") || text.contains("Unauthorized") {
            Self::Unauthorized(text)
        } else if text.contains("Unsupported URL") {
            Self::Unsupported(text)
        } else if text.contains("Video unavailable") {
            Self::Unavailable(text)
        } else if text.contains("Unable to extract") || text.contains("Could not extract") {
            Self::Unextractable(text)
        } else if lower.contains("network") || lower.contains("connection") {
            Self::Network(text)
        } else {
            Self::Upstream(text)
        }
    }

    /// Whether the failure looks like the post needs an authenticated
    /// session. Used to decide on a single retry with cookies.
    pub fn hints_at_restriction(&self) -> bool {
        let lower = self.to_string().to_lowercase();
        RESTRICTION_NEEDLES
            .iter()
            .any(|needle| lower.contains(needle))
    }

    /// Long, user-facing explanation returned by `/video/fetch`.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl(_) => {
                "Please provide a valid Twitter/X URL (e.g., https://x.com/user/status/123...)".to_owned()
            }
            Self::NotFound(_) => {
                "Tweet not found. The tweet may have been deleted, the account is private, or the tweet doesn't contain a video.".to_owned()
            }
            Self::Forbidden(_) => {
                "Access forbidden. Cannot access private accounts or restricted content. Try uploading cookies.".to_owned()
            }
            Self::RateLimited(_) => {
                "Rate limit exceeded. Please wait a few minutes before trying again.".to_owned()
            }
            Self::Unauthorized(_) => {
                "Unauthorized access. Upload cookies to access private/restricted content.".to_owned()
            }
            Self::Unsupported(_) => {
                "This Twitter/X URL is not supported. Please make sure the tweet contains a video.".to_owned()
            }
            Self::Unavailable(_) => {
                "Video is unavailable. It might be private, deleted, or from a protected account.".to_owned()
            }
            Self::Unextractable(_) | Self::MissingDownloadUrl => {
                "Unable to extract video. The tweet might not contain a video or might be restricted.".to_owned()
            }
            Self::Network(_) => {
                "Network connection error. Please check your internet connection and try again.".to_owned()
            }
            other => other.to_string(),
        }
    }

    /// Terse hint used by the browser-facing `/test` endpoint.
    pub fn short_hint(&self) -> String {
        match self {
            Self::InvalidUrl(_) => "Invalid Twitter/X URL".to_owned(),
            Self::NotFound(_) => "Tweet not found or deleted".to_owned(),
            Self::Forbidden(_) => "Access forbidden - need authentication cookies".to_owned(),
            Self::Unauthorized(_) => "Unauthorized - upload cookies for private content".to_owned(),
            Self::Unextractable(_) | Self::MissingDownloadUrl => {
                "Could not extract video from this URL".to_owned()
            }
            other => other.to_string(),
        }
    }
}
