//! Quality selection over the format list reported by the extractor.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Container the service hands out download URLs for.
pub const TARGET_CONTAINER: &str = "mp4";

/// Number of ranked formats surfaced as alternatives.
pub const MAX_ALTERNATIVES: usize = 5;

/// One downloadable encoding as described by yt-dlp's `formats` array.
/// Everything is optional because older posts and HLS variants routinely
/// omit fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatDescriptor {
    pub format_id: Option<String>,
    pub format_note: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// Total bitrate in kbit/s.
    pub tbr: Option<f64>,
    /// Video bitrate in kbit/s.
    pub vbr: Option<f64>,
    pub fps: Option<f64>,
    pub filesize: Option<i64>,
    pub filesize_approx: Option<i64>,
    pub url: Option<String>,
}

impl FormatDescriptor {
    /// Audio-only entries carry the literal codec `none`. A missing codec is
    /// not treated as audio-only.
    fn has_video(&self) -> bool {
        !self
            .vcodec
            .as_deref()
            .is_some_and(|codec| codec.eq_ignore_ascii_case("none"))
    }

    fn sort_key(&self) -> [f64; 4] {
        [
            self.height.unwrap_or(0) as f64,
            self.tbr.unwrap_or(0.0),
            self.vbr.unwrap_or(0.0),
            self.fps.unwrap_or(0.0),
        ]
    }
}

/// Entry of the `available_qualities` list in API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOption {
    pub quality: String,
    pub bitrate: String,
    pub filesize: Option<i64>,
    pub url: String,
}

/// Qualifying formats ordered best first.
#[derive(Debug, Clone)]
pub struct Ranking {
    ranked: Vec<FormatDescriptor>,
}

impl Ranking {
    pub fn best(&self) -> &FormatDescriptor {
        // Construction guarantees at least one element.
        &self.ranked[0]
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.ranked.iter()
    }

    /// Summaries of the top `limit` formats, the best one included.
    pub fn alternatives(&self, limit: usize) -> Vec<QualityOption> {
        self.ranked
            .iter()
            .take(limit)
            .map(|format| QualityOption {
                quality: height_label(format.height),
                bitrate: bitrate_label(format.tbr),
                filesize: format.filesize,
                url: format.url.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// Keeps the formats in `container` that carry video and sorts them by
/// `(height, tbr, vbr, fps)` descending, missing values counting as zero.
/// The relative order of formats with identical keys is unspecified.
pub fn rank_formats(formats: &[FormatDescriptor], container: &str) -> Result<Ranking, FetchError> {
    if formats.is_empty() {
        return Err(FetchError::NoFormats);
    }

    let mut ranked: Vec<FormatDescriptor> = formats
        .iter()
        .filter(|format| format.ext.as_deref() == Some(container) && format.has_video())
        .cloned()
        .collect();

    if ranked.is_empty() {
        return Err(FetchError::NoMatchingFormats(container.to_uppercase()));
    }

    ranked.sort_by(|a, b| compare_keys(&b.sort_key(), &a.sort_key()));
    Ok(Ranking { ranked })
}

fn compare_keys(left: &[f64; 4], right: &[f64; 4]) -> Ordering {
    left.iter()
        .zip(right.iter())
        .map(|(l, r)| l.total_cmp(r))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// `1080p`, or `Unknown` when the height is missing or zero.
pub fn height_label(height: Option<i64>) -> String {
    match height {
        Some(h) if h > 0 => format!("{h}p"),
        _ => "Unknown".to_owned(),
    }
}

fn bitrate_label(tbr: Option<f64>) -> String {
    match tbr {
        Some(rate) if rate > 0.0 => format!("{}kbps", rate.round() as i64),
        _ => "Unknown".to_owned(),
    }
}
