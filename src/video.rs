//! Turns extractor metadata plus a format ranking into the record returned by
//! the API and stored in the cache.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::FetchError;
use crate::extractor::VideoInfo;
use crate::formats::{MAX_ALTERNATIVES, QualityOption, TARGET_CONTAINER, height_label, rank_formats};

/// Media CDN URLs handed out by X stop working after roughly six hours.
pub const URL_LIFETIME: TimeDelta = TimeDelta::hours(6);

const MAX_FILENAME_STEM: usize = 100;
const ADULT_RATING: &str = "Adult (18+)";
const GENERAL_RATING: &str = "General Audience";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSummary {
    pub success: bool,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration: i64,
    pub duration_formatted: String,
    pub uploader: String,
    pub upload_date: String,
    pub upload_date_formatted: String,
    pub view_count: i64,
    pub like_count: i64,
    pub repost_count: i64,
    /// Direct URL of the best ranked format.
    pub download_url: String,
    pub filename: String,
    pub format: String,
    pub quality: String,
    pub file_size: Option<i64>,
    pub content_rating: String,
    /// Unix seconds after which `download_url` is expected to be dead.
    pub expires_at: i64,
    pub available_qualities: Vec<QualityOption>,
    pub total_formats_found: usize,
    pub mp4_formats_found: usize,
}

impl VideoSummary {
    /// Rating is a property of the request, not of the cached extraction, so
    /// cache hits get it rewritten.
    pub fn with_rating(mut self, adult: bool) -> Self {
        self.content_rating = content_rating(adult).to_owned();
        self
    }
}

pub fn content_rating(adult: bool) -> &'static str {
    if adult { ADULT_RATING } else { GENERAL_RATING }
}

/// Ranks `info.formats`, picks the best MP4 and flattens the metadata.
pub fn build_summary(
    info: &VideoInfo,
    adult: bool,
    now: DateTime<Utc>,
) -> Result<VideoSummary, FetchError> {
    let ranking = rank_formats(&info.formats, TARGET_CONTAINER)?;
    let best = ranking.best();

    let download_url = best
        .url
        .clone()
        .filter(|url| !url.is_empty())
        .ok_or(FetchError::MissingDownloadUrl)?;

    let title = info
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown Video".to_owned());
    let uploader = info
        .uploader
        .clone()
        .or_else(|| info.channel.clone())
        .unwrap_or_else(|| "Unknown".to_owned());
    let duration = info.duration.map(|secs| secs as i64).unwrap_or(0);
    let upload_date = info.upload_date.clone().unwrap_or_default();

    let quality = best
        .format_note
        .clone()
        .filter(|note| !note.is_empty() && note != "Unknown")
        .unwrap_or_else(|| height_label(best.height));

    Ok(VideoSummary {
        success: true,
        description: info.description.clone().unwrap_or_default(),
        thumbnail: info.thumbnail.clone().unwrap_or_default(),
        duration,
        duration_formatted: format_duration(duration),
        uploader,
        upload_date_formatted: format_upload_date(&upload_date),
        upload_date,
        view_count: info.view_count.unwrap_or(0),
        like_count: info.like_count.unwrap_or(0),
        repost_count: info.repost_count.unwrap_or(0),
        download_url,
        filename: clean_filename(&title, now),
        title,
        format: best.ext.clone().unwrap_or_else(|| TARGET_CONTAINER.to_owned()),
        quality,
        file_size: best.filesize.or(best.filesize_approx),
        content_rating: content_rating(adult).to_owned(),
        expires_at: (now + URL_LIFETIME).timestamp(),
        available_qualities: ranking.alternatives(MAX_ALTERNATIVES),
        total_formats_found: info.formats.len(),
        mp4_formats_found: ranking.len(),
    })
}

/// Renders durations as `H:MM:SS` or `M:SS`; zero means unknown.
pub fn format_duration(duration: i64) -> String {
    if duration <= 0 {
        return "Unknown".to_owned();
    }
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Converts yt-dlp's `YYYYMMDD` into `YYYY-MM-DD`.
pub fn format_upload_date(value: &str) -> String {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| "Unknown".to_owned())
}

/// Filesystem-safe ASCII name derived from the post title. Accented
/// letters are decomposed first so they keep their base letter.
pub fn clean_filename(title: &str, now: DateTime<Utc>) -> String {
    let stem: String = title
        .nfkd()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .take(MAX_FILENAME_STEM)
        .collect();
    let stem = stem.trim();

    if stem.is_empty() {
        format!("twitter_video_{}.mp4", now.timestamp())
    } else {
        format!("{stem}.mp4")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::formats::FormatDescriptor;

    pub(crate) fn sample_summary() -> VideoSummary {
        VideoSummary {
            success: true,
            title: "Sample".into(),
            description: String::new(),
            thumbnail: String::new(),
            duration: 12,
            duration_formatted: "0:12".into(),
            uploader: "alice".into(),
            upload_date: "20240101".into(),
            upload_date_formatted: "2024-01-01".into(),
            view_count: 0,
            like_count: 0,
            repost_count: 0,
            download_url: "https://video.twimg.com/sample.mp4".into(),
            filename: "Sample.mp4".into(),
            format: "mp4".into(),
            quality: "720p".into(),
            file_size: None,
            content_rating: GENERAL_RATING.into(),
            expires_at: 0,
            available_qualities: Vec::new(),
            total_formats_found: 1,
            mp4_formats_found: 1,
        }
    }

    pub(crate) fn sample_info() -> VideoInfo {
        VideoInfo {
            id: Some("1".into()),
            title: Some("Cats: a \"study\"".into()),
            description: Some("desc".into()),
            uploader: None,
            channel: Some("alice".into()),
            duration: Some(3725.4),
            upload_date: Some("20240131".into()),
            view_count: Some(10),
            like_count: Some(2),
            repost_count: None,
            thumbnail: Some("https://pbs.twimg.com/thumb.jpg".into()),
            formats: vec![
                FormatDescriptor {
                    format_id: Some("hls-audio".into()),
                    ext: Some("mp4".into()),
                    vcodec: Some("none".into()),
                    url: Some("https://video.twimg.com/audio.mp4".into()),
                    ..FormatDescriptor::default()
                },
                FormatDescriptor {
                    format_id: Some("http-832".into()),
                    ext: Some("mp4".into()),
                    vcodec: Some("avc1".into()),
                    height: Some(480),
                    tbr: Some(832.0),
                    url: Some("https://video.twimg.com/480.mp4".into()),
                    ..FormatDescriptor::default()
                },
                FormatDescriptor {
                    format_id: Some("http-2176".into()),
                    ext: Some("mp4".into()),
                    vcodec: Some("avc1".into()),
                    height: Some(720),
                    tbr: Some(2176.0),
                    filesize_approx: Some(4096),
                    url: Some("https://video.twimg.com/720.mp4".into()),
                    ..FormatDescriptor::default()
                },
            ],
        }
    }

    #[test]
    fn build_summary_picks_best_mp4() {
        let now = Utc::now();
        let summary = build_summary(&sample_info(), false, now).unwrap();
        assert_eq!(summary.download_url, "https://video.twimg.com/720.mp4");
        assert_eq!(summary.quality, "720p");
        assert_eq!(summary.file_size, Some(4096));
        assert_eq!(summary.uploader, "alice");
        assert_eq!(summary.duration, 3725);
        assert_eq!(summary.duration_formatted, "1:02:05");
        assert_eq!(summary.upload_date_formatted, "2024-01-31");
        assert_eq!(summary.total_formats_found, 3);
        assert_eq!(summary.mp4_formats_found, 2);
        assert_eq!(summary.available_qualities.len(), 2);
        assert_eq!(summary.content_rating, GENERAL_RATING);
        assert_eq!(summary.expires_at, (now + URL_LIFETIME).timestamp());
        assert_eq!(summary.filename, "Cats_ a _study_.mp4");
    }

    #[test]
    fn build_summary_requires_a_download_url() {
        let mut info = sample_info();
        for format in &mut info.formats {
            format.url = None;
        }
        let err = build_summary(&info, false, Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::MissingDownloadUrl));
    }

    #[test]
    fn format_note_wins_over_height_label() {
        let mut info = sample_info();
        info.formats[2].format_note = Some("HD".into());
        let summary = build_summary(&info, true, Utc::now()).unwrap();
        assert_eq!(summary.quality, "HD");
        assert_eq!(summary.content_rating, ADULT_RATING);
    }

    #[test]
    fn with_rating_rewrites_only_the_rating() {
        let summary = sample_summary().with_rating(true);
        assert_eq!(summary.content_rating, ADULT_RATING);
        assert_eq!(summary.title, "Sample");
    }

    #[test]
    fn duration_and_date_fallbacks() {
        assert_eq!(format_duration(0), "Unknown");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_upload_date(""), "Unknown");
        assert_eq!(format_upload_date("20241399"), "Unknown");
    }

    #[test]
    fn clean_filename_strips_non_ascii_and_falls_back() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(clean_filename("日本語", now), "twitter_video_1700000000.mp4");
        assert_eq!(clean_filename("a/b", now), "a_b.mp4");
        let long = "x".repeat(300);
        assert_eq!(clean_filename(&long, now).len(), MAX_FILENAME_STEM + 4);
    }

    #[test]
    fn clean_filename_keeps_base_letters_of_accented_titles() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(clean_filename("café", now), "cafe.mp4");
        assert_eq!(clean_filename("Ñandú: señal", now), "Nandu_ senal.mp4");
    }
}
