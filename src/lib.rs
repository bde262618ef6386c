pub mod config;
pub mod data_api;
pub mod fallback;
pub mod output;
pub mod review;
pub mod web;
pub mod youtube;
pub mod ytdlp;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// A single captioned segment
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Where a transcript came from, in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptSource {
    CaptionApi,
    YtDlp,
    DataApi,
}

impl TranscriptSource {
    /// Fixed priority order of the fallback chain
    pub const CHAIN: [TranscriptSource; 3] = [
        TranscriptSource::CaptionApi,
        TranscriptSource::YtDlp,
        TranscriptSource::DataApi,
    ];
}

/// Complete transcript for a video
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub language: String,
    pub source: TranscriptSource,
    pub segments: Vec<Segment>,
}

impl Transcript {
    /// Caption fragments joined into a single display string, in timecode order
    pub fn text(&self) -> String {
        join_fragments(self.segments.iter().map(|s| s.text.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptSource::CaptionApi => write!(f, "caption-api"),
            TranscriptSource::YtDlp => write!(f, "yt-dlp"),
            TranscriptSource::DataApi => write!(f, "data-api"),
        }
    }
}

/// Join caption fragments with single spaces, skipping blank ones.
/// Line breaks inside a fragment collapse to spaces.
pub fn join_fragments<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    fragments
        .into_iter()
        .map(|f| f.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a track's language code satisfies a preferred language ("ko" matches "ko" and "ko-KR")
pub fn language_matches(code: &str, preferred: &str) -> bool {
    let code = code.to_ascii_lowercase();
    let preferred = preferred.to_ascii_lowercase();
    code == preferred || code.strip_prefix(&preferred).is_some_and(|rest| rest.starts_with('-'))
}

static VIDEO_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Bare 11-character video ID
        r"^([a-zA-Z0-9_-]{11})$",
        // youtube.com/watch?v=ID, v may appear after other params
        r"^(?:https?://)?(?:www\.|m\.)?youtube\.com/watch\?(?:[^#]*&)?v=([a-zA-Z0-9_-]{11})(?:[&#]|$)",
        // youtu.be/ID
        r"^(?:https?://)?youtu\.be/([a-zA-Z0-9_-]{11})(?:[?&#/]|$)",
        // youtube.com/embed/ID
        r"^(?:https?://)?(?:www\.)?youtube(?:-nocookie)?\.com/embed/([a-zA-Z0-9_-]{11})(?:[?&#/]|$)",
        // youtube.com/shorts/ID, youtube.com/live/ID
        r"^(?:https?://)?(?:www\.|m\.)?youtube\.com/(?:shorts|live)/([a-zA-Z0-9_-]{11})(?:[?&#/]|$)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("video id pattern"))
    .collect()
});

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(input))
        .map(|caps| caps[1].to_string())
}
