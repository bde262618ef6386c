use std::collections::BTreeMap;
use std::sync::LazyLock;

use eyre::{Result, bail, eyre};
use log::debug;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::youtube::{USER_AGENT, parse_caption_xml};
use crate::{Segment, Transcript, TranscriptSource, language_matches};

/// Subtitle formats we can parse, best first
const FORMAT_PREFERENCE: [&str; 3] = ["json3", "srv1", "vtt"];

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: String,
    description: Option<String>,
    subtitles: Option<BTreeMap<String, Vec<SubtitleFormat>>>,
    automatic_captions: Option<BTreeMap<String, Vec<SubtitleFormat>>>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubtitleFormat {
    ext: String,
    url: String,
}

/// A chosen subtitle track: language, whether auto-generated, and its best format
#[derive(Debug)]
struct SubtitleChoice<'a> {
    language: &'a str,
    generated: bool,
    format: &'a SubtitleFormat,
}

/// Title and description of a video as reported by yt-dlp
pub async fn video_info(video_id: &str) -> Result<(String, String)> {
    let info = dump_json(video_id).await?;
    Ok((info.title, info.description.unwrap_or_default()))
}

/// Fetch a transcript from the subtitle tracks yt-dlp reports for a video
pub async fn fetch_captions(client: &reqwest::Client, video_id: &str, langs: &[String]) -> Result<Transcript> {
    let info = dump_json(video_id).await?;
    let choice = pick_subtitle(&info, langs).ok_or_else(|| eyre!("yt-dlp found no usable subtitles for video {video_id}"))?;
    debug!(
        "yt-dlp subtitle track: lang={} generated={} ext={}",
        choice.language, choice.generated, choice.format.ext
    );

    let body = client
        .get(&choice.format.url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let segments = match choice.format.ext.as_str() {
        "json3" => parse_json3(&body)?,
        "srv1" => parse_caption_xml(&body)?,
        _ => parse_vtt(&body),
    };

    Ok(Transcript {
        video_id: video_id.to_string(),
        title: info.title.clone(),
        description: info.description.clone().unwrap_or_default(),
        language: choice.language.to_string(),
        source: TranscriptSource::YtDlp,
        segments,
    })
}

async fn dump_json(video_id: &str) -> Result<VideoInfo> {
    let url = format!("https://www.youtube.com/watch?v={video_id}");
    debug!("Reading metadata via yt-dlp: {url}");

    let output = Command::new("yt-dlp")
        .args(["--dump-json", "--skip-download", "--no-playlist", "--no-warnings", &url])
        .output()
        .await;

    let output = match output {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!(
                "yt-dlp not found. Install it to enable the yt-dlp caption fallback:\n  \
                 pip install yt-dlp\n  \
                 or: brew install yt-dlp"
            );
        }
        Err(e) => bail!("failed to run yt-dlp: {e}"),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("yt-dlp exited with status {}: {}", output.status, stderr.trim());
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Per preferred language: uploaded subtitles, then automatic captions.
/// Falls back to any uploaded subtitle track.
fn pick_subtitle<'a>(info: &'a VideoInfo, langs: &[String]) -> Option<SubtitleChoice<'a>> {
    let manual = info.subtitles.as_ref();
    let auto = info.automatic_captions.as_ref();

    for lang in langs {
        for (tracks, generated) in [(manual, false), (auto, true)] {
            let Some(tracks) = tracks else { continue };
            let found = tracks
                .iter()
                .filter(|(code, _)| language_matches(code, lang))
                .find_map(|(code, formats)| best_format(formats).map(|f| (code, f)));
            if let Some((code, format)) = found {
                return Some(SubtitleChoice {
                    language: code,
                    generated,
                    format,
                });
            }
        }
    }

    manual?
        .iter()
        .filter(|(code, _)| code.as_str() != "live_chat")
        .find_map(|(code, formats)| {
            best_format(formats).map(|format| SubtitleChoice {
                language: code,
                generated: false,
                format,
            })
        })
}

fn best_format(formats: &[SubtitleFormat]) -> Option<&SubtitleFormat> {
    FORMAT_PREFERENCE
        .iter()
        .find_map(|ext| formats.iter().find(|f| f.ext == *ext))
}

#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

fn parse_json3(body: &str) -> Result<Vec<Segment>> {
    let doc: Json3 = serde_json::from_str(body)?;
    Ok(doc
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs?.into_iter().map(|s| s.utf8).collect();
            let text = text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(Segment {
                text,
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
            })
        })
        .collect())
}

static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d{2}:)?\d{2}:\d{2}\.\d{3}) --> ((?:\d{2}:)?\d{2}:\d{2}\.\d{3})").expect("cue timing pattern")
});
static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("inline tag pattern"));

fn parse_timestamp(ts: &str) -> f64 {
    ts.split(':')
        .map(|part| part.parse::<f64>().unwrap_or(0.0))
        .fold(0.0, |acc, part| acc * 60.0 + part)
}

/// Parse WebVTT cues. Auto-generated tracks repeat the previous line in each
/// rolling cue, so a line equal to the last emitted one is dropped.
fn parse_vtt(body: &str) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut cue: Option<(f64, f64)> = None;

    for line in body.lines() {
        // Only a truly empty line ends a cue; rolling auto-captions carry " " lines
        if line.trim_end_matches('\r').is_empty() {
            cue = None;
            continue;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = CUE_TIMING.captures(line) {
            let start = parse_timestamp(&caps[1]);
            let end = parse_timestamp(&caps[2]);
            cue = Some((start, (end - start).max(0.0)));
            continue;
        }
        let Some((start, duration)) = cue else {
            // header, NOTE blocks and cue identifiers
            continue;
        };

        let stripped = INLINE_TAG.replace_all(line, "").replace("&nbsp;", " ");
        let text = html_escape::decode_html_entities(&stripped).trim().to_string();
        if text.is_empty() || segments.last().is_some_and(|s| s.text == text) {
            continue;
        }
        segments.push(Segment { text, start, duration });
    }

    segments
}
