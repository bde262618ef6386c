use eyre::{Result, bail, eyre};
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::youtube::{USER_AGENT, parse_caption_xml};
use crate::{Transcript, TranscriptSource, language_matches};

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    items: Option<Vec<T>>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: u16,
    message: String,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct CaptionItem {
    snippet: CaptionSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionSnippet {
    language: String,
    /// "standard", "asr" or "forced"
    #[serde(default)]
    track_kind: String,
}

/// Fetch a transcript using the YouTube Data API v3 for metadata and track
/// listing. The caption body comes from the public timedtext endpoint since
/// `captions.download` needs OAuth for videos we do not own.
pub async fn fetch_captions(
    client: &reqwest::Client,
    api_key: Option<&str>,
    video_id: &str,
    langs: &[String],
) -> Result<Transcript> {
    let api_key = api_key.ok_or_else(|| eyre!("no YouTube Data API key configured (set YOUTUBE_API_KEY)"))?;

    let video = list::<VideoItem>(client, "videos", &[("key", api_key), ("id", video_id), ("part", "snippet")])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("YouTube Data API has no video {video_id}"))?;

    let tracks: Vec<CaptionSnippet> = list::<CaptionItem>(
        client,
        "captions",
        &[("key", api_key), ("videoId", video_id), ("part", "snippet")],
    )
    .await?
    .into_iter()
    .map(|c| c.snippet)
    .collect();

    let track = pick_track(&tracks, langs).ok_or_else(|| eyre!("YouTube Data API lists no caption tracks for {video_id}"))?;
    debug!(
        "Data API caption track: lang={} kind={}",
        track.language, track.track_kind
    );

    let mut query = vec![("v", video_id), ("lang", track.language.as_str())];
    if track.track_kind == "asr" {
        query.push(("kind", "asr"));
    }

    let xml = client
        .get(TIMEDTEXT_URL)
        .header("User-Agent", USER_AGENT)
        .query(&query)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    if xml.trim().is_empty() {
        bail!("timedtext returned no captions for {video_id} ({})", track.language);
    }

    Ok(Transcript {
        video_id: video_id.to_string(),
        title: video.snippet.title,
        description: video.snippet.description,
        language: track.language.clone(),
        source: TranscriptSource::DataApi,
        segments: parse_caption_xml(&xml)?,
    })
}

async fn list<T: DeserializeOwned>(client: &reqwest::Client, resource: &str, query: &[(&str, &str)]) -> Result<Vec<T>> {
    let body = client
        .get(format!("{YOUTUBE_API_BASE}/{resource}"))
        .query(query)
        .send()
        .await?
        .text()
        .await?;
    parse_list(resource, &body)
}

fn parse_list<T: DeserializeOwned>(resource: &str, body: &str) -> Result<Vec<T>> {
    let resp: ListResponse<T> =
        serde_json::from_str(body).map_err(|e| eyre!("failed to parse YouTube {resource}.list response: {e}"))?;
    if let Some(error) = resp.error {
        bail!("YouTube API error: {} ({})", error.message, error.code);
    }
    Ok(resp.items.unwrap_or_default())
}

/// Preferred language first; standard tracks before auto-generated ones
fn pick_track<'a>(tracks: &'a [CaptionSnippet], langs: &[String]) -> Option<&'a CaptionSnippet> {
    langs
        .iter()
        .find_map(|lang| {
            let matching: Vec<_> = tracks.iter().filter(|t| language_matches(&t.language, lang)).collect();
            matching
                .iter()
                .find(|t| t.track_kind != "asr")
                .or_else(|| matching.first())
                .copied()
        })
        .or_else(|| tracks.first())
}
