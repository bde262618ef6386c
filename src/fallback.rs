use std::future::Future;

use eyre::{Result, bail};
use log::{debug, info, warn};

use crate::config::Settings;
use crate::{Transcript, TranscriptSource, data_api, youtube, ytdlp};

/// Try each source in order and return the first non-empty transcript.
///
/// A source that errors or yields only blank captions hands over to the next
/// one. Nothing is retried; once every source has failed the error lists each
/// source's reason.
pub async fn first_available<F, Fut>(video_id: &str, sources: &[TranscriptSource], mut fetch: F) -> Result<Transcript>
where
    F: FnMut(TranscriptSource) -> Fut,
    Fut: Future<Output = Result<Transcript>>,
{
    let mut failures = Vec::with_capacity(sources.len());

    for &source in sources {
        debug!("Trying {source} for {video_id}");
        match fetch(source).await {
            Ok(transcript) if !transcript.is_empty() => {
                info!(
                    "Transcript for {video_id} from {source} ({}, {} segments)",
                    transcript.language,
                    transcript.segments.len()
                );
                return Ok(transcript);
            }
            Ok(_) => {
                warn!("{source} returned an empty transcript for {video_id}");
                failures.push(format!("{source}: empty transcript"));
            }
            Err(e) => {
                warn!("{source} failed for {video_id}: {e}");
                failures.push(format!("{source}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        bail!("no transcript sources configured for video {video_id}");
    }
    bail!(
        "all transcript sources exhausted for video {video_id}:\n  {}",
        failures.join("\n  ")
    );
}

/// Fetch a transcript through the full chain: caption API, yt-dlp, Data API
pub async fn fetch_transcript(client: &reqwest::Client, settings: &Settings, video_id: &str) -> Result<Transcript> {
    let langs = settings.langs.as_slice();
    let api_key = settings.youtube_api_key.as_deref();

    let mut transcript = first_available(video_id, &TranscriptSource::CHAIN, |source| async move {
        match source {
            TranscriptSource::CaptionApi => youtube::fetch_captions(client, video_id, langs).await,
            TranscriptSource::YtDlp => ytdlp::fetch_captions(client, video_id, langs).await,
            TranscriptSource::DataApi => data_api::fetch_captions(client, api_key, video_id, langs).await,
        }
    })
    .await?;

    // The title names downloads and goes into the prompt
    if transcript.title.is_empty() {
        match ytdlp::video_info(video_id).await {
            Ok((title, description)) => {
                transcript.title = title;
                if transcript.description.is_empty() {
                    transcript.description = description;
                }
            }
            Err(e) => debug!("No title for {video_id}: {e}"),
        }
    }

    Ok(transcript)
}
