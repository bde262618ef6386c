use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use eyre::{Result, WrapErr};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::review::{self, ReviewLength, ReviewRequest, Usage};
use crate::{Segment, TranscriptSource, extract_video_id, fallback, output};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(client: reqwest::Client, settings: Settings) -> Self {
        Self {
            client,
            settings: Arc::new(settings),
        }
    }
}

/// Error shown inline by the page
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn upstream(err: eyre::Report) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("{} {}", self.status, self.message);
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// The form page and the JSON endpoints it calls.
///
/// No session state is kept: the page holds the fetched transcript and sends
/// it back with the review request.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/transcript", post(transcript))
        .route("/api/review", post(create_review))
        .route("/api/download", post(download))
        .with_state(state)
}

/// Serve the form until Ctrl+C
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.settings.listen.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("binding to {addr}"))?;
    info!("Listening on http://{addr}");
    println!("ytreview listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("running web server")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {e}");
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("GIT_DESCRIBE"),
    }))
}

#[derive(Debug, Deserialize)]
struct TranscriptBody {
    url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptResponse {
    video_id: String,
    title: String,
    description: String,
    language: String,
    source: TranscriptSource,
    segments: Vec<Segment>,
    transcript: String,
}

async fn transcript(
    State(state): State<AppState>,
    Json(body): Json<TranscriptBody>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::bad_request("enter a YouTube URL"));
    }
    let video_id = extract_video_id(&body.url)
        .ok_or_else(|| ApiError::bad_request(format!("not a valid YouTube URL: {}", body.url.trim())))?;

    let t = fallback::fetch_transcript(&state.client, &state.settings, &video_id)
        .await
        .map_err(ApiError::upstream)?;

    let text = t.text();
    Ok(Json(TranscriptResponse {
        video_id: t.video_id,
        title: t.title,
        description: t.description,
        language: t.language,
        source: t.source,
        segments: t.segments,
        transcript: text,
    }))
}

#[derive(Debug, Deserialize)]
struct ReviewBody {
    #[serde(default)]
    title: String,
    transcript: String,
    /// Comma or newline separated
    keywords: String,
    length: Option<ReviewLength>,
}

#[derive(Debug, Serialize)]
struct ReviewResponse {
    review: String,
    model: String,
    length: ReviewLength,
    target_chars: usize,
    usage: Usage,
    estimated_cost_usd: Option<f64>,
}

async fn create_review(
    State(state): State<AppState>,
    Json(body): Json<ReviewBody>,
) -> Result<Json<ReviewResponse>, ApiError> {
    if body.transcript.trim().is_empty() {
        return Err(ApiError::bad_request("fetch captions before generating a review"));
    }
    let keywords = review::parse_keywords(&body.keywords);
    if keywords.is_empty() {
        return Err(ApiError::bad_request("enter at least one keyword"));
    }

    let req = ReviewRequest {
        title: &body.title,
        transcript: &body.transcript,
        keywords: &keywords,
        length: body.length.unwrap_or(state.settings.length),
    };
    let generated = review::generate(&state.client, &state.settings, &req)
        .await
        .map_err(ApiError::upstream)?;

    Ok(Json(ReviewResponse {
        estimated_cost_usd: state.settings.pricing.map(|p| generated.usage.estimated_cost(&p)),
        target_chars: generated.length.target_chars(),
        review: generated.text,
        model: generated.model,
        length: generated.length,
        usage: generated.usage,
    }))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DownloadKind {
    #[default]
    Transcript,
    Review,
}

impl DownloadKind {
    fn as_str(self) -> &'static str {
        match self {
            DownloadKind::Transcript => "transcript",
            DownloadKind::Review => "review",
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    kind: DownloadKind,
    text: String,
}

/// `attachment` disposition with an ASCII fallback name and an RFC 5987 UTF-8 name
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

async fn download(Json(body): Json<DownloadBody>) -> Result<Response, ApiError> {
    if body.text.is_empty() {
        return Err(ApiError::bad_request("nothing to download yet"));
    }
    let filename = output::download_filename(&body.title, body.kind.as_str());
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&filename)),
        ],
        body.text,
    )
        .into_response())
}
