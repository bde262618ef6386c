use eyre::{Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{Pricing, Settings};

const SYSTEM_PROMPT: &str = "You are a skilled marketing copywriter who writes short promotional reviews of YouTube videos. \
Base every claim on the transcript you are given, keep an enthusiastic but honest tone, and weave the requested keywords in naturally. \
Reply with the review text only, without headings or preamble.";

const ANTHROPIC_MAX_TOKENS: u32 = 2048;

/// Target review length selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReviewLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ReviewLength {
    /// Target size of the review in characters
    pub fn target_chars(self) -> usize {
        match self {
            ReviewLength::Short => 300,
            ReviewLength::Medium => 500,
            ReviewLength::Long => 1000,
        }
    }
}

/// Token counts reported by the model API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Estimated cost in USD
    pub fn estimated_cost(&self, pricing: &Pricing) -> f64 {
        (self.prompt_tokens as f64 * pricing.input_per_million + self.completion_tokens as f64 * pricing.output_per_million)
            / 1_000_000.0
    }
}

/// A generated review, text returned verbatim from the model
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub text: String,
    pub model: String,
    pub length: ReviewLength,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy)]
pub struct ReviewRequest<'a> {
    pub title: &'a str,
    pub transcript: &'a str,
    pub keywords: &'a [String],
    pub length: ReviewLength,
}

/// Split user keyword input on commas (ASCII or full-width) and newlines,
/// dropping blanks and repeats while keeping order
pub fn parse_keywords(input: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for kw in input.split([',', '，', '、', '\n']) {
        let kw = kw.trim();
        if !kw.is_empty() && !keywords.iter().any(|k| k == kw) {
            keywords.push(kw.to_string());
        }
    }
    keywords
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Render the user prompt for a review request
pub fn build_prompt(req: &ReviewRequest<'_>, max_transcript_chars: usize) -> String {
    let transcript = req.transcript.trim();
    let clipped = truncate_chars(transcript, max_transcript_chars);
    if clipped.len() < transcript.len() {
        debug!(
            "Transcript truncated to {max_transcript_chars} characters for the prompt"
        );
    }

    let title = if req.title.trim().is_empty() {
        "(untitled)"
    } else {
        req.title.trim()
    };

    format!(
        "Write a promotional review of about {chars} characters for the video \"{title}\".\n\
         Include every one of these keywords: {keywords}.\n\
         Write in the same language as the transcript.\n\n\
         Transcript:\n{clipped}",
        chars = req.length.target_chars(),
        keywords = req.keywords.join(", "),
    )
}

fn is_anthropic_model(model: &str) -> bool {
    model.starts_with("claude")
}

/// Name of the environment variable holding the key for `model`
pub fn api_key_var(model: &str) -> &'static str {
    if is_anthropic_model(model) {
        "ANTHROPIC_API_KEY"
    } else {
        "OPENAI_API_KEY"
    }
}

/// The API key for `model`, or an error naming the missing variable
pub fn require_api_key(model: &str) -> Result<String> {
    let var = api_key_var(model);
    std::env::var(var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| eyre::eyre!("{var} environment variable not set (required for model {model})"))
}

/// Generate a review with the configured model
pub async fn generate(client: &reqwest::Client, settings: &Settings, req: &ReviewRequest<'_>) -> Result<Review> {
    if req.transcript.trim().is_empty() {
        bail!("transcript is empty; fetch captions first");
    }
    if req.keywords.is_empty() {
        bail!("at least one keyword is required");
    }

    let model = settings.model.as_str();
    let api_key = require_api_key(model)?;
    let prompt = build_prompt(req, settings.max_transcript_chars);

    let (text, usage) = if is_anthropic_model(model) {
        generate_anthropic(client, &settings.anthropic_base_url, &api_key, model, &prompt).await?
    } else {
        generate_openai(client, &settings.openai_base_url, &api_key, model, &prompt).await?
    };

    debug!(
        "Review generated: {} chars, {} prompt + {} completion tokens",
        text.chars().count(),
        usage.prompt_tokens,
        usage.completion_tokens
    );

    Ok(Review {
        text,
        model: model.to_string(),
        length: req.length,
        usage,
    })
}

async fn generate_anthropic(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<(String, Usage)> {
    debug!("Generating review via Anthropic API with model {model}");

    let body = serde_json::json!({
        "model": model,
        "max_tokens": ANTHROPIC_MAX_TOKENS,
        "system": SYSTEM_PROMPT,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ]
    });

    let resp = client
        .post(format!("{}/v1/messages", base_url.trim_end_matches('/')))
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("Anthropic API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    extract_anthropic(&json)
}

fn extract_anthropic(json: &serde_json::Value) -> Result<(String, Usage)> {
    let text = json
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|block| block.get("text")?.as_str())
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.is_empty() {
        bail!("unexpected Anthropic API response format");
    }

    let usage = json.get("usage");
    let count = |field: &str| usage.and_then(|u| u.get(field)).and_then(|v| v.as_u64()).unwrap_or(0);
    Ok((text, Usage::new(count("input_tokens"), count("output_tokens"))))
}

async fn generate_openai(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<(String, Usage)> {
    debug!("Generating review via OpenAI API with model {model}");

    let body = serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "system",
                "content": SYSTEM_PROMPT
            },
            {
                "role": "user",
                "content": prompt
            }
        ]
    });

    let resp = client
        .post(format!("{}/v1/chat/completions", base_url.trim_end_matches('/')))
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("OpenAI API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    extract_openai(&json)
}

fn extract_openai(json: &serde_json::Value) -> Result<(String, Usage)> {
    let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    else {
        bail!("unexpected OpenAI API response format");
    };

    let usage = json.get("usage");
    let count = |field: &str| usage.and_then(|u| u.get(field)).and_then(|v| v.as_u64()).unwrap_or(0);
    let mut usage = Usage::new(count("prompt_tokens"), count("completion_tokens"));
    if let Some(total) = json.get("usage").and_then(|u| u.get("total_tokens")).and_then(|v| v.as_u64()) {
        usage.total_tokens = total;
    }
    Ok((text.to_string(), usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_length_targets() {
        assert_eq!(ReviewLength::Short.target_chars(), 300);
        assert_eq!(ReviewLength::Medium.target_chars(), 500);
        assert_eq!(ReviewLength::Long.target_chars(), 1000);
        assert_eq!(ReviewLength::default(), ReviewLength::Medium);
    }

    #[test]
    fn test_length_serde() {
        let len: ReviewLength = serde_json::from_str("\"long\"").unwrap();
        assert_eq!(len, ReviewLength::Long);
        assert_eq!(serde_json::to_string(&ReviewLength::Short).unwrap(), "\"short\"");
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            parse_keywords("가성비, 디자인 ,가성비，배터리\n  "),
            keywords(&["가성비", "디자인", "배터리"])
        );
        assert!(parse_keywords(" , ,\n").is_empty());
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("안녕하세요", 2), "안녕");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_build_prompt() {
        let kws = keywords(&["가성비", "디자인"]);
        let req = ReviewRequest {
            title: "신제품 리뷰",
            transcript: "  오늘은 새 노트북을 소개합니다  ",
            keywords: &kws,
            length: ReviewLength::Short,
        };
        let prompt = build_prompt(&req, 100);
        assert!(prompt.contains("about 300 characters"));
        assert!(prompt.contains("\"신제품 리뷰\""));
        assert!(prompt.contains("가성비, 디자인"));
        assert!(prompt.ends_with("Transcript:\n오늘은 새 노트북을 소개합니다"));
    }

    #[test]
    fn test_build_prompt_truncates_transcript() {
        let kws = keywords(&["k"]);
        let req = ReviewRequest {
            title: "",
            transcript: "abcdefghij",
            keywords: &kws,
            length: ReviewLength::Medium,
        };
        let prompt = build_prompt(&req, 4);
        assert!(prompt.contains("(untitled)"));
        assert!(prompt.ends_with("Transcript:\nabcd"));
    }

    #[test]
    fn test_api_key_var() {
        assert_eq!(api_key_var("claude-sonnet-4-6"), "ANTHROPIC_API_KEY");
        assert_eq!(api_key_var("gpt-4o-mini"), "OPENAI_API_KEY");
    }

    #[test]
    fn test_is_anthropic_model() {
        assert!(is_anthropic_model("claude-sonnet-4-6"));
        assert!(is_anthropic_model("claude-3-opus-20240229"));
        assert!(!is_anthropic_model("gpt-4o"));
        assert!(!is_anthropic_model("gpt-4o-mini"));
    }

    #[test]
    fn test_extract_anthropic() {
        let json = serde_json::json!({
            "content": [
                {"type": "text", "text": "멋진 영상입니다. "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "추천합니다."}
            ],
            "usage": {"input_tokens": 1200, "output_tokens": 300}
        });
        let (text, usage) = extract_anthropic(&json).unwrap();
        assert_eq!(text, "멋진 영상입니다. 추천합니다.");
        assert_eq!(usage, Usage::new(1200, 300));
        assert_eq!(usage.total_tokens, 1500);
    }

    #[test]
    fn test_extract_anthropic_empty() {
        let json = serde_json::json!({"content": []});
        assert!(extract_anthropic(&json).is_err());
    }

    #[test]
    fn test_extract_openai() {
        let json = serde_json::json!({
            "choices": [
                {
                    "message": {
                        "role": "assistant",
                        "content": "Review of the video."
                    }
                }
            ],
            "usage": {"prompt_tokens": 900, "completion_tokens": 150, "total_tokens": 1050}
        });
        let (text, usage) = extract_openai(&json).unwrap();
        assert_eq!(text, "Review of the video.");
        assert_eq!(usage.prompt_tokens, 900);
        assert_eq!(usage.completion_tokens, 150);
        assert_eq!(usage.total_tokens, 1050);
    }

    #[test]
    fn test_extract_openai_without_usage() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        });
        let (_, usage) = extract_openai(&json).unwrap();
        assert_eq!(usage, Usage::default());
    }

    #[test]
    fn test_extract_openai_empty() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_openai(&json).is_err());
    }

    #[test]
    fn test_estimated_cost() {
        let usage = Usage::new(1_000_000, 500_000);
        let pricing = Pricing {
            input_per_million: 0.15,
            output_per_million: 0.6,
        };
        assert!((usage.estimated_cost(&pricing) - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = Usage::new(u64::MAX, 5);
        assert_eq!(usage.total_tokens, u64::MAX);
        assert_eq!(Usage::new(7, 3).total_tokens, 10);
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_input() {
        let client = reqwest::Client::new();
        let settings = Settings::default();
        let kws = keywords(&["k"]);

        let req = ReviewRequest {
            title: "t",
            transcript: "   ",
            keywords: &kws,
            length: ReviewLength::Short,
        };
        let err = generate(&client, &settings, &req).await.unwrap_err();
        assert!(err.to_string().contains("transcript is empty"));

        let req = ReviewRequest {
            transcript: "text",
            keywords: &[],
            ..req
        };
        let err = generate(&client, &settings, &req).await.unwrap_err();
        assert!(err.to_string().contains("keyword"));
    }
}
