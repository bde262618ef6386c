use std::path::PathBuf;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::review::ReviewLength;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8501";
pub const DEFAULT_MAX_TRANSCRIPT_CHARS: usize = 12_000;
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Per-million-token prices used for the cost estimate
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// On-disk configuration; every field is optional
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub langs: Option<Vec<String>>,
    pub model: Option<String>,
    pub length: Option<ReviewLength>,
    pub listen: Option<String>,
    pub youtube_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub max_transcript_chars: Option<usize>,
    pub pricing: Option<Pricing>,
}

impl Config {
    /// Load config from ~/.config/ytreview/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytreview")
        .join("config.toml")
}

/// Command-line values that take priority over the config file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub langs: Vec<String>,
    pub model: Option<String>,
    pub length: Option<ReviewLength>,
    pub listen: Option<String>,
}

/// Resolved runtime settings shared by the CLI and the web server
#[derive(Debug, Clone)]
pub struct Settings {
    pub langs: Vec<String>,
    pub model: String,
    pub length: ReviewLength,
    pub listen: String,
    pub youtube_api_key: Option<String>,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub max_transcript_chars: usize,
    pub pricing: Option<Pricing>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            langs: default_langs(),
            model: DEFAULT_MODEL.to_string(),
            length: ReviewLength::default(),
            listen: DEFAULT_LISTEN.to_string(),
            youtube_api_key: None,
            openai_base_url: OPENAI_BASE_URL.to_string(),
            anthropic_base_url: ANTHROPIC_BASE_URL.to_string(),
            max_transcript_chars: DEFAULT_MAX_TRANSCRIPT_CHARS,
            pricing: None,
        }
    }
}

fn default_langs() -> Vec<String> {
    vec!["ko".to_string(), "en".to_string()]
}

impl Settings {
    /// CLI flags beat the config file, the config file beats defaults.
    /// `env_youtube_key` is the YOUTUBE_API_KEY environment value, which beats the config file.
    pub fn resolve(config: Config, overrides: Overrides, env_youtube_key: Option<String>) -> Self {
        let defaults = Settings::default();
        let langs = if !overrides.langs.is_empty() {
            overrides.langs
        } else {
            config.langs.filter(|l| !l.is_empty()).unwrap_or(defaults.langs)
        };

        Self {
            langs,
            model: overrides.model.or(config.model).unwrap_or(defaults.model),
            length: overrides.length.or(config.length).unwrap_or(defaults.length),
            listen: overrides.listen.or(config.listen).unwrap_or(defaults.listen),
            youtube_api_key: env_youtube_key
                .filter(|k| !k.trim().is_empty())
                .or(config.youtube_api_key)
                .filter(|k| !k.trim().is_empty()),
            openai_base_url: config.openai_base_url.unwrap_or(defaults.openai_base_url),
            anthropic_base_url: config.anthropic_base_url.unwrap_or(defaults.anthropic_base_url),
            max_transcript_chars: config
                .max_transcript_chars
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_transcript_chars),
            pricing: config.pricing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
langs = ["ja", "en"]
model = "claude-sonnet-4-6"
length = "long"
listen = "0.0.0.0:9000"
max_transcript_chars = 5000

[pricing]
input_per_million = 0.15
output_per_million = 0.6
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.langs, Some(vec!["ja".to_string(), "en".to_string()]));
        assert_eq!(config.model.as_deref(), Some("claude-sonnet-4-6"));
        assert_eq!(config.length, Some(ReviewLength::Long));
        assert_eq!(config.listen.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(config.max_transcript_chars, Some(5000));
        assert_eq!(
            config.pricing,
            Some(Pricing {
                input_per_million: 0.15,
                output_per_million: 0.6
            })
        );
    }

    #[test]
    fn test_parse_empty_config() {
        let toml_str = "";
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.langs.is_none());
        assert!(config.model.is_none());
        assert!(config.pricing.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"model = "gpt-4o""#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert!(config.length.is_none());
    }

    #[test]
    fn test_resolve_defaults() {
        let settings = Settings::resolve(Config::default(), Overrides::default(), None);
        assert_eq!(settings.langs, vec!["ko", "en"]);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.length, ReviewLength::Medium);
        assert_eq!(settings.listen, DEFAULT_LISTEN);
        assert_eq!(settings.max_transcript_chars, DEFAULT_MAX_TRANSCRIPT_CHARS);
        assert!(settings.youtube_api_key.is_none());
    }

    #[test]
    fn test_resolve_precedence() {
        let config = Config {
            langs: Some(vec!["ja".to_string()]),
            model: Some("gpt-4o".to_string()),
            length: Some(ReviewLength::Short),
            youtube_api_key: Some("from-config".to_string()),
            ..Config::default()
        };
        let overrides = Overrides {
            model: Some("claude-sonnet-4-6".to_string()),
            ..Overrides::default()
        };
        let settings = Settings::resolve(config, overrides, Some("from-env".to_string()));
        assert_eq!(settings.langs, vec!["ja"]);
        assert_eq!(settings.model, "claude-sonnet-4-6");
        assert_eq!(settings.length, ReviewLength::Short);
        assert_eq!(settings.youtube_api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_resolve_ignores_blank_api_key() {
        let settings = Settings::resolve(Config::default(), Overrides::default(), Some("  ".to_string()));
        assert!(settings.youtube_api_key.is_none());
    }
}
