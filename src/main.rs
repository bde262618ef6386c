use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::Command as Process;

use eyre::{Result, bail, eyre};
use log::{debug, info};

mod cli;

use cli::{Cli, Command, OutputFormat};
use ytreview::config::{Config, Overrides, Settings};
use ytreview::review::{self, ReviewRequest};
use ytreview::{fallback, output, web};

const SUPPORTED_FORMATS: &str = "Supported formats:
  https://www.youtube.com/watch?v=ID
  https://youtu.be/ID
  https://www.youtube.com/embed/ID
  https://www.youtube.com/shorts/ID
  <11-character video ID>";

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytreview.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytreview")
        .join("logs")
}

fn tool_version(name: &str) -> Option<String> {
    Process::new(name)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn key_status(var: &str, purpose: &str) -> String {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => format!("  \x1b[32m✅\x1b[0m {var:<18} set"),
        _ => format!("  \x1b[31m❌\x1b[0m {var:<18} (not set, needed for {purpose})"),
    }
}

fn build_after_help() -> String {
    let yt_dlp_line = match tool_version("yt-dlp") {
        Some(v) => format!("  \x1b[32m✅\x1b[0m yt-dlp     {v}"),
        None => "  \x1b[31m❌\x1b[0m yt-dlp     (not found, needed for the yt-dlp caption fallback)".to_string(),
    };

    let keys = [
        key_status("OPENAI_API_KEY", "OpenAI models"),
        key_status("ANTHROPIC_API_KEY", "Claude models"),
        key_status("YOUTUBE_API_KEY", "the Data API caption fallback"),
    ]
    .join("\n");

    format!(
        "\nREQUIRED TOOLS:\n{yt_dlp_line}\n\nAPI KEYS:\n{keys}\n\nConfig is read from: {}\nLogs are written to: {}",
        ytreview::config::config_path().display(),
        log_dir().join("ytreview.log").display()
    )
}

fn video_id_of(url: &str) -> Result<String> {
    ytreview::extract_video_id(url).ok_or_else(|| eyre!("could not extract video ID from: {url}\n\n{SUPPORTED_FORMATS}"))
}

fn write_or_print(path: Option<&PathBuf>, rendered: &str, verbose: bool) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, rendered)?;
            if verbose {
                eprintln!("Output written to: {}", path.display());
            }
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Config file is non-fatal if missing/invalid
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring config file: {e}");
        Config::default()
    });

    let mut overrides = Overrides {
        langs: cli.langs.clone(),
        model: cli.model.clone(),
        ..Overrides::default()
    };
    match &cli.command {
        Command::Serve { listen } => overrides.listen = listen.clone(),
        Command::Review { length, .. } => overrides.length = *length,
        Command::Transcript { .. } => {}
    }

    let settings = Settings::resolve(config, overrides, std::env::var("YOUTUBE_API_KEY").ok());
    debug!("Settings: langs={:?} model={} length={:?}", settings.langs, settings.model, settings.length);
    if cli.verbose {
        let config_path = ytreview::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!("Caption languages: {}", settings.langs.join(", "));
    }

    let client = reqwest::Client::new();

    match cli.command {
        Command::Serve { .. } => {
            // Refuse to start without a key for the configured model
            review::require_api_key(&settings.model)?;
            web::serve(web::AppState::new(client, settings)).await?;
        }

        Command::Transcript {
            url,
            format,
            output: out_path,
        } => {
            let urls = match url {
                Some(url) => vec![url],
                None => io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?,
            };
            if urls.iter().all(|u| u.trim().is_empty()) {
                bail!("no URL or video ID provided\n\nUsage: ytreview transcript <URL>\n       echo <URL> | ytreview transcript");
            }

            let mut rendered_all = Vec::new();
            for url_input in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
                let video_id = video_id_of(url_input)?;
                let transcript = fallback::fetch_transcript(&client, &settings, &video_id).await?;

                if cli.verbose {
                    eprintln!(
                        "Video: {} ({})\nSource: {}\nLanguage: {}\nSegments: {}",
                        transcript.title,
                        transcript.video_id,
                        transcript.source,
                        transcript.language,
                        transcript.segments.len(),
                    );
                }

                rendered_all.push(match format {
                    OutputFormat::Text => output::render_text(&transcript),
                    OutputFormat::Json => output::render_json(&transcript),
                    OutputFormat::Srt => output::render_srt(&transcript),
                });
            }
            write_or_print(out_path.as_ref(), &rendered_all.join("\n\n"), cli.verbose)?;
        }

        Command::Review {
            url,
            keywords,
            output: out_path,
            ..
        } => {
            let video_id = video_id_of(&url)?;
            let keywords = review::parse_keywords(&keywords);
            if keywords.is_empty() {
                bail!("at least one keyword is required (-k \"keyword1, keyword2\")");
            }

            let transcript = fallback::fetch_transcript(&client, &settings, &video_id).await?;
            if cli.verbose {
                eprintln!(
                    "Video: {} ({})\nSource: {}\nLanguage: {}",
                    transcript.title, transcript.video_id, transcript.source, transcript.language
                );
            }

            let text = transcript.text();
            let req = ReviewRequest {
                title: &transcript.title,
                transcript: &text,
                keywords: &keywords,
                length: settings.length,
            };
            let generated = review::generate(&client, &settings, &req).await?;

            write_or_print(out_path.as_ref(), &generated.text, cli.verbose)?;
            if cli.verbose {
                let usage = generated.usage;
                eprintln!(
                    "Model: {}\nTarget: {} chars, got {}\nTokens: {} prompt + {} completion = {}",
                    generated.model,
                    generated.length.target_chars(),
                    generated.text.chars().count(),
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens,
                );
                if let Some(pricing) = settings.pricing {
                    eprintln!("Estimated cost: ${:.5}", usage.estimated_cost(&pricing));
                }
            }
        }
    }

    Ok(())
}
