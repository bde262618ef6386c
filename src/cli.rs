use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ytreview::review::ReviewLength;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Srt,
}

#[derive(Parser)]
#[command(
    name = "ytreview",
    about = "YouTube transcript extractor and promotional review generator",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Preferred caption language, most preferred first (repeatable; default: ko, en)
    #[arg(long = "lang", global = true)]
    pub langs: Vec<String>,

    /// LLM model for review generation
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Show extraction source and metadata
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the browser form
    Serve {
        /// Address to listen on
        #[arg(long)]
        listen: Option<String>,
    },

    /// Print the transcript of one or more videos
    Transcript {
        /// YouTube video URL or video ID (reads from stdin if omitted)
        url: Option<String>,

        /// Output format: text (default), json, srt
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a promotional review for a video
    Review {
        /// YouTube video URL or video ID
        url: String,

        /// Keywords to include, comma separated
        #[arg(short, long)]
        keywords: String,

        /// Target review length
        #[arg(short, long, value_enum)]
        length: Option<ReviewLength>,

        /// Write the review to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_length_short_flag() {
        let cli = Cli::try_parse_from(["ytreview", "review", "dQw4w9WgXcQ", "-k", "가성비", "-l", "long"]).unwrap();
        match cli.command {
            Command::Review { length, keywords, .. } => {
                assert_eq!(length, Some(ReviewLength::Long));
                assert_eq!(keywords, "가성비");
            }
            _ => panic!("expected review command"),
        }
    }

    #[test]
    fn test_lang_is_global_and_repeatable() {
        let cli = Cli::try_parse_from(["ytreview", "transcript", "dQw4w9WgXcQ", "--lang", "ja", "--lang", "en"]).unwrap();
        assert_eq!(cli.langs, vec!["ja", "en"]);
    }

    #[test]
    fn test_command_definition() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }
}
