use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "reviser",
    about = "YouTube transcript fetcher and key-point reviewer",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Generate key points to review instead of printing the transcript
    #[arg(short, long)]
    pub review: bool,

    /// Print the video title only
    #[arg(long)]
    pub title: bool,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Locale tag used in summary cache keys (defaults to config, then "en")
    #[arg(short, long)]
    pub locale: Option<String>,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Bypass the durable cache entirely
    #[arg(long)]
    pub no_cache: bool,

    /// LLM model for key-point generation (defaults to config, then gpt-4o-mini)
    #[arg(long)]
    pub model: Option<String>,

    /// Show fetch metadata
    #[arg(short, long)]
    pub verbose: bool,
}
