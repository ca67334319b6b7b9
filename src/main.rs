use std::io::{self, BufRead};
use std::path::PathBuf;

use eyre::{Result, bail};
use log::{debug, info};

mod cli;

use cli::{Cli, OutputFormat};

use reviser::botguard::BotguardAuthenticator;
use reviser::cache::{BlobCache, SUMMARIES_NAMESPACE, TRANSCRIPTS_NAMESPACE, default_cache_root};
use reviser::fetcher::TranscriptFetcher;
use reviser::innertube::InnertubeApi;
use reviser::review::ReviewService;
use reviser::session::SessionManager;
use reviser::summarize::LlmSummarizer;

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("reviser.log");

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
        .join("reviser")
        .join("logs")
}

fn build_after_help() -> String {
    let log_path = log_dir().join("reviser.log");
    format!("\nLogs are written to: {}", log_path.display())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = reviser::config::Config::load().unwrap_or_default();

    // Apply config defaults (CLI flags take priority)
    let model = cli
        .model
        .clone()
        .or_else(|| config.default_model.clone())
        .unwrap_or_else(|| "gpt-4o-mini".to_string());
    let locale = cli
        .locale
        .clone()
        .or_else(|| config.default_locale.clone())
        .unwrap_or_else(|| "en".to_string());

    if cli.verbose {
        let config_path = reviser::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        debug!("Using model {model}, locale {locale}");
    }

    let caching_disabled = cli.no_cache || config.disable_cache.unwrap_or(false);
    let cache_root = config.cache_dir.clone().unwrap_or_else(default_cache_root);
    let transcripts = if caching_disabled {
        BlobCache::disabled(TRANSCRIPTS_NAMESPACE)
    } else {
        BlobCache::new(&cache_root, TRANSCRIPTS_NAMESPACE)
    };
    let summaries = if caching_disabled {
        BlobCache::disabled(SUMMARIES_NAMESPACE)
    } else {
        BlobCache::new(&cache_root, SUMMARIES_NAMESPACE)
    };

    let client = reqwest::Client::new();
    let session = SessionManager::new(BotguardAuthenticator::new(client.clone()));
    let fetcher = TranscriptFetcher::new(session, InnertubeApi::new(client.clone()), transcripts);

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    if urls.is_empty() {
        bail!("no URL or video ID provided\n\nUsage: reviser <URL>\n       echo <URL> | reviser");
    }

    if cli.review {
        let service = ReviewService::new(fetcher, LlmSummarizer::new(client, model), summaries);
        for url_input in &urls {
            let Some(video_id) = parse_input(url_input)? else {
                continue;
            };
            let review = service
                .review(&video_id, &locale)
                .await
                .map_err(|e| eyre::eyre!("review failed for {video_id}: {e}"))?;
            let rendered = match cli.format {
                OutputFormat::Text => reviser::output::render_points(&review),
                OutputFormat::Json => reviser::output::render_points_json(&review),
            };
            emit(&cli, &rendered)?;
        }
        return Ok(());
    }

    for url_input in &urls {
        let Some(video_id) = parse_input(url_input)? else {
            continue;
        };

        if cli.title {
            match fetcher.video_title(&video_id).await {
                Some(title) => emit(&cli, &title)?,
                None => bail!("could not fetch title for {video_id}"),
            }
            continue;
        }

        let transcript = fetcher
            .fetch_transcript(&video_id)
            .await
            .map_err(|e| eyre::eyre!("transcript fetch failed for {video_id}: {e}"))?;

        if cli.verbose {
            eprintln!(
                "Video: {}\nLanguage: {}\nSegments: {}",
                video_id,
                transcript.language.as_deref().unwrap_or("unknown"),
                transcript.segments.len(),
            );
        }

        let rendered = match cli.format {
            OutputFormat::Text => reviser::output::render_text(&transcript),
            OutputFormat::Json => reviser::output::render_json(&transcript),
        };
        emit(&cli, &rendered)?;
    }

    Ok(())
}

/// Resolve one input line into a video ID; blank lines are skipped
fn parse_input(url_input: &str) -> Result<Option<String>> {
    let url_input = url_input.trim();
    if url_input.is_empty() {
        return Ok(None);
    }

    let video_id = reviser::extract_video_id(url_input)
        .ok_or_else(|| eyre::eyre!("could not extract video ID from: {url_input}\n\nSupported formats:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  https://www.youtube.com/shorts/ID\n  <11-character video ID>"))?;
    Ok(Some(video_id))
}

fn emit(cli: &Cli, rendered: &str) -> Result<()> {
    if let Some(ref path) = cli.output {
        std::fs::write(path, rendered)?;
        if cli.verbose {
            eprintln!("Output written to: {}", path.display());
        }
    } else {
        println!("{rendered}");
    }
    Ok(())
}
