use ai_news_digest::{
    ContentItem, GeminiClient, MockModelClient, ModelClient, PipelineOrchestrator, Settings,
    UserProfile,
};
use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// AI news digest pipeline runner.
#[derive(Parser, Debug)]
#[command(name = "ai-news-digest")]
struct Args {
    /// Hours to look back for content items.
    #[arg(default_value_t = 24)]
    hours: i64,

    /// Number of top articles to include in the email.
    #[arg(default_value_t = 10)]
    top_n: usize,

    /// JSON file with ingested content items.
    #[arg(long)]
    input: PathBuf,

    /// Write the rendered Markdown here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run against the deterministic mock model, no credentials needed.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!(
        "Starting digest pipeline (hours={}, top_n={}, dry_run={})",
        args.hours, args.top_n, args.dry_run
    );

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading input file {}", args.input.display()))?;
    let items: Vec<ContentItem> = serde_json::from_str(&raw).context("parsing content items")?;

    // Time-window the batch; ingestion is expected to have deduplicated it.
    let cutoff = Utc::now() - Duration::hours(args.hours);
    let items: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| item.published_at >= cutoff)
        .collect();
    info!("Loaded {} items within the lookback window", items.len());

    let (client, profile): (Arc<dyn ModelClient>, UserProfile) = if args.dry_run {
        (Arc::new(MockModelClient::new()), UserProfile::default())
    } else {
        let settings = Settings::from_env().context("loading settings")?;
        let profile = match &settings.profile_path {
            Some(path) => UserProfile::from_file(Path::new(path))
                .with_context(|| format!("loading profile from {path}"))?,
            None => {
                warn!("PROFILE_PATH not set, using the default profile");
                UserProfile::default()
            }
        };
        let mut client =
            GeminiClient::new(settings.gemini_api_key, settings.request_timeout_seconds);
        if let Some(model) = settings.model {
            client = client.with_model(model);
        }
        (Arc::new(client), profile)
    };

    let pipeline = PipelineOrchestrator::new(client, profile).with_top_n(args.top_n);
    let report = pipeline.run(items).await;

    info!(
        "Run complete: {} items in, {} digests, {} ranked, {} composed",
        report.items_in,
        report.digests.len(),
        report.ranked_count,
        report.document.entries.len()
    );

    let markdown = report.document.to_markdown();
    match &args.output {
        Some(path) => {
            std::fs::write(path, markdown)
                .with_context(|| format!("writing digest to {}", path.display()))?;
            info!("Digest written to {}", path.display());
        }
        None => println!("{markdown}"),
    }

    Ok(())
}
