use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lemmyfeed_backend::api::HttpLemmyApi;
use lemmyfeed_backend::config::LemmyfeedConfig;
use lemmyfeed_backend::database::Database;
use lemmyfeed_backend::feeds::{FeedController, FeedService, FeedSpec, TracingAlerts};
use lemmyfeed_backend::metrics::IntegrityMetrics;
use lemmyfeed_backend::resolver::SiteResolver;
use lemmyfeed_backend::scheduler::RefreshScheduler;
use lemmyfeed_backend::telemetry;
use lemmyfeed_backend::widget::TopPosts;

#[derive(Parser)]
#[command(author, version, about = "Lemmyfeed sync daemon and CLI")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the next front-page feed page once and update the widget snapshot
    Sync,
    /// Run the periodic background refresh loop
    Watch,
    /// Print the current widget snapshot
    Top,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();
    let config = LemmyfeedConfig::from_env()?;

    match args.command.unwrap_or(Command::Sync) {
        Command::Sync => sync_once(&config).await,
        Command::Watch => watch(&config).await,
        Command::Top => print_top(&config),
    }
}

async fn sync_once(config: &LemmyfeedConfig) -> Result<()> {
    // Store-open failure after recovery is fatal; `?` here exits the process.
    let database = Database::open(&config.paths)?;
    let metrics = Arc::new(IntegrityMetrics::new());
    let api = Arc::new(HttpLemmyApi::new(
        reqwest::Client::new(),
        config.instance_url.clone(),
    ));
    let alerts = Arc::new(TracingAlerts);

    let resolver = SiteResolver::new(database.clone(), Arc::clone(&metrics));
    resolver.seed_suggested_instances()?;
    let site = resolver.site_for_url(&config.instance_url)?;
    let account = resolver.signed_out_account(&site)?;

    let feed_service = FeedService::new(database.clone());
    let feed = feed_service.get_or_create_feed(
        &account.id,
        &FeedSpec::Frontpage {
            listing_type: site
                .default_listing_type
                .clone()
                .unwrap_or_else(|| "All".to_string()),
            sort_type: site
                .default_sort_type
                .clone()
                .unwrap_or_else(|| "Hot".to_string()),
        },
    )?;

    let controller = FeedController::new(
        database.clone(),
        api,
        metrics,
        alerts,
        feed.clone(),
        config.refresh.page_limit,
    );
    let outcome = controller.load_next_page().await?;
    tracing::info!(feed_id = %feed.id, ?outcome, "sync complete");

    let snapshot = TopPosts::from_feed(&database, &feed.id)?;
    snapshot.write_snapshot(&config.paths.widget_snapshot_path)?;
    Ok(())
}

async fn watch(config: &LemmyfeedConfig) -> Result<()> {
    let database = Database::open(&config.paths)?;
    let metrics = Arc::new(IntegrityMetrics::new());
    let api = Arc::new(HttpLemmyApi::new(
        reqwest::Client::new(),
        config.instance_url.clone(),
    ));
    let resolver = SiteResolver::new(database.clone(), Arc::clone(&metrics));
    resolver.seed_suggested_instances()?;

    let scheduler = RefreshScheduler::new(
        database,
        api,
        resolver,
        metrics,
        Arc::new(TracingAlerts),
        config.instance_url.clone(),
        config.refresh.clone(),
    );
    scheduler.run().await
}

fn print_top(config: &LemmyfeedConfig) -> Result<()> {
    match TopPosts::read_snapshot(&config.paths.widget_snapshot_path)? {
        Some(snapshot) => {
            println!("generated at {}", snapshot.generated_at);
            for post in &snapshot.posts {
                println!(
                    "{:>5}  {:>4}c  [{}] {}",
                    post.score,
                    post.comment_count,
                    post.community_name,
                    post.title
                );
            }
        }
        None => println!("no widget snapshot yet; run `sync` first"),
    }
    Ok(())
}
