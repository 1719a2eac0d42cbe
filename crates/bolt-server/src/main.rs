use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use bolt_feed::notify::{FanoutNotifier, ReportWebhook, StaticRoster};
use bolt_feed::{FeedConfig, FeedService, publish};
use bolt_store::FileSnapshotStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bolt=debug".into()),
        )
        .init();

    // Config
    let snapshot_path =
        std::env::var("BOLT_SNAPSHOT_PATH").unwrap_or_else(|_| "lightning-threads.json".into());
    let admin_ids: Vec<Uuid> = std::env::var("BOLT_ADMIN_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let broadcast = std::env::var("BOLT_BROADCAST_REPORTS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let webhook = match std::env::var("BOLT_REPORT_WEBHOOK_URL") {
        Ok(url) if !url.is_empty() => Some(ReportWebhook::new(url)?),
        _ => None,
    };
    let config = FeedConfig::from_env();

    // Wire the feed
    let store = Arc::new(FileSnapshotStore::new(&snapshot_path));
    let notifier = Arc::new(FanoutNotifier::new(
        Arc::new(StaticRoster(admin_ids)),
        broadcast,
        webhook,
    ));
    let feed = Arc::new(FeedService::new(store, notifier, config)?);

    // The drain loop releases queued threads at the publish cadence.
    let publisher = tokio::spawn(publish::run_publish_loop(feed.clone()));

    info!("Lightning Threads feed running; snapshot at {}", snapshot_path);
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    publisher.abort();

    Ok(())
}
