use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::service::FeedService;

/// Background task that drains the publish queue.
///
/// Ticks once per second, acquires the feed lock through `drain_tick`, and
/// releases at most one queued thread per publish interval. Runs until the
/// process shuts down.
pub async fn run_publish_loop(feed: Arc<FeedService>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        interval.tick().await;

        match feed.drain_tick(Utc::now()) {
            Ok(0) => {}
            Ok(count) => info!("Publish tick released {} thread(s)", count),
            Err(e) => warn!("Publish tick failed: {}", e),
        }
    }
}
