use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use bolt_types::{Comment, Report, Thread};

/// Read-only list of admin user ids for report fan-out.
pub trait AdminRoster: Send + Sync {
    fn admin_ids(&self) -> Vec<Uuid>;
}

/// Fixed roster, typically loaded from config at startup.
pub struct StaticRoster(pub Vec<Uuid>);

impl AdminRoster for StaticRoster {
    fn admin_ids(&self) -> Vec<Uuid> {
        self.0.clone()
    }
}

/// Side-effect-only collaborator. Implementations must never fail the
/// caller: a mutation that already persisted stays successful no matter
/// what happens to its notifications.
pub trait ModerationNotifier: Send + Sync {
    fn report_filed(&self, report: &Report, summary: &str);
    fn best_comment_changed(&self, thread: &Thread, comment: &Comment);
}

/// Discards everything. Useful in tests and headless tools.
pub struct NoopNotifier;

impl ModerationNotifier for NoopNotifier {
    fn report_filed(&self, _report: &Report, _summary: &str) {}
    fn best_comment_changed(&self, _thread: &Thread, _comment: &Comment) {}
}

/// Default production notifier: per-admin fan-out, an optional global
/// broadcast, and an optional webhook alert channel.
pub struct FanoutNotifier {
    roster: Arc<dyn AdminRoster>,
    broadcast: bool,
    webhook: Option<ReportWebhook>,
    /// Spotlight dedupe keys already delivered, so repeated recomputes with
    /// the same winner never re-notify.
    spotlight_seen: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl FanoutNotifier {
    pub fn new(roster: Arc<dyn AdminRoster>, broadcast: bool, webhook: Option<ReportWebhook>) -> Self {
        Self {
            roster,
            broadcast,
            webhook,
            spotlight_seen: Mutex::new(HashSet::new()),
        }
    }

    /// Returns true the first time a spotlight key is seen.
    fn first_spotlight(&self, key: (Uuid, Uuid)) -> bool {
        match self.spotlight_seen.lock() {
            Ok(mut seen) => seen.insert(key),
            Err(e) => {
                warn!("Spotlight dedupe lock poisoned: {}", e);
                false
            }
        }
    }
}

impl ModerationNotifier for FanoutNotifier {
    fn report_filed(&self, report: &Report, summary: &str) {
        for admin_id in self.roster.admin_ids() {
            info!(%admin_id, report_id = %report.id, "Notifying admin of report: {}", summary);
        }
        if self.broadcast {
            info!(report_id = %report.id, "Broadcasting report: {}", summary);
        }
        if let Some(webhook) = &self.webhook {
            webhook.send_report_alert(report, summary);
        }
    }

    fn best_comment_changed(&self, thread: &Thread, comment: &Comment) {
        if !self.first_spotlight((thread.id, comment.id)) {
            return;
        }
        info!(
            author_id = %comment.author_id,
            thread_id = %thread.id,
            comment_id = %comment.id,
            "Spotlight: comment promoted to best on '{}'",
            thread.title
        );
    }
}

/// Fire-and-forget webhook delivery with a bounded request timeout. A
/// failed or timed-out delivery is logged and dropped; there is no retry.
pub struct ReportWebhook {
    client: reqwest::Client,
    url: String,
}

impl ReportWebhook {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("building webhook client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn send_report_alert(&self, report: &Report, summary: &str) {
        let client = self.client.clone();
        let url = self.url.clone();
        let payload = serde_json::json!({
            "report_id": report.id,
            "target": report.target.to_string(),
            "target_id": report.target_id,
            "thread_id": report.thread_id,
            "reason": report.reason,
            "summary": summary,
        });

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!("Report webhook returned {}", resp.status()),
                Err(e) => warn!("Report webhook delivery failed: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spotlight_dedupes_on_thread_and_comment() {
        let notifier = FanoutNotifier::new(Arc::new(StaticRoster(vec![])), false, None);
        let key = (Uuid::new_v4(), Uuid::new_v4());

        assert!(notifier.first_spotlight(key));
        assert!(!notifier.first_spotlight(key));

        // A different winner on the same thread notifies again.
        assert!(notifier.first_spotlight((key.0, Uuid::new_v4())));
    }
}
