use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Thread, ThreadMode};

// -- Requests --

#[derive(Debug, Clone, Deserialize)]
pub struct NewThread {
    #[serde(default)]
    pub mode: ThreadMode,
    pub title: String,
    pub body: String,
    pub author_id: Uuid,
    pub author_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadEdit {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub body: String,
    pub author_id: Uuid,
    pub author_name: String,
}

/// Paging for list endpoints. Pages are 0-based.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_per_page() -> usize {
    25
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: default_per_page(),
        }
    }
}

// -- Results --

#[derive(Debug, Clone, Serialize)]
pub struct CreatedThread {
    pub thread: Thread,
    /// False when the thread published immediately.
    pub queued: bool,
    /// 1-based position in the backlog; 0 when published immediately.
    pub queue_position: usize,
    pub next_publish_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub report_id: Uuid,
    /// True when this (reporter, target) pair had already reported.
    pub duplicate: bool,
    pub total_reports: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FeedStats {
    pub threads: u64,
    pub published_threads: u64,
    pub queued_threads: u64,
    pub comments: u64,
    pub reports: u64,
    pub likes: u64,
}
