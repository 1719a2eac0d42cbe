use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bumped whenever the on-disk snapshot layout changes.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Thread flavor. Only one mode exists today; the field is kept so the
/// snapshot format does not break when more modes land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadMode {
    Lightning,
}

impl Default for ThreadMode {
    fn default() -> Self {
        Self::Lightning
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub mode: ThreadMode,
    pub title: String,
    pub body: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// None until the publish queue releases the thread.
    pub published_at: Option<DateTime<Utc>>,
    pub best_comment_id: Option<Uuid>,
    pub likes: u64,
    /// Denormalized comment count, kept in step with the comment map.
    pub comments: u64,
    pub reports: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub body: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes: u64,
    pub reports: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Thread,
    Comment,
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thread => write!(f, "thread"),
            Self::Comment => write!(f, "comment"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub target: TargetType,
    pub target_id: Uuid,
    /// Thread the target belongs to, for notification context. Equals
    /// `target_id` when the target is the thread itself.
    pub thread_id: Uuid,
    pub reporter_id: Uuid,
    pub reporter_name: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// One `(user, target)` like toggle currently in the "liked" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LikeEntry {
    pub user_id: Uuid,
    pub target_id: Uuid,
}

/// Dedupe record: which report a `(reporter, target)` pair already produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportKeyEntry {
    pub reporter_id: Uuid,
    pub target: TargetType,
    pub target_id: Uuid,
    pub report_id: Uuid,
}

/// The complete persisted aggregate, written and read as one unit.
/// The publish queue is deliberately absent: it is rebuilt from the
/// unpublished threads on every load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub threads: Vec<Thread>,
    pub comments: Vec<Comment>,
    pub likes: Vec<LikeEntry>,
    pub reports: Vec<Report>,
    pub report_index: Vec<ReportKeyEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            threads: Vec::new(),
            comments: Vec::new(),
            likes: Vec::new(),
            reports: Vec::new(),
            report_index: Vec::new(),
        }
    }
}
