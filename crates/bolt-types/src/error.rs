use thiserror::Error;

/// Machine-readable code attached to every rate-limit rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitCode {
    ServerPostMinuteLimitReached,
    ServerCommentMinuteLimitReached,
    UserHourlyPostLimit,
    UserCommentMinuteLimit,
    RaidCooldown,
    RaidDetected,
    QueueFull,
}

impl LimitCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerPostMinuteLimitReached => "server_post_minute_limit_reached",
            Self::ServerCommentMinuteLimitReached => "server_comment_minute_limit_reached",
            Self::UserHourlyPostLimit => "user_hourly_post_limit",
            Self::UserCommentMinuteLimit => "user_comment_minute_limit",
            Self::RaidCooldown => "raid_cooldown",
            Self::RaidDetected => "raid_detected",
            Self::QueueFull => "queue_full",
        }
    }
}

impl std::fmt::Display for LimitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both raid codes hide the trigger behind the same canned message.
pub const RAID_BUSY_MESSAGE: &str = "The server is busy right now. Please try again in a few minutes.";

#[derive(Debug, Error)]
pub enum FeedError {
    /// Client-correctable input problem. Never retried.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Edit attempted by someone other than the author.
    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    RateLimited { code: LimitCode, message: String },

    /// Snapshot load/save failed. Fatal to the triggering call, never
    /// retried transparently.
    #[error("persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl FeedError {
    pub fn rate_limited(code: LimitCode, message: impl Into<String>) -> Self {
        Self::RateLimited {
            code,
            message: message.into(),
        }
    }

    pub fn raid(code: LimitCode) -> Self {
        Self::RateLimited {
            code,
            message: RAID_BUSY_MESSAGE.to_string(),
        }
    }
}
