use chrono::Duration;

/// Tunables for throttling, abuse detection, and input bounds.
///
/// Env overrides use the `BOLT_` prefix; unset or unparsable values fall
/// back to the defaults below.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Minimum spacing between two thread publications.
    pub publish_interval: Duration,
    /// How long a user must wait between their own threads.
    pub user_post_window: Duration,
    pub server_posts_per_minute: usize,
    /// How long a user must wait between their own comments.
    pub user_comment_window: Duration,
    pub server_comments_per_minute: usize,
    pub queue_max_size: usize,
    pub raid_window: Duration,
    pub raid_attempt_threshold: usize,
    pub raid_unique_users: usize,
    pub raid_cooldown: Duration,
    pub max_title_len: usize,
    pub max_body_len: usize,
    pub max_comment_len: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::seconds(60),
            user_post_window: Duration::seconds(3600),
            server_posts_per_minute: 10,
            user_comment_window: Duration::seconds(60),
            server_comments_per_minute: 60,
            queue_max_size: 500,
            raid_window: Duration::seconds(30),
            raid_attempt_threshold: 20,
            raid_unique_users: 8,
            raid_cooldown: Duration::seconds(300),
            max_title_len: 120,
            max_body_len: 1000,
            max_comment_len: 500,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            publish_interval: secs_env("BOLT_PUBLISH_INTERVAL_SECS", d.publish_interval),
            user_post_window: secs_env("BOLT_USER_POST_WINDOW_SECS", d.user_post_window),
            server_posts_per_minute: usize_env(
                "BOLT_SERVER_POSTS_PER_MINUTE",
                d.server_posts_per_minute,
            ),
            user_comment_window: secs_env("BOLT_USER_COMMENT_WINDOW_SECS", d.user_comment_window),
            server_comments_per_minute: usize_env(
                "BOLT_SERVER_COMMENTS_PER_MINUTE",
                d.server_comments_per_minute,
            ),
            queue_max_size: usize_env("BOLT_QUEUE_MAX_SIZE", d.queue_max_size),
            raid_window: secs_env("BOLT_RAID_WINDOW_SECS", d.raid_window),
            raid_attempt_threshold: usize_env(
                "BOLT_RAID_ATTEMPT_THRESHOLD",
                d.raid_attempt_threshold,
            ),
            raid_unique_users: usize_env("BOLT_RAID_UNIQUE_USERS", d.raid_unique_users),
            raid_cooldown: secs_env("BOLT_RAID_COOLDOWN_SECS", d.raid_cooldown),
            max_title_len: usize_env("BOLT_MAX_TITLE_LEN", d.max_title_len),
            max_body_len: usize_env("BOLT_MAX_BODY_LEN", d.max_body_len),
            max_comment_len: usize_env("BOLT_MAX_COMMENT_LEN", d.max_comment_len),
        }
    }
}

fn usize_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn secs_env(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .map(Duration::seconds)
        .unwrap_or(default)
}
