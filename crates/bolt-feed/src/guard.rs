use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use bolt_types::{FeedError, LimitCode};

use crate::config::FeedConfig;

/// Sliding-window throttling and raid detection.
///
/// All windows are ephemeral: they live only in process memory and reset on
/// restart, which is acceptable because every window is short-lived.
///
/// Check order for a post: raid-cooldown → server post limit → raid attempt
/// registration (which may itself trip the detector) → per-user window.
/// Registration happens before the per-user check on purpose, so a burst is
/// flagged even when each participant is individually inside their own
/// cooldown. Comments follow the same order with the comment limits.
#[derive(Debug, Default)]
pub struct AbuseGuard {
    post_window: VecDeque<DateTime<Utc>>,
    comment_window: VecDeque<DateTime<Utc>>,
    raid_window: VecDeque<(DateTime<Utc>, Uuid)>,
    cooldown_until: Option<DateTime<Utc>>,
}

impl AbuseGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active raid cooldown deadline, if any.
    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.cooldown_until
    }

    pub fn admit_post(
        &mut self,
        user_id: Uuid,
        last_user_post: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        config: &FeedConfig,
    ) -> Result<(), FeedError> {
        self.check_cooldown(now)?;

        admit_server_window(
            &mut self.post_window,
            now,
            config.server_posts_per_minute,
            LimitCode::ServerPostMinuteLimitReached,
            "The server post limit was reached. Please try again in a minute.",
        )?;

        self.register_attempt(user_id, now, config)?;

        // Boundary-exclusive: a post exactly one window old no longer blocks.
        if let Some(last) = last_user_post
            && last > now - config.user_post_window
        {
            return Err(FeedError::rate_limited(
                LimitCode::UserHourlyPostLimit,
                "You already posted recently. One thread per hour, lightning style.",
            ));
        }

        Ok(())
    }

    pub fn admit_comment(
        &mut self,
        user_id: Uuid,
        last_user_comment: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        config: &FeedConfig,
    ) -> Result<(), FeedError> {
        self.check_cooldown(now)?;

        admit_server_window(
            &mut self.comment_window,
            now,
            config.server_comments_per_minute,
            LimitCode::ServerCommentMinuteLimitReached,
            "The server comment limit was reached. Please try again in a minute.",
        )?;

        self.register_attempt(user_id, now, config)?;

        if let Some(last) = last_user_comment
            && last > now - config.user_comment_window
        {
            return Err(FeedError::rate_limited(
                LimitCode::UserCommentMinuteLimit,
                "You are commenting too quickly. Take a breath.",
            ));
        }

        Ok(())
    }

    /// Rejects everything while a raid cooldown deadline is in the future.
    fn check_cooldown(&mut self, now: DateTime<Utc>) -> Result<(), FeedError> {
        match self.cooldown_until {
            Some(until) if now < until => Err(FeedError::raid(LimitCode::RaidCooldown)),
            Some(_) => {
                self.cooldown_until = None;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Records the attempt in the raid window and trips the detector when
    /// both the attempt and unique-user thresholds are reached.
    fn register_attempt(
        &mut self,
        user_id: Uuid,
        now: DateTime<Utc>,
        config: &FeedConfig,
    ) -> Result<(), FeedError> {
        trim_before(&mut self.raid_window, now - config.raid_window, |(t, _)| *t);
        self.raid_window.push_back((now, user_id));

        if self.raid_window.len() >= config.raid_attempt_threshold {
            let unique: HashSet<Uuid> = self.raid_window.iter().map(|(_, u)| *u).collect();
            if unique.len() >= config.raid_unique_users {
                let until = now + config.raid_cooldown;
                self.cooldown_until = Some(until);
                warn!(
                    attempts = self.raid_window.len(),
                    unique_users = unique.len(),
                    cooldown_until = %until,
                    "Raid detected, pausing all posting"
                );
                return Err(FeedError::raid(LimitCode::RaidDetected));
            }
        }

        Ok(())
    }
}

fn admit_server_window(
    window: &mut VecDeque<DateTime<Utc>>,
    now: DateTime<Utc>,
    cap: usize,
    code: LimitCode,
    message: &str,
) -> Result<(), FeedError> {
    trim_before(window, now - Duration::seconds(60), |t| *t);
    if window.len() >= cap {
        return Err(FeedError::rate_limited(code, message));
    }
    window.push_back(now);
    Ok(())
}

/// Drops entries at or before `cutoff`, keeping only strictly newer ones.
fn trim_before<T>(
    window: &mut VecDeque<T>,
    cutoff: DateTime<Utc>,
    timestamp: impl Fn(&T) -> DateTime<Utc>,
) {
    while let Some(front) = window.front() {
        if timestamp(front) <= cutoff {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FeedConfig {
        FeedConfig {
            server_posts_per_minute: 3,
            server_comments_per_minute: 3,
            raid_attempt_threshold: 5,
            raid_unique_users: 3,
            ..FeedConfig::default()
        }
    }

    fn assert_code(err: FeedError, code: LimitCode) {
        match err {
            FeedError::RateLimited { code: got, .. } => assert_eq!(got, code),
            other => panic!("expected rate limit {code}, got {other:?}"),
        }
    }

    #[test]
    fn server_post_limit_caps_within_minute() {
        let cfg = config();
        let mut guard = AbuseGuard::new();
        let now = Utc::now();

        for i in 0..3 {
            guard
                .admit_post(Uuid::new_v4(), None, now + Duration::seconds(i), &cfg)
                .unwrap();
        }
        let err = guard
            .admit_post(Uuid::new_v4(), None, now + Duration::seconds(3), &cfg)
            .unwrap_err();
        assert_code(err, LimitCode::ServerPostMinuteLimitReached);
    }

    #[test]
    fn server_window_slides_past_oldest_attempt() {
        let cfg = config();
        let mut guard = AbuseGuard::new();
        let now = Utc::now();

        for i in 0..3 {
            guard
                .admit_post(Uuid::new_v4(), None, now + Duration::seconds(i), &cfg)
                .unwrap();
        }
        // 61s after the first attempt, it has slid out of the window.
        guard
            .admit_post(Uuid::new_v4(), None, now + Duration::seconds(61), &cfg)
            .unwrap();
    }

    #[test]
    fn user_post_window_boundary_is_exclusive() {
        let cfg = config();
        let mut guard = AbuseGuard::new();
        let user = Uuid::new_v4();
        let posted = Utc::now();

        // One second before the window closes: still blocked.
        let err = guard
            .admit_post(
                user,
                Some(posted),
                posted + cfg.user_post_window - Duration::seconds(1),
                &cfg,
            )
            .unwrap_err();
        assert_code(err, LimitCode::UserHourlyPostLimit);

        // Exactly at the boundary: admitted.
        guard
            .admit_post(user, Some(posted), posted + cfg.user_post_window, &cfg)
            .unwrap();
    }

    #[test]
    fn user_comment_window_blocks_rapid_comments() {
        let cfg = config();
        let mut guard = AbuseGuard::new();
        let user = Uuid::new_v4();
        let now = Utc::now();

        guard.admit_comment(user, None, now, &cfg).unwrap();
        let err = guard
            .admit_comment(user, Some(now), now + Duration::seconds(30), &cfg)
            .unwrap_err();
        assert_code(err, LimitCode::UserCommentMinuteLimit);
    }

    #[test]
    fn raid_trips_on_attempts_and_unique_users() {
        let cfg = FeedConfig {
            server_posts_per_minute: 100,
            raid_attempt_threshold: 5,
            raid_unique_users: 3,
            ..FeedConfig::default()
        };
        let mut guard = AbuseGuard::new();
        let now = Utc::now();
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        for i in 0..4 {
            guard
                .admit_post(users[i % users.len()], None, now + Duration::seconds(i as i64), &cfg)
                .unwrap();
        }
        // Fifth attempt reaches both thresholds and trips the detector.
        let err = guard
            .admit_post(users[0], None, now + Duration::seconds(4), &cfg)
            .unwrap_err();
        assert_code(err, LimitCode::RaidDetected);
        assert!(guard.cooldown_until().is_some());

        // Everyone is locked out, fresh users included.
        let err = guard
            .admit_post(Uuid::new_v4(), None, now + Duration::seconds(5), &cfg)
            .unwrap_err();
        assert_code(err, LimitCode::RaidCooldown);
        let err = guard
            .admit_comment(Uuid::new_v4(), None, now + Duration::seconds(5), &cfg)
            .unwrap_err();
        assert_code(err, LimitCode::RaidCooldown);
    }

    #[test]
    fn raid_needs_enough_unique_users() {
        let cfg = FeedConfig {
            server_posts_per_minute: 100,
            user_post_window: Duration::zero(),
            raid_attempt_threshold: 5,
            raid_unique_users: 3,
            ..FeedConfig::default()
        };
        let mut guard = AbuseGuard::new();
        let now = Utc::now();
        let lonely = Uuid::new_v4();

        // Plenty of attempts but all from one user: no raid.
        for i in 0..10 {
            guard
                .admit_post(lonely, None, now + Duration::seconds(i), &cfg)
                .unwrap();
        }
        assert!(guard.cooldown_until().is_none());
    }

    #[test]
    fn posting_resumes_after_cooldown_expires() {
        let cfg = FeedConfig {
            server_posts_per_minute: 100,
            raid_attempt_threshold: 2,
            raid_unique_users: 2,
            ..FeedConfig::default()
        };
        let mut guard = AbuseGuard::new();
        let now = Utc::now();

        guard.admit_post(Uuid::new_v4(), None, now, &cfg).unwrap();
        let err = guard
            .admit_post(Uuid::new_v4(), None, now + Duration::seconds(1), &cfg)
            .unwrap_err();
        assert_code(err, LimitCode::RaidDetected);

        let after = now + Duration::seconds(1) + cfg.raid_cooldown;
        guard.admit_post(Uuid::new_v4(), None, after, &cfg).unwrap();
        assert!(guard.cooldown_until().is_none());
    }

    #[test]
    fn raid_cooldown_short_circuits_before_server_limit() {
        let cfg = FeedConfig {
            server_posts_per_minute: 0,
            raid_attempt_threshold: 1,
            raid_unique_users: 1,
            ..FeedConfig::default()
        };
        let mut guard = AbuseGuard::new();
        let now = Utc::now();

        // Server cap of zero rejects first, before any raid registration.
        let err = guard.admit_post(Uuid::new_v4(), None, now, &cfg).unwrap_err();
        assert_code(err, LimitCode::ServerPostMinuteLimitReached);

        // Force a cooldown, then verify it wins over the server limit.
        guard.cooldown_until = Some(now + Duration::seconds(60));
        let err = guard.admit_post(Uuid::new_v4(), None, now, &cfg).unwrap_err();
        assert_code(err, LimitCode::RaidCooldown);
    }
}
