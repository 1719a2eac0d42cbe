use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use bolt_types::models::{LikeEntry, ReportKeyEntry, SNAPSHOT_SCHEMA_VERSION};
use bolt_types::{Comment, Report, Snapshot, TargetType, Thread};

/// Canonical in-memory state, owned by the service and only touched under
/// its lock.
///
/// The publish queue is a derived view: it is rebuilt from the unpublished
/// threads after every reload and never persisted, so a crash can never
/// leave it out of step with the thread map.
#[derive(Debug, Default)]
pub struct FeedState {
    pub threads: HashMap<Uuid, Thread>,
    pub comments: HashMap<Uuid, Comment>,
    /// `(user_id, target_id)` pairs currently in the liked state.
    pub likes: HashSet<(Uuid, Uuid)>,
    pub reports: HashMap<Uuid, Report>,
    /// `(reporter, target type, target id)` -> existing report id.
    pub report_index: HashMap<(Uuid, TargetType, Uuid), Uuid>,
    /// Unpublished thread ids in creation order, oldest first.
    pub queue: VecDeque<Uuid>,
}

impl FeedState {
    /// Throws away everything in memory and repopulates from a snapshot.
    pub fn replace_from(&mut self, snapshot: Snapshot) {
        self.threads = snapshot.threads.into_iter().map(|t| (t.id, t)).collect();
        self.comments = snapshot.comments.into_iter().map(|c| (c.id, c)).collect();
        self.likes = snapshot
            .likes
            .into_iter()
            .map(|l| (l.user_id, l.target_id))
            .collect();
        self.reports = snapshot.reports.into_iter().map(|r| (r.id, r)).collect();
        self.report_index = snapshot
            .report_index
            .into_iter()
            .map(|e| ((e.reporter_id, e.target, e.target_id), e.report_id))
            .collect();
        self.rebuild_queue();
    }

    /// Serializable copy of the full state. Collections are sorted so two
    /// identical states always produce byte-identical snapshots.
    pub fn to_snapshot(&self) -> Snapshot {
        let mut threads: Vec<Thread> = self.threads.values().cloned().collect();
        threads.sort_by_key(|t| (t.created_at, t.id));

        let mut comments: Vec<Comment> = self.comments.values().cloned().collect();
        comments.sort_by_key(|c| (c.created_at, c.id));

        let mut likes: Vec<LikeEntry> = self
            .likes
            .iter()
            .map(|&(user_id, target_id)| LikeEntry { user_id, target_id })
            .collect();
        likes.sort_by_key(|l| (l.user_id, l.target_id));

        let mut reports: Vec<Report> = self.reports.values().cloned().collect();
        reports.sort_by_key(|r| (r.created_at, r.id));

        let mut report_index: Vec<ReportKeyEntry> = self
            .report_index
            .iter()
            .map(|(&(reporter_id, target, target_id), &report_id)| ReportKeyEntry {
                reporter_id,
                target,
                target_id,
                report_id,
            })
            .collect();
        report_index.sort_by_key(|e| (e.reporter_id, e.target_id, e.report_id));

        Snapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            threads,
            comments,
            likes,
            reports,
            report_index,
        }
    }

    /// Recomputes the queue from scratch: all unpublished threads, oldest
    /// creation first.
    pub fn rebuild_queue(&mut self) {
        let mut pending: Vec<(DateTime<Utc>, Uuid)> = self
            .threads
            .values()
            .filter(|t| t.published_at.is_none())
            .map(|t| (t.created_at, t.id))
            .collect();
        pending.sort();
        self.queue = pending.into_iter().map(|(_, id)| id).collect();
    }

    /// Most recent thread creation by this user, for the per-user cooldown.
    pub fn last_post_by(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.threads
            .values()
            .filter(|t| t.author_id == user_id)
            .map(|t| t.created_at)
            .max()
    }

    /// Most recent comment by this user, for the per-user cooldown.
    pub fn last_comment_by(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.comments
            .values()
            .filter(|c| c.author_id == user_id)
            .map(|c| c.created_at)
            .max()
    }

    pub fn comments_of(&self, thread_id: Uuid) -> impl Iterator<Item = &Comment> {
        self.comments
            .values()
            .filter(move |c| c.thread_id == thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolt_types::ThreadMode;
    use chrono::Duration;

    fn thread_at(created_at: DateTime<Utc>, published: bool) -> Thread {
        Thread {
            id: Uuid::new_v4(),
            mode: ThreadMode::Lightning,
            title: "t".into(),
            body: "b".into(),
            author_id: Uuid::new_v4(),
            author_name: "a".into(),
            created_at,
            updated_at: created_at,
            published_at: published.then_some(created_at),
            best_comment_id: None,
            likes: 0,
            comments: 0,
            reports: 0,
        }
    }

    #[test]
    fn queue_rebuilds_unpublished_in_creation_order() {
        let now = Utc::now();
        let mut state = FeedState::default();

        let newest = thread_at(now + Duration::seconds(2), false);
        let published = thread_at(now + Duration::seconds(1), true);
        let oldest = thread_at(now, false);

        for t in [&newest, &published, &oldest] {
            state.threads.insert(t.id, t.clone());
        }
        state.rebuild_queue();

        assert_eq!(state.queue, VecDeque::from([oldest.id, newest.id]));
    }

    #[test]
    fn snapshot_round_trip_preserves_everything() {
        let now = Utc::now();
        let mut state = FeedState::default();

        let t = thread_at(now, true);
        let pending = thread_at(now + Duration::seconds(1), false);
        state.threads.insert(t.id, t.clone());
        state.threads.insert(pending.id, pending.clone());

        let user = Uuid::new_v4();
        state.likes.insert((user, t.id));

        let report_id = Uuid::new_v4();
        state.reports.insert(
            report_id,
            Report {
                id: report_id,
                target: TargetType::Thread,
                target_id: t.id,
                thread_id: t.id,
                reporter_id: user,
                reporter_name: "r".into(),
                reason: "spam".into(),
                created_at: now,
            },
        );
        state
            .report_index
            .insert((user, TargetType::Thread, t.id), report_id);

        let mut restored = FeedState::default();
        restored.replace_from(state.to_snapshot());

        assert_eq!(restored.threads.len(), 2);
        assert!(restored.likes.contains(&(user, t.id)));
        assert_eq!(
            restored.report_index.get(&(user, TargetType::Thread, t.id)),
            Some(&report_id)
        );
        assert_eq!(restored.queue, VecDeque::from([pending.id]));
    }
}
