use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use bolt_store::SnapshotGateway;
use bolt_types::api::{
    CreatedThread, FeedStats, LikeState, NewComment, NewThread, Page, ReportOutcome, ThreadEdit,
};
use bolt_types::{Comment, FeedError, LimitCode, Report, TargetType, Thread};

use crate::config::FeedConfig;
use crate::guard::AbuseGuard;
use crate::notify::ModerationNotifier;
use crate::ranking;
use crate::state::FeedState;

struct Inner {
    state: FeedState,
    guard: AbuseGuard,
    /// Store mtime observed at the last reload or save. A matching value
    /// makes `refresh` a cheap no-op.
    known_mtime: Option<DateTime<Utc>>,
    /// Earliest moment the next thread may publish. Process-local; after a
    /// restart the first drain tick releases immediately.
    next_publish_at: DateTime<Utc>,
}

/// The feed. One lock serializes every operation, so each call is an
/// atomic "observe latest disk state, mutate, persist" unit within this
/// process. Across processes sharing a store, consistency is eventual and
/// last-full-write-wins at snapshot granularity.
pub struct FeedService {
    inner: Mutex<Inner>,
    gateway: Arc<dyn SnapshotGateway>,
    notifier: Arc<dyn ModerationNotifier>,
    config: FeedConfig,
}

impl FeedService {
    pub fn new(
        gateway: Arc<dyn SnapshotGateway>,
        notifier: Arc<dyn ModerationNotifier>,
        config: FeedConfig,
    ) -> Result<Self, FeedError> {
        let service = Self {
            inner: Mutex::new(Inner {
                state: FeedState::default(),
                guard: AbuseGuard::new(),
                known_mtime: None,
                next_publish_at: DateTime::UNIX_EPOCH,
            }),
            gateway,
            notifier,
            config,
        };
        {
            let mut inner = service.locked()?;
            service.refresh(&mut inner, true)?;
        }
        Ok(service)
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    // -- Threads --

    pub fn create_thread(&self, req: NewThread) -> Result<CreatedThread, FeedError> {
        self.create_thread_at(req, Utc::now())
    }

    pub fn create_thread_at(
        &self,
        req: NewThread,
        now: DateTime<Utc>,
    ) -> Result<CreatedThread, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        check_author(req.author_id, &req.author_name)?;
        check_text(&req.title, self.config.max_title_len, "title")?;
        check_text(&req.body, self.config.max_body_len, "body")?;

        let last_post = inner.state.last_post_by(req.author_id);
        inner
            .guard
            .admit_post(req.author_id, last_post, now, &self.config)?;

        let publish_now = inner.state.queue.is_empty() && now >= inner.next_publish_at;
        if !publish_now && inner.state.queue.len() >= self.config.queue_max_size {
            return Err(FeedError::rate_limited(
                LimitCode::QueueFull,
                "The publish queue is full. Please try again later.",
            ));
        }

        let mut thread = Thread {
            id: Uuid::new_v4(),
            mode: req.mode,
            title: req.title,
            body: req.body,
            author_id: req.author_id,
            author_name: req.author_name,
            created_at: now,
            updated_at: now,
            published_at: None,
            best_comment_id: None,
            likes: 0,
            comments: 0,
            reports: 0,
        };

        let (queued, queue_position) = if publish_now {
            thread.published_at = Some(now);
            inner.next_publish_at = now + self.config.publish_interval;
            (false, 0)
        } else {
            inner.state.queue.push_back(thread.id);
            (true, inner.state.queue.len())
        };

        inner.state.threads.insert(thread.id, thread.clone());
        self.persist(&mut inner)?;

        info!(thread_id = %thread.id, queued, "Thread created");
        Ok(CreatedThread {
            thread,
            queued,
            queue_position,
            next_publish_at: inner.next_publish_at,
        })
    }

    pub fn edit_thread(
        &self,
        thread_id: Uuid,
        editor_id: Uuid,
        edit: ThreadEdit,
    ) -> Result<Thread, FeedError> {
        self.edit_thread_at(thread_id, editor_id, edit, Utc::now())
    }

    pub fn edit_thread_at(
        &self,
        thread_id: Uuid,
        editor_id: Uuid,
        edit: ThreadEdit,
        now: DateTime<Utc>,
    ) -> Result<Thread, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        check_text(&edit.title, self.config.max_title_len, "title")?;
        check_text(&edit.body, self.config.max_body_len, "body")?;

        let thread = inner
            .state
            .threads
            .get_mut(&thread_id)
            .ok_or_else(|| FeedError::NotFound(format!("thread {thread_id} not found")))?;
        if thread.author_id != editor_id {
            return Err(FeedError::Forbidden(
                "only the author can edit this thread".into(),
            ));
        }

        thread.title = edit.title;
        thread.body = edit.body;
        thread.updated_at = now;
        let updated = thread.clone();

        self.persist(&mut inner)?;
        Ok(updated)
    }

    // -- Comments --

    pub fn add_comment(&self, thread_id: Uuid, req: NewComment) -> Result<Comment, FeedError> {
        self.add_comment_at(thread_id, req, Utc::now())
    }

    pub fn add_comment_at(
        &self,
        thread_id: Uuid,
        req: NewComment,
        now: DateTime<Utc>,
    ) -> Result<Comment, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        check_author(req.author_id, &req.author_name)?;
        check_text(&req.body, self.config.max_comment_len, "comment")?;

        let thread = inner
            .state
            .threads
            .get(&thread_id)
            .ok_or_else(|| FeedError::NotFound(format!("thread {thread_id} not found")))?;
        if thread.published_at.is_none() {
            return Err(FeedError::Validation(
                "comments are only allowed on published threads".into(),
            ));
        }

        let last_comment = inner.state.last_comment_by(req.author_id);
        inner
            .guard
            .admit_comment(req.author_id, last_comment, now, &self.config)?;

        let comment = Comment {
            id: Uuid::new_v4(),
            thread_id,
            body: req.body,
            author_id: req.author_id,
            author_name: req.author_name,
            created_at: now,
            updated_at: now,
            likes: 0,
            reports: 0,
        };
        inner.state.comments.insert(comment.id, comment.clone());
        if let Some(thread) = inner.state.threads.get_mut(&thread_id) {
            thread.comments += 1;
        }

        let spotlight = self.recompute_best(&mut inner, thread_id);
        self.persist(&mut inner)?;

        if let Some((thread, best)) = spotlight {
            self.notifier.best_comment_changed(&thread, &best);
        }
        Ok(comment)
    }

    pub fn edit_comment(
        &self,
        comment_id: Uuid,
        editor_id: Uuid,
        body: String,
    ) -> Result<Comment, FeedError> {
        self.edit_comment_at(comment_id, editor_id, body, Utc::now())
    }

    pub fn edit_comment_at(
        &self,
        comment_id: Uuid,
        editor_id: Uuid,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Comment, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        check_text(&body, self.config.max_comment_len, "comment")?;

        let comment = inner
            .state
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| FeedError::NotFound(format!("comment {comment_id} not found")))?;
        if comment.author_id != editor_id {
            return Err(FeedError::Forbidden(
                "only the author can edit this comment".into(),
            ));
        }

        comment.body = body;
        comment.updated_at = now;
        let updated = comment.clone();

        self.persist(&mut inner)?;
        Ok(updated)
    }

    // -- Likes --

    pub fn set_thread_like(
        &self,
        thread_id: Uuid,
        user_id: Uuid,
        liked: bool,
    ) -> Result<LikeState, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        if user_id.is_nil() {
            return Err(FeedError::Validation("missing user id".into()));
        }
        let current_likes = inner
            .state
            .threads
            .get(&thread_id)
            .map(|t| t.likes)
            .ok_or_else(|| FeedError::NotFound(format!("thread {thread_id} not found")))?;

        let key = (user_id, thread_id);
        let currently = inner.state.likes.contains(&key);
        if liked == currently {
            // Idempotent no-op: report state without double counting.
            return Ok(LikeState {
                liked: currently,
                likes: current_likes,
            });
        }

        if liked {
            inner.state.likes.insert(key);
        } else {
            inner.state.likes.remove(&key);
        }
        let likes = {
            let thread = inner
                .state
                .threads
                .get_mut(&thread_id)
                .ok_or_else(|| FeedError::NotFound(format!("thread {thread_id} not found")))?;
            thread.likes = if liked {
                thread.likes + 1
            } else {
                thread.likes.saturating_sub(1)
            };
            thread.likes
        };

        self.persist(&mut inner)?;
        Ok(LikeState { liked, likes })
    }

    pub fn set_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        liked: bool,
    ) -> Result<LikeState, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        if user_id.is_nil() {
            return Err(FeedError::Validation("missing user id".into()));
        }
        let (thread_id, current_likes) = inner
            .state
            .comments
            .get(&comment_id)
            .map(|c| (c.thread_id, c.likes))
            .ok_or_else(|| FeedError::NotFound(format!("comment {comment_id} not found")))?;

        let key = (user_id, comment_id);
        let currently = inner.state.likes.contains(&key);
        if liked == currently {
            return Ok(LikeState {
                liked: currently,
                likes: current_likes,
            });
        }

        if liked {
            inner.state.likes.insert(key);
        } else {
            inner.state.likes.remove(&key);
        }
        let likes = {
            let comment = inner
                .state
                .comments
                .get_mut(&comment_id)
                .ok_or_else(|| FeedError::NotFound(format!("comment {comment_id} not found")))?;
            comment.likes = if liked {
                comment.likes + 1
            } else {
                comment.likes.saturating_sub(1)
            };
            comment.likes
        };

        // Comment like totals feed the ranking, so the parent thread's best
        // comment may change.
        let spotlight = self.recompute_best(&mut inner, thread_id);
        self.persist(&mut inner)?;

        if let Some((thread, best)) = spotlight {
            self.notifier.best_comment_changed(&thread, &best);
        }
        Ok(LikeState { liked, likes })
    }

    // -- Reports --

    pub fn report_thread(
        &self,
        thread_id: Uuid,
        reporter_id: Uuid,
        reporter_name: &str,
        reason: &str,
    ) -> Result<ReportOutcome, FeedError> {
        self.report_thread_at(thread_id, reporter_id, reporter_name, reason, Utc::now())
    }

    pub fn report_thread_at(
        &self,
        thread_id: Uuid,
        reporter_id: Uuid,
        reporter_name: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ReportOutcome, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        check_author(reporter_id, reporter_name)?;
        check_text(reason, self.config.max_comment_len, "reason")?;

        let title = inner
            .state
            .threads
            .get(&thread_id)
            .map(|t| t.title.clone())
            .ok_or_else(|| FeedError::NotFound(format!("thread {thread_id} not found")))?;
        let summary = format!("Thread '{title}' reported by {reporter_name}: {reason}");

        self.file_report(
            &mut inner,
            TargetType::Thread,
            thread_id,
            thread_id,
            reporter_id,
            reporter_name,
            reason,
            summary,
            now,
        )
    }

    pub fn report_comment(
        &self,
        comment_id: Uuid,
        reporter_id: Uuid,
        reporter_name: &str,
        reason: &str,
    ) -> Result<ReportOutcome, FeedError> {
        self.report_comment_at(comment_id, reporter_id, reporter_name, reason, Utc::now())
    }

    pub fn report_comment_at(
        &self,
        comment_id: Uuid,
        reporter_id: Uuid,
        reporter_name: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ReportOutcome, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        check_author(reporter_id, reporter_name)?;
        check_text(reason, self.config.max_comment_len, "reason")?;

        let thread_id = inner
            .state
            .comments
            .get(&comment_id)
            .map(|c| c.thread_id)
            .ok_or_else(|| FeedError::NotFound(format!("comment {comment_id} not found")))?;
        let title = inner
            .state
            .threads
            .get(&thread_id)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        let summary = format!("Comment on '{title}' reported by {reporter_name}: {reason}");

        self.file_report(
            &mut inner,
            TargetType::Comment,
            comment_id,
            thread_id,
            reporter_id,
            reporter_name,
            reason,
            summary,
            now,
        )
    }

    // -- Reads --

    /// Published threads, newest publication first.
    pub fn list_threads(&self, page: Page) -> Result<Vec<Thread>, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        let mut published: Vec<Thread> = inner
            .state
            .threads
            .values()
            .filter(|t| t.published_at.is_some())
            .cloned()
            .collect();
        published.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(page_of(published, page))
    }

    /// A thread's comments in ranking order.
    pub fn top_comments(&self, thread_id: Uuid, page: Page) -> Result<Vec<Comment>, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        if !inner.state.threads.contains_key(&thread_id) {
            return Err(FeedError::NotFound(format!("thread {thread_id} not found")));
        }
        let mut comments: Vec<Comment> = inner.state.comments_of(thread_id).cloned().collect();
        comments.sort_by(|a, b| ranking::rank_cmp(a, b));
        Ok(page_of(comments, page))
    }

    /// When the thread last received a comment, if ever.
    pub fn last_comment_time(&self, thread_id: Uuid) -> Result<Option<DateTime<Utc>>, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        if !inner.state.threads.contains_key(&thread_id) {
            return Err(FeedError::NotFound(format!("thread {thread_id} not found")));
        }
        Ok(inner.state.comments_of(thread_id).map(|c| c.created_at).max())
    }

    pub fn stats(&self) -> Result<FeedStats, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        let published = inner
            .state
            .threads
            .values()
            .filter(|t| t.published_at.is_some())
            .count() as u64;
        Ok(FeedStats {
            threads: inner.state.threads.len() as u64,
            published_threads: published,
            queued_threads: inner.state.queue.len() as u64,
            comments: inner.state.comments.len() as u64,
            reports: inner.state.reports.len() as u64,
            likes: inner.state.likes.len() as u64,
        })
    }

    // -- Publishing --

    /// Releases queued threads that are due. Called by the background drain
    /// loop once per second; returns how many threads were published.
    pub fn drain_tick(&self, now: DateTime<Utc>) -> Result<usize, FeedError> {
        let mut inner = self.locked()?;
        self.refresh(&mut inner, false)?;

        let mut released = 0;
        while now >= inner.next_publish_at {
            // Skip queue entries that no longer need publishing; another
            // instance may have published them under our feet.
            let due = loop {
                match inner.state.queue.pop_front() {
                    Some(id) => match inner.state.threads.get(&id) {
                        Some(t) if t.published_at.is_none() => break Some(id),
                        _ => continue,
                    },
                    None => break None,
                }
            };
            let Some(id) = due else { break };

            if let Some(thread) = inner.state.threads.get_mut(&id) {
                thread.published_at = Some(now);
                info!(thread_id = %id, "Thread published from queue");
            }
            inner.next_publish_at = now + self.config.publish_interval;
            released += 1;
        }

        if released > 0 {
            self.persist(&mut inner)?;
        }
        Ok(released)
    }

    // -- Internals --

    fn locked(&self) -> Result<MutexGuard<'_, Inner>, FeedError> {
        self.inner
            .lock()
            .map_err(|e| FeedError::Persistence(anyhow!("feed lock poisoned: {}", e)))
    }

    /// Reloads from the gateway when its mtime moved (or when forced), then
    /// rebuilds the derived publish queue.
    fn refresh(&self, inner: &mut Inner, force: bool) -> Result<(), FeedError> {
        let disk = self.gateway.last_modified()?;
        if !force && disk == inner.known_mtime {
            return Ok(());
        }
        let snapshot = self.gateway.load()?.unwrap_or_default();
        inner.state.replace_from(snapshot);
        inner.known_mtime = disk;
        debug!("Reloaded snapshot from store");
        Ok(())
    }

    /// Writes the full snapshot synchronously. A failure here escalates to
    /// the caller; there is no transparent retry.
    fn persist(&self, inner: &mut Inner) -> Result<(), FeedError> {
        let snapshot = inner.state.to_snapshot();
        self.gateway.save(&snapshot)?;
        inner.known_mtime = self.gateway.last_modified()?;
        Ok(())
    }

    /// Re-ranks a thread's comments. Returns the (thread, new best) pair
    /// when the spotlight moved, for notification after persist.
    fn recompute_best(&self, inner: &mut Inner, thread_id: Uuid) -> Option<(Thread, Comment)> {
        let winner = ranking::best_comment_id(inner.state.comments_of(thread_id));
        let thread = inner.state.threads.get_mut(&thread_id)?;
        if thread.best_comment_id == winner {
            return None;
        }
        thread.best_comment_id = winner;
        let thread = thread.clone();
        let comment = inner.state.comments.get(&winner?)?.clone();
        Some((thread, comment))
    }

    #[allow(clippy::too_many_arguments)]
    fn file_report(
        &self,
        inner: &mut Inner,
        target: TargetType,
        target_id: Uuid,
        thread_id: Uuid,
        reporter_id: Uuid,
        reporter_name: &str,
        reason: &str,
        summary: String,
        now: DateTime<Utc>,
    ) -> Result<ReportOutcome, FeedError> {
        let key = (reporter_id, target, target_id);
        if let Some(&existing) = inner.state.report_index.get(&key) {
            // Duplicate: no mutation, no notification.
            let total = target_report_count(inner, target, target_id);
            return Ok(ReportOutcome {
                report_id: existing,
                duplicate: true,
                total_reports: total,
            });
        }

        let report = Report {
            id: Uuid::new_v4(),
            target,
            target_id,
            thread_id,
            reporter_id,
            reporter_name: reporter_name.to_string(),
            reason: reason.to_string(),
            created_at: now,
        };
        inner.state.report_index.insert(key, report.id);
        inner.state.reports.insert(report.id, report.clone());

        match target {
            TargetType::Thread => {
                if let Some(t) = inner.state.threads.get_mut(&target_id) {
                    t.reports += 1;
                }
            }
            TargetType::Comment => {
                if let Some(c) = inner.state.comments.get_mut(&target_id) {
                    c.reports += 1;
                }
            }
        }
        let total = target_report_count(inner, target, target_id);

        self.persist(inner)?;
        self.notifier.report_filed(&report, &summary);

        Ok(ReportOutcome {
            report_id: report.id,
            duplicate: false,
            total_reports: total,
        })
    }
}

fn target_report_count(inner: &Inner, target: TargetType, target_id: Uuid) -> u64 {
    match target {
        TargetType::Thread => inner
            .state
            .threads
            .get(&target_id)
            .map(|t| t.reports)
            .unwrap_or(0),
        TargetType::Comment => inner
            .state
            .comments
            .get(&target_id)
            .map(|c| c.reports)
            .unwrap_or(0),
    }
}

fn page_of<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.page.saturating_mul(page.per_page))
        .take(page.per_page)
        .collect()
}

fn check_author(id: Uuid, name: &str) -> Result<(), FeedError> {
    if id.is_nil() {
        return Err(FeedError::Validation("missing user id".into()));
    }
    if name.trim().is_empty() {
        return Err(FeedError::Validation("missing user name".into()));
    }
    Ok(())
}

fn check_text(value: &str, max: usize, field: &str) -> Result<(), FeedError> {
    if value.trim().is_empty() {
        return Err(FeedError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(FeedError::Validation(format!(
            "{field} exceeds {max} characters"
        )));
    }
    Ok(())
}
