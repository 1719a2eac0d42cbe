use std::cmp::Ordering;

use uuid::Uuid;

use bolt_types::Comment;

/// Ranking order for a thread's comments: most likes first, earlier
/// creation wins ties, comment id as a final deterministic tiebreak.
pub fn rank_cmp(a: &Comment, b: &Comment) -> Ordering {
    b.likes
        .cmp(&a.likes)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.id.cmp(&b.id))
}

/// The comment currently deserving the spotlight, if any.
pub fn best_comment_id<'a>(comments: impl Iterator<Item = &'a Comment>) -> Option<Uuid> {
    comments.min_by(|a, b| rank_cmp(a, b)).map(|c| c.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn comment(likes: u64, age_secs: i64) -> Comment {
        let created_at = Utc::now() - Duration::seconds(age_secs);
        Comment {
            id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            body: "c".into(),
            author_id: Uuid::new_v4(),
            author_name: "a".into(),
            created_at,
            updated_at: created_at,
            likes,
            reports: 0,
        }
    }

    #[test]
    fn most_liked_comment_wins() {
        let low = comment(1, 10);
        let high = comment(5, 5);
        let comments = vec![low, high.clone()];
        assert_eq!(best_comment_id(comments.iter()), Some(high.id));
    }

    #[test]
    fn earlier_comment_wins_like_ties() {
        let newer = comment(3, 10);
        let older = comment(3, 60);
        let comments = vec![newer.clone(), older.clone()];
        assert_eq!(best_comment_id(comments.iter()), Some(older.id));
    }

    #[test]
    fn no_comments_means_no_best() {
        assert_eq!(best_comment_id(std::iter::empty()), None);
    }
}
