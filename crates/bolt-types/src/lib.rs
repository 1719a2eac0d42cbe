pub mod api;
pub mod error;
pub mod models;

pub use error::{FeedError, LimitCode};
pub use models::{Comment, Report, Snapshot, TargetType, Thread, ThreadMode};
