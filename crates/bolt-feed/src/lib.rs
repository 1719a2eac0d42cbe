pub mod config;
pub mod guard;
pub mod notify;
pub mod publish;
pub mod ranking;
pub mod service;
pub mod state;

pub use config::FeedConfig;
pub use notify::{AdminRoster, ModerationNotifier};
pub use service::FeedService;
