//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod article;
pub mod push;
pub mod web_story;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use push::{PushRepository, SqlxPushRepository};
pub use web_story::{SqlxWebStoryRepository, WebStoryRepository};

/// Timestamps are stored with microsecond precision on both drivers, so
/// values are truncated before they are written or handed back.
pub(crate) mod timestamp {
    use chrono::{DateTime, SubsecRound, Utc};

    pub fn now() -> DateTime<Utc> {
        normalize(Utc::now())
    }

    pub fn normalize(at: DateTime<Utc>) -> DateTime<Utc> {
        at.trunc_subsecs(6)
    }
}
