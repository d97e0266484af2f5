//! Services layer - Business logic
//!
//! Services implement the newsroom rules on top of the repositories:
//! - validation and slug handling for articles and web stories
//! - the promotion rules for featured/trending articles
//! - cache read-through and invalidation for public read paths
//! - web-push fan-out, SEO scoring and dashboard counts

pub mod article;
pub mod promotion;
pub mod push;
pub mod seo;
pub mod stats;
pub mod web_story;

pub use article::{generate_slug, ArticleService, ArticleServiceError};
pub use promotion::{
    PromotionEngine, PromotionError, PromotionFlag, HEADLINE_WINDOW, MAX_FEATURED, MAX_TRENDING,
};
pub use push::{DeliveryOutcome, HttpPushDelivery, PushDelivery, PushService, PushServiceError};
pub use seo::{analyze as analyze_seo, SeoCheck, SeoInput, SeoReport};
pub use stats::{DashboardStats, StatsService};
pub use web_story::{WebStoryService, WebStoryServiceError};
