//! Data models
//!
//! Entities persisted by the repositories (articles, web stories, push
//! subscriptions and notification records) together with the request and
//! pagination types the services and API share.

mod article;
mod pagination;
mod push;
mod web_story;

pub use article::{
    normalize_categories, Article, CreateArticleInput, FlagUpdate, UpdateArticleInput,
};
pub use pagination::{ListParams, PagedResult};
pub use push::{
    DeliveryReport, PushMessage, PushNotification, PushSubscription, SubscribeInput,
    SubscriptionKeys,
};
pub use web_story::{CreateWebStoryInput, StorySlide, UpdateWebStoryInput, WebStory};
