//! Dashboard statistics

use crate::db::repositories::{ArticleRepository, PushRepository, WebStoryRepository};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_articles: i64,
    pub featured_articles: i64,
    pub trending_articles: i64,
    pub total_views: i64,
    pub total_stories: i64,
    pub push_subscriptions: i64,
    pub notifications_sent: i64,
}

pub struct StatsService {
    articles: Arc<dyn ArticleRepository>,
    stories: Arc<dyn WebStoryRepository>,
    push: Arc<dyn PushRepository>,
}

impl StatsService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        stories: Arc<dyn WebStoryRepository>,
        push: Arc<dyn PushRepository>,
    ) -> Self {
        Self {
            articles,
            stories,
            push,
        }
    }

    /// Counts are read live; nothing here is cached.
    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let (total_articles, featured_articles, trending_articles, total_views) = tokio::try_join!(
            self.articles.count(None),
            self.articles.count_featured(),
            self.articles.count_trending(),
            self.articles.total_views(),
        )
        .context("Failed to load article stats")?;

        let (total_stories, push_subscriptions, notifications_sent) = tokio::try_join!(
            self.stories.count(),
            self.push.count_subscriptions(),
            self.push.count_notifications(),
        )
        .context("Failed to load story and push stats")?;

        Ok(DashboardStats {
            total_articles,
            featured_articles,
            trending_articles,
            total_views,
            total_stories,
            push_subscriptions,
            notifications_sent,
        })
    }
}
