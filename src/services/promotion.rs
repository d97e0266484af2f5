//! Article promotion rules
//!
//! Decides whether an article may become featured or trending:
//!
//! - an article is never featured and trending at once
//! - at most [`MAX_FEATURED`] featured and [`MAX_TRENDING`] trending articles
//! - the [`HEADLINE_WINDOW`] newest articles cannot be promoted
//! - a trending article always carries a non-empty topic
//!
//! Checks run against fresh repository reads, then the write re-asserts them
//! atomically (see `ArticleRepository::try_feature`). Turning a flag off is
//! always allowed.

use crate::cache::Cache;
use crate::db::repositories::ArticleRepository;
use crate::models::{Article, FlagUpdate};
use crate::services::article::invalidate_article_cache;
use anyhow::Context;
use std::fmt;
use std::sync::Arc;

/// Featured cap
pub const MAX_FEATURED: i64 = 7;

/// Trending cap
pub const MAX_TRENDING: i64 = 7;

/// Number of newest articles protected from promotion
pub const HEADLINE_WINDOW: i64 = 4;

/// Longest accepted trending topic, in characters
pub const MAX_TOPIC_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionFlag {
    Featured,
    Trending,
}

impl PromotionFlag {
    fn verb(&self) -> &'static str {
        match self {
            PromotionFlag::Featured => "feature",
            PromotionFlag::Trending => "trend",
        }
    }
}

impl fmt::Display for PromotionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionFlag::Featured => write!(f, "featured"),
            PromotionFlag::Trending => write!(f, "trending"),
        }
    }
}

/// Rejections from the promotion rules. None of them leave a partial write.
#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("Article not found: {0}")]
    NotFound(i64),

    #[error("{0}")]
    Conflict(String),

    #[error("cannot {} more than {max} articles", .flag.verb())]
    LimitExceeded { flag: PromotionFlag, max: i64 },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PromotionError {
    fn conflict(reason: &str) -> Self {
        PromotionError::Conflict(reason.to_string())
    }
}

pub struct PromotionEngine {
    repo: Arc<dyn ArticleRepository>,
    cache: Arc<Cache>,
}

impl PromotionEngine {
    pub fn new(repo: Arc<dyn ArticleRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Turn the featured flag on or off and return the article as stored.
    ///
    /// Turning on checks, in order: existence, not trending, not a latest
    /// headline, featured cap.
    pub async fn request_feature(&self, id: i64, turn_on: bool) -> Result<Article, PromotionError> {
        let article = self.find(id).await?;

        if !turn_on {
            if !article.is_featured {
                return Ok(article);
            }
            return self.clear_flag(id, FlagUpdate::featured(false)).await;
        }

        if let Err(e) = self.check_feature(&article).await {
            tracing::debug!(id, reason = %e, "Feature request rejected");
            return Err(e);
        }

        let granted = self
            .repo
            .try_feature(id, MAX_FEATURED, HEADLINE_WINDOW)
            .await
            .context("Failed to write featured flag")?;
        if !granted {
            let e = self.explain_lost_write(id, PromotionFlag::Featured, None).await;
            tracing::debug!(id, reason = %e, "Feature write rejected");
            return Err(e);
        }

        invalidate_article_cache(&self.cache).await;
        tracing::info!(id, "Article featured");
        self.find(id).await
    }

    /// Turn the trending flag on or off and return the article as stored.
    ///
    /// Turning on checks, in order: existence, not featured, not a latest
    /// headline, trending cap, topic present. Turning off clears the topic in
    /// the same write.
    pub async fn request_trending(
        &self,
        id: i64,
        turn_on: bool,
        topic: Option<&str>,
    ) -> Result<Article, PromotionError> {
        let article = self.find(id).await?;

        if !turn_on {
            if !article.is_trending {
                return Ok(article);
            }
            return self.clear_flag(id, FlagUpdate::trending(None)).await;
        }

        let topic = match self.check_trending(&article, topic).await {
            Ok(topic) => topic,
            Err(e) => {
                tracing::debug!(id, reason = %e, "Trending request rejected");
                return Err(e);
            }
        };

        let granted = self
            .repo
            .try_trending(id, &topic, MAX_TRENDING, HEADLINE_WINDOW)
            .await
            .context("Failed to write trending flag")?;
        if !granted {
            let e = self
                .explain_lost_write(id, PromotionFlag::Trending, Some(&topic))
                .await;
            tracing::debug!(id, reason = %e, "Trending write rejected");
            return Err(e);
        }

        invalidate_article_cache(&self.cache).await;
        tracing::info!(id, topic = %topic, "Article trending");
        self.find(id).await
    }

    async fn find(&self, id: i64) -> Result<Article, PromotionError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load article")?
            .ok_or(PromotionError::NotFound(id))
    }

    async fn clear_flag(&self, id: i64, update: FlagUpdate) -> Result<Article, PromotionError> {
        let found = self
            .repo
            .update_flags(id, &update)
            .await
            .context("Failed to clear promotion flag")?;
        if !found {
            return Err(PromotionError::NotFound(id));
        }

        invalidate_article_cache(&self.cache).await;
        tracing::info!(id, ?update, "Promotion cleared");
        self.find(id).await
    }

    async fn check_feature(&self, article: &Article) -> Result<(), PromotionError> {
        if article.is_trending {
            return Err(PromotionError::conflict("already trending"));
        }
        if self.is_latest_headline(article.id).await? {
            return Err(PromotionError::conflict("is latest headline"));
        }
        if !article.is_featured {
            let featured = self
                .repo
                .count_featured()
                .await
                .context("Failed to count featured articles")?;
            if featured >= MAX_FEATURED {
                return Err(PromotionError::LimitExceeded {
                    flag: PromotionFlag::Featured,
                    max: MAX_FEATURED,
                });
            }
        }
        Ok(())
    }

    /// Runs the trending checks and returns the trimmed topic.
    async fn check_trending(&self, article: &Article, topic: Option<&str>) -> Result<String, PromotionError> {
        if article.is_featured {
            return Err(PromotionError::conflict("already featured"));
        }
        if self.is_latest_headline(article.id).await? {
            return Err(PromotionError::conflict("is latest headline"));
        }
        if !article.is_trending {
            let trending = self
                .repo
                .count_trending()
                .await
                .context("Failed to count trending articles")?;
            if trending >= MAX_TRENDING {
                return Err(PromotionError::LimitExceeded {
                    flag: PromotionFlag::Trending,
                    max: MAX_TRENDING,
                });
            }
        }

        let topic = topic.map(str::trim).unwrap_or_default();
        if topic.is_empty() {
            return Err(PromotionError::InvalidArgument("topic required".to_string()));
        }
        if topic.chars().count() > MAX_TOPIC_LEN {
            return Err(PromotionError::InvalidArgument(format!(
                "topic longer than {} characters",
                MAX_TOPIC_LEN
            )));
        }
        Ok(topic.to_string())
    }

    async fn is_latest_headline(&self, id: i64) -> Result<bool, PromotionError> {
        let latest = self
            .repo
            .latest_ids(HEADLINE_WINDOW)
            .await
            .context("Failed to load latest headlines")?;
        Ok(latest.contains(&id))
    }

    /// The guarded write matched nothing: something changed after the checks
    /// passed. Report whichever rule now fails.
    async fn explain_lost_write(&self, id: i64, flag: PromotionFlag, topic: Option<&str>) -> PromotionError {
        let article = match self.find(id).await {
            Ok(article) => article,
            Err(e) => return e,
        };
        let recheck = match flag {
            PromotionFlag::Featured => self.check_feature(&article).await,
            PromotionFlag::Trending => self.check_trending(&article, topic).await.map(|_| ()),
        };
        match recheck {
            Err(e) => e,
            Ok(()) => PromotionError::conflict("concurrent promotion change"),
        }
    }
}
