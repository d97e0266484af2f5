//! Article model
//!
//! This module provides:
//! - `Article` entity, including its promotion flags
//! - Input types for creating and updating articles
//! - `FlagUpdate`, the only shape in which promotion flags are written

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// News article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug
    pub slug: String,
    /// Headline
    pub title: String,
    /// Short summary, also used as the meta description
    pub summary: String,
    /// HTML body produced by the editor
    pub content: String,
    /// Byline
    pub author: String,
    /// Lead image hosted on the CDN
    #[serde(default)]
    pub image_url: Option<String>,
    /// Ordered, de-duplicated category labels (never empty)
    pub categories: Vec<String>,
    /// Keyword the SEO checks look for
    #[serde(default)]
    pub focus_keyword: Option<String>,
    /// Curated homepage promotion
    pub is_featured: bool,
    /// Curated promotion under a topic label
    pub is_trending: bool,
    /// Present exactly when `is_trending` is set
    #[serde(default)]
    pub trending_topic: Option<String>,
    /// Public page views
    #[serde(default)]
    pub view_count: i64,
    /// Creation timestamp; drives the latest-headlines window
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Whether the article carries either promotion flag
    pub fn is_promoted(&self) -> bool {
        self.is_featured || self.is_trending
    }
}

/// Input for creating a new article
///
/// Promotion flags are not part of the input: articles always start
/// unpromoted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateArticleInput {
    /// Slug; generated from the title when blank
    #[serde(default)]
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub focus_keyword: Option<String>,
    /// Backdated creation time for imports; `None` means now
    #[serde(skip)]
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateArticleInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>, categories: Vec<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            categories,
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_focus_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.focus_keyword = Some(keyword.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Input for updating an existing article
///
/// Absent fields keep their stored value. An empty `image_url` or
/// `focus_keyword` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateArticleInput {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub categories: Option<Vec<String>>,
    pub focus_keyword: Option<String>,
}

impl UpdateArticleInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.slug.is_some()
            || self.title.is_some()
            || self.summary.is_some()
            || self.content.is_some()
            || self.author.is_some()
            || self.image_url.is_some()
            || self.categories.is_some()
            || self.focus_keyword.is_some()
    }
}

/// Flag write issued by the promotion engine
///
/// `is_trending` and `trending_topic` are always written together: setting
/// `is_trending` to `false` clears the topic in the same statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagUpdate {
    pub is_featured: Option<bool>,
    pub is_trending: Option<bool>,
    pub trending_topic: Option<String>,
}

impl FlagUpdate {
    pub fn featured(on: bool) -> Self {
        Self {
            is_featured: Some(on),
            ..Default::default()
        }
    }

    /// `Some(topic)` marks the article trending under `topic`; `None` clears both.
    pub fn trending(topic: Option<String>) -> Self {
        Self {
            is_featured: None,
            is_trending: Some(topic.is_some()),
            trending_topic: topic,
        }
    }
}

/// Trim labels, drop blanks and exact duplicates, keep first-seen order.
pub fn normalize_categories<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() || out.iter().any(|seen| seen == label) {
            continue;
        }
        out.push(label.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_categories_trims_and_dedupes() {
        let labels = vec!["  Politics ", "Sports", "", "Politics", "   ", "World"];
        assert_eq!(
            normalize_categories(&labels),
            vec!["Politics".to_string(), "Sports".to_string(), "World".to_string()]
        );
    }

    #[test]
    fn test_normalize_categories_is_case_sensitive() {
        let labels = ["sports", "Sports"];
        assert_eq!(normalize_categories(&labels).len(), 2);
    }

    #[test]
    fn test_flag_update_trending_off_clears_topic() {
        let update = FlagUpdate::trending(None);
        assert_eq!(update.is_trending, Some(false));
        assert_eq!(update.trending_topic, None);
        assert_eq!(update.is_featured, None);

        let update = FlagUpdate::trending(Some("Election2026".into()));
        assert_eq!(update.is_trending, Some(true));
        assert_eq!(update.trending_topic.as_deref(), Some("Election2026"));
    }

    #[test]
    fn test_create_input_ignores_created_at_from_json() {
        let json = r#"{"title":"T","content":"C","categories":["a"],"created_at":"2001-01-01T00:00:00Z"}"#;
        let input: CreateArticleInput = serde_json::from_str(json).unwrap();
        assert!(input.created_at.is_none());
        assert!(input.slug.is_empty());
    }

    #[test]
    fn test_update_input_has_changes() {
        assert!(!UpdateArticleInput::new().has_changes());
        assert!(UpdateArticleInput::new().with_title("x").has_changes());
    }
}
