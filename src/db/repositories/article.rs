//! Article repository
//!
//! Database operations for articles.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and MySQL
//!
//! Promotion flags are only ever written through [`ArticleRepository::update_flags`]
//! (turning a flag off) or the conditional writes [`ArticleRepository::try_feature`]
//! and [`ArticleRepository::try_trending`], which re-assert exclusivity, the cap
//! and the latest-headlines window in the same atomic step as the write.

use super::timestamp;
use crate::config::DatabaseDriver;
use crate::db::{pool, DynDatabasePool};
use crate::models::{Article, CreateArticleInput, FlagUpdate, UpdateArticleInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const ARTICLE_COLUMNS: &str = "id, slug, title, summary, content, author, image_url, categories, focus_keyword, is_featured, is_trending, trending_topic, view_count, created_at, updated_at";

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article with both promotion flags cleared
    async fn create(&self, input: &CreateArticleInput) -> Result<Article>;

    /// Get article by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Get article by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// List articles newest first, optionally restricted to one category label
    async fn list(&self, category: Option<&str>, offset: i64, limit: i64) -> Result<Vec<Article>>;

    /// Count articles, optionally restricted to one category label
    async fn count(&self, category: Option<&str>) -> Result<i64>;

    /// All featured articles, newest first
    async fn list_featured(&self) -> Result<Vec<Article>>;

    /// All trending articles, newest first
    async fn list_trending(&self) -> Result<Vec<Article>>;

    /// The `n` most recently created articles
    async fn latest(&self, n: i64) -> Result<Vec<Article>>;

    /// Ids of the `n` most recently created articles (`created_at` desc, then `id` desc)
    async fn latest_ids(&self, n: i64) -> Result<Vec<i64>>;

    async fn count_featured(&self) -> Result<i64>;

    async fn count_trending(&self) -> Result<i64>;

    /// Search title and summary
    async fn search(&self, keyword: &str, offset: i64, limit: i64) -> Result<Vec<Article>>;

    async fn count_search(&self, keyword: &str) -> Result<i64>;

    /// Update editorial fields; promotion flags are left untouched
    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article>;

    /// Delete an article; returns false if it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    async fn exists_by_slug_excluding(&self, slug: &str, exclude_id: i64) -> Result<bool>;

    /// Unconditional flag write; returns false if the article does not exist
    async fn update_flags(&self, id: i64, update: &FlagUpdate) -> Result<bool>;

    /// Set `is_featured` only if the article is not trending, fewer than
    /// `max` other articles are featured and the article is outside the
    /// `window` most recent ones. Returns whether the write happened.
    async fn try_feature(&self, id: i64, max: i64, window: i64) -> Result<bool>;

    /// Set `is_trending` and `trending_topic` under the mirrored conditions.
    async fn try_trending(&self, id: i64, topic: &str, max: i64, window: i64) -> Result<bool>;

    /// Increment the view counter; returns false if the article does not exist
    async fn record_view(&self, id: i64) -> Result<bool>;

    /// Sum of all view counters
    async fn total_views(&self) -> Result<i64>;
}

/// SQLx-based article repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Flag a conditional promotion write is trying to set
#[derive(Debug, Clone, Copy)]
enum Promotion<'a> {
    Featured,
    Trending(&'a str),
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, input: &CreateArticleInput) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_article_sqlite(pool::sqlite(&self.pool)?, input).await,
            DatabaseDriver::Mysql => create_article_mysql(pool::mysql(&self.pool)?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_article_by_id_sqlite(pool::sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_article_by_id_mysql(pool::mysql(&self.pool)?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_article_by_slug_sqlite(pool::sqlite(&self.pool)?, slug).await,
            DatabaseDriver::Mysql => get_article_by_slug_mysql(pool::mysql(&self.pool)?, slug).await,
        }
    }

    async fn list(&self, category: Option<&str>, offset: i64, limit: i64) -> Result<Vec<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_articles_sqlite(pool::sqlite(&self.pool)?, category, offset, limit).await
            }
            DatabaseDriver::Mysql => {
                list_articles_mysql(pool::mysql(&self.pool)?, category, offset, limit).await
            }
        }
    }

    async fn count(&self, category: Option<&str>) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_articles_sqlite(pool::sqlite(&self.pool)?, category).await,
            DatabaseDriver::Mysql => count_articles_mysql(pool::mysql(&self.pool)?, category).await,
        }
    }

    async fn list_featured(&self) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE is_featured = 1 ORDER BY created_at DESC, id DESC",
            ARTICLE_COLUMNS
        );
        self.fetch_articles(&sql).await
    }

    async fn list_trending(&self) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE is_trending = 1 ORDER BY created_at DESC, id DESC",
            ARTICLE_COLUMNS
        );
        self.fetch_articles(&sql).await
    }

    async fn latest(&self, n: i64) -> Result<Vec<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_articles_sqlite(pool::sqlite(&self.pool)?, None, 0, n).await,
            DatabaseDriver::Mysql => list_articles_mysql(pool::mysql(&self.pool)?, None, 0, n).await,
        }
    }

    async fn latest_ids(&self, n: i64) -> Result<Vec<i64>> {
        let sql = "SELECT id FROM articles ORDER BY created_at DESC, id DESC LIMIT ?";
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(n)
                    .fetch_all(pool::sqlite(&self.pool)?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(n)
                    .fetch_all(pool::mysql(&self.pool)?)
                    .await
            }
        };
        ids.context("Failed to load latest article ids")
    }

    async fn count_featured(&self) -> Result<i64> {
        self.count_where("SELECT COUNT(*) FROM articles WHERE is_featured = 1")
            .await
            .context("Failed to count featured articles")
    }

    async fn count_trending(&self) -> Result<i64> {
        self.count_where("SELECT COUNT(*) FROM articles WHERE is_trending = 1")
            .await
            .context("Failed to count trending articles")
    }

    async fn search(&self, keyword: &str, offset: i64, limit: i64) -> Result<Vec<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                search_articles_sqlite(pool::sqlite(&self.pool)?, keyword, offset, limit).await
            }
            DatabaseDriver::Mysql => {
                search_articles_mysql(pool::mysql(&self.pool)?, keyword, offset, limit).await
            }
        }
    }

    async fn count_search(&self, keyword: &str) -> Result<i64> {
        let pattern = format!("%{}%", keyword);
        let sql = "SELECT COUNT(*) FROM articles WHERE title LIKE ? OR summary LIKE ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_one(pool::sqlite(&self.pool)?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_one(pool::mysql(&self.pool)?)
                    .await
            }
        };
        count.context("Failed to count search results")
    }

    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_article_sqlite(pool::sqlite(&self.pool)?, id, input).await,
            DatabaseDriver::Mysql => update_article_mysql(pool::mysql(&self.pool)?, id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM articles WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(pool::sqlite(&self.pool)?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(pool::mysql(&self.pool)?)
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(affected.context("Failed to delete article")? > 0)
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        self.exists_by_slug_excluding(slug, 0).await
    }

    async fn exists_by_slug_excluding(&self, slug: &str, exclude_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM articles WHERE slug = ? AND id <> ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(slug)
                    .bind(exclude_id)
                    .fetch_one(pool::sqlite(&self.pool)?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(slug)
                    .bind(exclude_id)
                    .fetch_one(pool::mysql(&self.pool)?)
                    .await
            }
        };
        Ok(count.context("Failed to check slug existence")? > 0)
    }

    async fn update_flags(&self, id: i64, update: &FlagUpdate) -> Result<bool> {
        // The topic column follows is_trending whenever is_trending is written.
        let sql = r#"
            UPDATE articles
            SET is_featured = COALESCE(?, is_featured),
                is_trending = COALESCE(?, is_trending),
                trending_topic = CASE WHEN ? THEN ? ELSE trending_topic END,
                updated_at = ?
            WHERE id = ?
        "#;
        let writes_trending = update.is_trending.is_some();
        let topic = match update.is_trending {
            Some(true) => update.trending_topic.as_deref(),
            _ => None,
        };
        let now = timestamp::now();

        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(update.is_featured)
                .bind(update.is_trending)
                .bind(writes_trending)
                .bind(topic)
                .bind(now)
                .bind(id)
                .execute(pool::sqlite(&self.pool)?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(update.is_featured)
                .bind(update.is_trending)
                .bind(writes_trending)
                .bind(topic)
                .bind(now)
                .bind(id)
                .execute(pool::mysql(&self.pool)?)
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(affected.context("Failed to update article flags")? > 0)
    }

    async fn try_feature(&self, id: i64, max: i64, window: i64) -> Result<bool> {
        self.try_promote(id, Promotion::Featured, max, window).await
    }

    async fn try_trending(&self, id: i64, topic: &str, max: i64, window: i64) -> Result<bool> {
        self.try_promote(id, Promotion::Trending(topic), max, window).await
    }

    async fn record_view(&self, id: i64) -> Result<bool> {
        let sql = "UPDATE articles SET view_count = view_count + 1 WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(pool::sqlite(&self.pool)?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(pool::mysql(&self.pool)?)
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(affected.context("Failed to record article view")? > 0)
    }

    async fn total_views(&self) -> Result<i64> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => "SELECT COALESCE(SUM(view_count), 0) FROM articles",
            // SUM over BIGINT yields DECIMAL on MySQL.
            DatabaseDriver::Mysql => "SELECT CAST(COALESCE(SUM(view_count), 0) AS SIGNED) FROM articles",
        };
        self.count_where(sql).await.context("Failed to sum article views")
    }
}

impl SqlxArticleRepository {
    async fn count_where(&self, sql: &str) -> Result<i64> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(pool::sqlite(&self.pool)?)
                    .await?
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(pool::mysql(&self.pool)?)
                    .await?
            }
        };
        Ok(count)
    }

    async fn fetch_articles(&self, sql: &str) -> Result<Vec<Article>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .fetch_all(pool::sqlite(&self.pool)?)
                    .await
                    .context("Failed to list articles")?;
                rows.iter().map(row_to_article_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .fetch_all(pool::mysql(&self.pool)?)
                    .await
                    .context("Failed to list articles")?;
                rows.iter().map(row_to_article_mysql).collect()
            }
        }
    }

    async fn try_promote(&self, id: i64, promotion: Promotion<'_>, max: i64, window: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                try_promote_sqlite(pool::sqlite(&self.pool)?, id, promotion, max, window).await
            }
            DatabaseDriver::Mysql => {
                try_promote_mysql(pool::mysql(&self.pool)?, id, promotion, max, window).await
            }
        }
    }
}

fn parse_categories(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("Invalid categories column: {}", raw))
}

fn encode_categories(categories: &[String]) -> Result<String> {
    serde_json::to_string(categories).context("Failed to encode categories")
}

/// Merge an optional clearable text field: `Some("")` clears, `None` keeps.
fn merge_clearable(input: &Option<String>, existing: &Option<String>) -> Option<String> {
    match input {
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(value.clone()),
        None => existing.clone(),
    }
}

fn merged_article(existing: &Article, input: &UpdateArticleInput) -> Article {
    Article {
        slug: input.slug.clone().unwrap_or_else(|| existing.slug.clone()),
        title: input.title.clone().unwrap_or_else(|| existing.title.clone()),
        summary: input.summary.clone().unwrap_or_else(|| existing.summary.clone()),
        content: input.content.clone().unwrap_or_else(|| existing.content.clone()),
        author: input.author.clone().unwrap_or_else(|| existing.author.clone()),
        image_url: merge_clearable(&input.image_url, &existing.image_url),
        categories: input
            .categories
            .clone()
            .unwrap_or_else(|| existing.categories.clone()),
        focus_keyword: merge_clearable(&input.focus_keyword, &existing.focus_keyword),
        updated_at: timestamp::now(),
        ..existing.clone()
    }
}

fn new_article(id: i64, input: &CreateArticleInput, created_at: chrono::DateTime<chrono::Utc>) -> Article {
    Article {
        id,
        slug: input.slug.clone(),
        title: input.title.clone(),
        summary: input.summary.clone(),
        content: input.content.clone(),
        author: input.author.clone(),
        image_url: input.image_url.clone(),
        categories: input.categories.clone(),
        focus_keyword: input.focus_keyword.clone(),
        is_featured: false,
        is_trending: false,
        trending_topic: None,
        view_count: 0,
        created_at,
        updated_at: created_at,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(pool: &SqlitePool, input: &CreateArticleInput) -> Result<Article> {
    let created_at = input.created_at.map(timestamp::normalize).unwrap_or_else(timestamp::now);
    let categories = encode_categories(&input.categories)?;

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, summary, content, author, image_url, categories, focus_keyword, is_featured, is_trending, trending_topic, view_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, NULL, 0, ?, ?)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.summary)
    .bind(&input.content)
    .bind(&input.author)
    .bind(&input.image_url)
    .bind(&categories)
    .bind(&input.focus_keyword)
    .bind(created_at)
    .bind(created_at)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(new_article(result.last_insert_rowid(), input, created_at))
}

async fn get_article_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Article>> {
    let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get article by ID")?;
    row.as_ref().map(row_to_article_sqlite).transpose()
}

async fn get_article_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Article>> {
    let sql = format!("SELECT {} FROM articles WHERE slug = ?", ARTICLE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get article by slug")?;
    row.as_ref().map(row_to_article_sqlite).transpose()
}

async fn list_articles_sqlite(
    pool: &SqlitePool,
    category: Option<&str>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Article>> {
    let filter = if category.is_some() {
        "WHERE EXISTS (SELECT 1 FROM json_each(articles.categories) WHERE json_each.value = ?)"
    } else {
        ""
    };
    let sql = format!(
        "SELECT {} FROM articles {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS, filter
    );

    let mut query = sqlx::query(&sql);
    if let Some(category) = category {
        query = query.bind(category);
    }
    let rows = query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    rows.iter().map(row_to_article_sqlite).collect()
}

async fn count_articles_sqlite(pool: &SqlitePool, category: Option<&str>) -> Result<i64> {
    let count = match category {
        Some(category) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM articles WHERE EXISTS (SELECT 1 FROM json_each(articles.categories) WHERE json_each.value = ?)",
            )
            .bind(category)
            .fetch_one(pool)
            .await
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
                .fetch_one(pool)
                .await
        }
    };
    count.context("Failed to count articles")
}

async fn search_articles_sqlite(pool: &SqlitePool, keyword: &str, offset: i64, limit: i64) -> Result<Vec<Article>> {
    let pattern = format!("%{}%", keyword);
    let sql = format!(
        "SELECT {} FROM articles WHERE title LIKE ? OR summary LIKE ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to search articles")?;

    rows.iter().map(row_to_article_sqlite).collect()
}

async fn update_article_sqlite(pool: &SqlitePool, id: i64, input: &UpdateArticleInput) -> Result<Article> {
    let existing = get_article_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Article not found"))?;
    let updated = merged_article(&existing, input);

    sqlx::query(
        r#"
        UPDATE articles
        SET slug = ?, title = ?, summary = ?, content = ?, author = ?, image_url = ?, categories = ?, focus_keyword = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&updated.slug)
    .bind(&updated.title)
    .bind(&updated.summary)
    .bind(&updated.content)
    .bind(&updated.author)
    .bind(&updated.image_url)
    .bind(encode_categories(&updated.categories)?)
    .bind(&updated.focus_keyword)
    .bind(updated.updated_at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update article")?;

    get_article_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Article not found after update"))
}

async fn try_promote_sqlite(
    pool: &SqlitePool,
    id: i64,
    promotion: Promotion<'_>,
    max: i64,
    window: i64,
) -> Result<bool> {
    let now = timestamp::now();
    let result = match promotion {
        Promotion::Featured => {
            sqlx::query(
                r#"
                UPDATE articles
                SET is_featured = 1, updated_at = ?
                WHERE id = ?
                  AND is_trending = 0
                  AND (SELECT COUNT(*) FROM articles WHERE is_featured = 1 AND id <> ?) < ?
                  AND id NOT IN (SELECT id FROM articles ORDER BY created_at DESC, id DESC LIMIT ?)
                "#,
            )
            .bind(now)
            .bind(id)
            .bind(id)
            .bind(max)
            .bind(window)
            .execute(pool)
            .await
        }
        Promotion::Trending(topic) => {
            sqlx::query(
                r#"
                UPDATE articles
                SET is_trending = 1, trending_topic = ?, updated_at = ?
                WHERE id = ?
                  AND is_featured = 0
                  AND (SELECT COUNT(*) FROM articles WHERE is_trending = 1 AND id <> ?) < ?
                  AND id NOT IN (SELECT id FROM articles ORDER BY created_at DESC, id DESC LIMIT ?)
                "#,
            )
            .bind(topic)
            .bind(now)
            .bind(id)
            .bind(id)
            .bind(max)
            .bind(window)
            .execute(pool)
            .await
        }
    };

    Ok(result.context("Failed to write promotion")?.rows_affected() == 1)
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    let categories: String = row.try_get("categories")?;
    Ok(Article {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        image_url: row.try_get("image_url")?,
        categories: parse_categories(&categories)?,
        focus_keyword: row.try_get("focus_keyword")?,
        is_featured: row.try_get("is_featured")?,
        is_trending: row.try_get("is_trending")?,
        trending_topic: row.try_get("trending_topic")?,
        view_count: row.try_get("view_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(pool: &MySqlPool, input: &CreateArticleInput) -> Result<Article> {
    let created_at = input.created_at.map(timestamp::normalize).unwrap_or_else(timestamp::now);
    let categories = encode_categories(&input.categories)?;

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, summary, content, author, image_url, categories, focus_keyword, is_featured, is_trending, trending_topic, view_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, FALSE, FALSE, NULL, 0, ?, ?)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.summary)
    .bind(&input.content)
    .bind(&input.author)
    .bind(&input.image_url)
    .bind(&categories)
    .bind(&input.focus_keyword)
    .bind(created_at)
    .bind(created_at)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(new_article(result.last_insert_id() as i64, input, created_at))
}

async fn get_article_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Article>> {
    let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get article by ID")?;
    row.as_ref().map(row_to_article_mysql).transpose()
}

async fn get_article_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Article>> {
    let sql = format!("SELECT {} FROM articles WHERE slug = ?", ARTICLE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get article by slug")?;
    row.as_ref().map(row_to_article_mysql).transpose()
}

async fn list_articles_mysql(
    pool: &MySqlPool,
    category: Option<&str>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Article>> {
    let filter = if category.is_some() {
        "WHERE JSON_CONTAINS(categories, JSON_QUOTE(?))"
    } else {
        ""
    };
    let sql = format!(
        "SELECT {} FROM articles {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS, filter
    );

    let mut query = sqlx::query(&sql);
    if let Some(category) = category {
        query = query.bind(category);
    }
    let rows = query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    rows.iter().map(row_to_article_mysql).collect()
}

async fn count_articles_mysql(pool: &MySqlPool, category: Option<&str>) -> Result<i64> {
    let count = match category {
        Some(category) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM articles WHERE JSON_CONTAINS(categories, JSON_QUOTE(?))",
            )
            .bind(category)
            .fetch_one(pool)
            .await
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
                .fetch_one(pool)
                .await
        }
    };
    count.context("Failed to count articles")
}

async fn search_articles_mysql(pool: &MySqlPool, keyword: &str, offset: i64, limit: i64) -> Result<Vec<Article>> {
    let pattern = format!("%{}%", keyword);
    let sql = format!(
        "SELECT {} FROM articles WHERE title LIKE ? OR summary LIKE ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to search articles")?;

    rows.iter().map(row_to_article_mysql).collect()
}

async fn update_article_mysql(pool: &MySqlPool, id: i64, input: &UpdateArticleInput) -> Result<Article> {
    let existing = get_article_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Article not found"))?;
    let updated = merged_article(&existing, input);

    sqlx::query(
        r#"
        UPDATE articles
        SET slug = ?, title = ?, summary = ?, content = ?, author = ?, image_url = ?, categories = ?, focus_keyword = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&updated.slug)
    .bind(&updated.title)
    .bind(&updated.summary)
    .bind(&updated.content)
    .bind(&updated.author)
    .bind(&updated.image_url)
    .bind(encode_categories(&updated.categories)?)
    .bind(&updated.focus_keyword)
    .bind(updated.updated_at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update article")?;

    get_article_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Article not found after update"))
}

/// MySQL rejects a subquery on the table being updated, so the checks run
/// inside a transaction holding row locks on the target, the currently
/// promoted rows and the headline window.
async fn try_promote_mysql(
    pool: &MySqlPool,
    id: i64,
    promotion: Promotion<'_>,
    max: i64,
    window: i64,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin promotion transaction")?;

    let target = sqlx::query("SELECT is_featured, is_trending FROM articles WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock article")?;
    let Some(target) = target else {
        return Ok(false);
    };

    let (blocking_flag, promoted_sql) = match promotion {
        Promotion::Featured => ("is_trending", "SELECT id FROM articles WHERE is_featured = 1 FOR UPDATE"),
        Promotion::Trending(_) => ("is_featured", "SELECT id FROM articles WHERE is_trending = 1 FOR UPDATE"),
    };
    let blocked: bool = target.try_get(blocking_flag)?;
    if blocked {
        return Ok(false);
    }

    let promoted: Vec<i64> = sqlx::query_scalar(promoted_sql)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to lock promoted articles")?;
    if promoted.iter().filter(|&&other| other != id).count() as i64 >= max {
        return Ok(false);
    }

    let latest: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM articles ORDER BY created_at DESC, id DESC LIMIT ? FOR UPDATE",
    )
    .bind(window)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to lock latest headlines")?;
    if latest.contains(&id) {
        return Ok(false);
    }

    let now = timestamp::now();
    let written = match promotion {
        Promotion::Featured => {
            sqlx::query("UPDATE articles SET is_featured = TRUE, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await
        }
        Promotion::Trending(topic) => {
            sqlx::query(
                "UPDATE articles SET is_trending = TRUE, trending_topic = ?, updated_at = ? WHERE id = ?",
            )
            .bind(topic)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
        }
    };
    written.context("Failed to write promotion")?;

    tx.commit().await.context("Failed to commit promotion")?;
    Ok(true)
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Article> {
    let categories: String = row.try_get("categories")?;
    Ok(Article {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        image_url: row.try_get("image_url")?,
        categories: parse_categories(&categories)?,
        focus_keyword: row.try_get("focus_keyword")?,
        is_featured: row.try_get("is_featured")?,
        is_trending: row.try_get("is_trending")?,
        trending_topic: row.try_get("trending_topic")?,
        view_count: row.try_get("view_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
