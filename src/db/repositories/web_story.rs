//! Web story repository
//!
//! Slides are stored as a JSON array in the `slides` column.

use super::timestamp;
use crate::config::DatabaseDriver;
use crate::db::{pool, DynDatabasePool};
use crate::models::{CreateWebStoryInput, StorySlide, UpdateWebStoryInput, WebStory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const STORY_COLUMNS: &str = "id, slug, title, cover_image_url, slides, created_at, updated_at";

#[async_trait]
pub trait WebStoryRepository: Send + Sync {
    async fn create(&self, input: &CreateWebStoryInput) -> Result<WebStory>;

    async fn get_by_id(&self, id: i64) -> Result<Option<WebStory>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<WebStory>>;

    /// Newest first
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<WebStory>>;

    async fn count(&self) -> Result<i64>;

    async fn update(&self, id: i64, input: &UpdateWebStoryInput) -> Result<WebStory>;

    /// Returns false if the story did not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn exists_by_slug_excluding(&self, slug: &str, exclude_id: i64) -> Result<bool>;
}

pub struct SqlxWebStoryRepository {
    pool: DynDatabasePool,
}

impl SqlxWebStoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn WebStoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl WebStoryRepository for SqlxWebStoryRepository {
    async fn create(&self, input: &CreateWebStoryInput) -> Result<WebStory> {
        let now = timestamp::now();
        let slides = encode_slides(&input.slides)?;
        let sql = "INSERT INTO web_stories (slug, title, cover_image_url, slides, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)";

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&input.slug)
                .bind(&input.title)
                .bind(&input.cover_image_url)
                .bind(&slides)
                .bind(now)
                .bind(now)
                .execute(pool::sqlite(&self.pool)?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&input.slug)
                .bind(&input.title)
                .bind(&input.cover_image_url)
                .bind(&slides)
                .bind(now)
                .bind(now)
                .execute(pool::mysql(&self.pool)?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create web story")?;

        Ok(WebStory {
            id,
            slug: input.slug.clone(),
            title: input.title.clone(),
            cover_image_url: input.cover_image_url.clone(),
            slides: input.slides.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<WebStory>> {
        let sql = format!("SELECT {} FROM web_stories WHERE id = ?", STORY_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool::sqlite(&self.pool)?)
                    .await
                    .context("Failed to get web story by ID")?;
                row.as_ref().map(row_to_story_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool::mysql(&self.pool)?)
                    .await
                    .context("Failed to get web story by ID")?;
                row.as_ref().map(row_to_story_mysql).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<WebStory>> {
        let sql = format!("SELECT {} FROM web_stories WHERE slug = ?", STORY_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(pool::sqlite(&self.pool)?)
                    .await
                    .context("Failed to get web story by slug")?;
                row.as_ref().map(row_to_story_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(pool::mysql(&self.pool)?)
                    .await
                    .context("Failed to get web story by slug")?;
                row.as_ref().map(row_to_story_mysql).transpose()
            }
        }
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<WebStory>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_stories_sqlite(pool::sqlite(&self.pool)?, offset, limit).await,
            DatabaseDriver::Mysql => list_stories_mysql(pool::mysql(&self.pool)?, offset, limit).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM web_stories";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(pool::sqlite(&self.pool)?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(pool::mysql(&self.pool)?)
                    .await
            }
        };
        count.context("Failed to count web stories")
    }

    async fn update(&self, id: i64, input: &UpdateWebStoryInput) -> Result<WebStory> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Web story not found"))?;

        let updated = WebStory {
            slug: input.slug.clone().unwrap_or_else(|| existing.slug.clone()),
            title: input.title.clone().unwrap_or_else(|| existing.title.clone()),
            cover_image_url: match &input.cover_image_url {
                Some(url) if url.trim().is_empty() => None,
                Some(url) => Some(url.clone()),
                None => existing.cover_image_url.clone(),
            },
            slides: input.slides.clone().unwrap_or_else(|| existing.slides.clone()),
            updated_at: timestamp::now(),
            ..existing
        };
        let slides = encode_slides(&updated.slides)?;
        let sql = "UPDATE web_stories SET slug = ?, title = ?, cover_image_url = ?, slides = ?, updated_at = ? WHERE id = ?";

        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&updated.slug)
                .bind(&updated.title)
                .bind(&updated.cover_image_url)
                .bind(&slides)
                .bind(updated.updated_at)
                .bind(id)
                .execute(pool::sqlite(&self.pool)?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&updated.slug)
                .bind(&updated.title)
                .bind(&updated.cover_image_url)
                .bind(&slides)
                .bind(updated.updated_at)
                .bind(id)
                .execute(pool::mysql(&self.pool)?)
                .await
                .map(|_| ()),
        };
        result.context("Failed to update web story")?;

        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM web_stories WHERE id = ?";
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
        Ok(affected.context("Failed to delete web story")? > 0)
    }

    async fn exists_by_slug_excluding(&self, slug: &str, exclude_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM web_stories WHERE slug = ? AND id <> ?";
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
        Ok(count.context("Failed to check story slug")? > 0)
    }
}

fn encode_slides(slides: &[StorySlide]) -> Result<String> {
    serde_json::to_string(slides).context("Failed to encode slides")
}

fn decode_slides(raw: &str) -> Result<Vec<StorySlide>> {
    serde_json::from_str(raw).context("Invalid slides column")
}

async fn list_stories_sqlite(pool: &SqlitePool, offset: i64, limit: i64) -> Result<Vec<WebStory>> {
    let sql = format!(
        "SELECT {} FROM web_stories ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        STORY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list web stories")?;
    rows.iter().map(row_to_story_sqlite).collect()
}

fn row_to_story_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<WebStory> {
    let slides: String = row.try_get("slides")?;
    Ok(WebStory {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        cover_image_url: row.try_get("cover_image_url")?,
        slides: decode_slides(&slides)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn list_stories_mysql(pool: &MySqlPool, offset: i64, limit: i64) -> Result<Vec<WebStory>> {
    let sql = format!(
        "SELECT {} FROM web_stories ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        STORY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list web stories")?;
    rows.iter().map(row_to_story_mysql).collect()
}

fn row_to_story_mysql(row: &sqlx::mysql::MySqlRow) -> Result<WebStory> {
    let slides: String = row.try_get("slides")?;
    Ok(WebStory {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        cover_image_url: row.try_get("cover_image_url")?,
        slides: decode_slides(&slides)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
