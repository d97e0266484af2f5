//! Web story service

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::WebStoryRepository;
use crate::models::{CreateWebStoryInput, ListParams, PagedResult, StorySlide, UpdateWebStoryInput, WebStory};
use crate::services::article::generate_slug;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const STORY_CACHE_TTL_SECS: u64 = 600;

const CACHE_KEY_STORY_BY_SLUG: &str = "stories:slug:";
const CACHE_KEY_STORY_LIST: &str = "stories:list:";
const CACHE_PATTERN_STORIES: &str = "stories:*";

#[derive(Debug, thiserror::Error)]
pub enum WebStoryServiceError {
    #[error("Web story not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Web story slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct WebStoryService {
    repo: Arc<dyn WebStoryRepository>,
    cache: Arc<Cache>,
}

impl WebStoryService {
    pub fn new(repo: Arc<dyn WebStoryRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, mut input: CreateWebStoryInput) -> Result<WebStory, WebStoryServiceError> {
        validate_title(&input.title)?;
        validate_slides(&input.slides)?;
        input.title = input.title.trim().to_string();
        input.slides = clean_slides(input.slides);
        input.cover_image_url = input
            .cover_image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        input.slug = input.slug.trim().to_string();
        if input.slug.is_empty() {
            input.slug = self.unique_slug(&generate_slug(&input.title)).await?;
        } else if self.slug_taken(&input.slug).await? {
            return Err(WebStoryServiceError::DuplicateSlug(input.slug));
        }

        let story = self.repo.create(&input).await.context("Failed to create web story")?;
        self.invalidate().await;

        tracing::info!(id = story.id, slug = %story.slug, slides = story.slides.len(), "Web story created");
        Ok(story)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<WebStory>, WebStoryServiceError> {
        Ok(self.repo.get_by_id(id).await.context("Failed to get web story")?)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<WebStory>, WebStoryServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_STORY_BY_SLUG, slug);
        if let Some(story) = self.cache.get::<WebStory>(&cache_key).await.ok().flatten() {
            return Ok(Some(story));
        }

        let story = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get web story by slug")?;
        if let Some(ref s) = story {
            let _ = self
                .cache
                .set(&cache_key, s, Duration::from_secs(STORY_CACHE_TTL_SECS))
                .await;
        }
        Ok(story)
    }

    /// Paged listing, newest first
    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<WebStory>, WebStoryServiceError> {
        let cache_key = format!("{}{}:{}", CACHE_KEY_STORY_LIST, params.page, params.per_page);
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<WebStory>>(&cache_key).await {
            return Ok(cached);
        }

        let stories = self
            .repo
            .list(params.offset(), params.limit())
            .await
            .context("Failed to list web stories")?;
        let total = self.repo.count().await.context("Failed to count web stories")?;

        let result = PagedResult::new(stories, total, params);
        let _ = self
            .cache
            .set(&cache_key, &result, Duration::from_secs(STORY_CACHE_TTL_SECS))
            .await;
        Ok(result)
    }

    pub async fn update(&self, id: i64, mut input: UpdateWebStoryInput) -> Result<WebStory, WebStoryServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get web story")?
            .ok_or_else(|| WebStoryServiceError::NotFound(id.to_string()))?;

        if let Some(ref title) = input.title {
            validate_title(title)?;
            input.title = Some(title.trim().to_string());
        }
        if let Some(slides) = input.slides.take() {
            validate_slides(&slides)?;
            input.slides = Some(clean_slides(slides));
        }
        if let Some(ref slug) = input.slug {
            let slug = slug.trim().to_string();
            if slug.is_empty() {
                return Err(WebStoryServiceError::ValidationError(
                    "Web story slug cannot be empty".to_string(),
                ));
            }
            if slug != existing.slug
                && self
                    .repo
                    .exists_by_slug_excluding(&slug, id)
                    .await
                    .context("Failed to check slug uniqueness")?
            {
                return Err(WebStoryServiceError::DuplicateSlug(slug));
            }
            input.slug = Some(slug);
        }

        let story = self
            .repo
            .update(id, &input)
            .await
            .context("Failed to update web story")?;
        self.invalidate().await;

        tracing::info!(id, "Web story updated");
        Ok(story)
    }

    pub async fn delete(&self, id: i64) -> Result<(), WebStoryServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete web story")?;
        if !deleted {
            return Err(WebStoryServiceError::NotFound(id.to_string()));
        }
        self.invalidate().await;

        tracing::info!(id, "Web story deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, WebStoryServiceError> {
        Ok(self.repo.count().await.context("Failed to count web stories")?)
    }

    async fn slug_taken(&self, slug: &str) -> Result<bool, WebStoryServiceError> {
        let existing = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to check slug uniqueness")?;
        Ok(existing.is_some())
    }

    async fn unique_slug(&self, base: &str) -> Result<String, WebStoryServiceError> {
        let mut candidate = base.to_string();
        let mut n = 2;
        while self.slug_taken(&candidate).await? {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        Ok(candidate)
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_pattern(CACHE_PATTERN_STORIES).await {
            tracing::warn!("Failed to invalidate story cache: {}", e);
        }
    }
}

fn validate_title(title: &str) -> Result<(), WebStoryServiceError> {
    if title.trim().is_empty() {
        return Err(WebStoryServiceError::ValidationError(
            "Web story title cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_slides(slides: &[StorySlide]) -> Result<(), WebStoryServiceError> {
    if slides.is_empty() {
        return Err(WebStoryServiceError::ValidationError(
            "Web story needs at least one slide".to_string(),
        ));
    }
    if let Some(index) = slides.iter().position(|s| s.image_url.trim().is_empty()) {
        return Err(WebStoryServiceError::ValidationError(format!(
            "Slide {} has no image",
            index + 1
        )));
    }
    Ok(())
}

fn clean_slides(slides: Vec<StorySlide>) -> Vec<StorySlide> {
    slides
        .into_iter()
        .map(|slide| StorySlide {
            image_url: slide.image_url.trim().to_string(),
            caption: slide.caption.filter(|c| !c.trim().is_empty()),
            link_url: slide.link_url.filter(|l| !l.trim().is_empty()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxWebStoryRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> WebStoryService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let cache = create_cache(&CacheConfig::default())
            .await
            .expect("Failed to create cache");
        WebStoryService::new(SqlxWebStoryRepository::boxed(pool), cache)
    }

    fn slides() -> Vec<StorySlide> {
        vec![
            StorySlide::new("https://cdn.example.com/1.jpg").with_caption("Crowds gather"),
            StorySlide::new("https://cdn.example.com/2.jpg"),
        ]
    }

    #[tokio::test]
    async fn test_create_story() {
        let service = setup_test_service().await;
        let story = service
            .create(CreateWebStoryInput::new("Election Night", slides()))
            .await
            .unwrap();

        assert_eq!(story.slug, "election-night");
        assert_eq!(story.slides.len(), 2);
        assert_eq!(story.slides[0].caption.as_deref(), Some("Crowds gather"));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = setup_test_service().await;

        let result = service.create(CreateWebStoryInput::new(" ", slides())).await;
        assert!(matches!(result, Err(WebStoryServiceError::ValidationError(_))));

        let result = service.create(CreateWebStoryInput::new("No slides", vec![])).await;
        assert!(matches!(result, Err(WebStoryServiceError::ValidationError(_))));

        let result = service
            .create(CreateWebStoryInput::new("Blank slide", vec![StorySlide::new("  ")]))
            .await;
        assert!(matches!(result, Err(WebStoryServiceError::ValidationError(ref m)) if m.contains("Slide 1")));
    }

    #[tokio::test]
    async fn test_generated_slugs_are_unique() {
        let service = setup_test_service().await;
        let a = service.create(CreateWebStoryInput::new("Floods", slides())).await.unwrap();
        let b = service.create(CreateWebStoryInput::new("Floods", slides())).await.unwrap();
        assert_eq!(a.slug, "floods");
        assert_eq!(b.slug, "floods-2");

        let mut explicit = CreateWebStoryInput::new("Other", slides());
        explicit.slug = "floods".into();
        assert!(matches!(
            service.create(explicit).await,
            Err(WebStoryServiceError::DuplicateSlug(_))
        ));
    }

    #[tokio::test]
    async fn test_update_refreshes_cached_slug_lookup() {
        let service = setup_test_service().await;
        let story = service.create(CreateWebStoryInput::new("Floods", slides())).await.unwrap();
        service.get_by_slug("floods").await.unwrap().unwrap();

        let updated = service
            .update(
                story.id,
                UpdateWebStoryInput {
                    title: Some("River Floods".into()),
                    slides: Some(vec![StorySlide::new("https://cdn.example.com/3.jpg")]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slides.len(), 1);

        let fetched = service.get_by_slug("floods").await.unwrap().unwrap();
        assert_eq!(fetched.title, "River Floods");

        let result = service
            .update(
                story.id,
                UpdateWebStoryInput {
                    slides: Some(vec![]),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(WebStoryServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_list_delete_count() {
        let service = setup_test_service().await;
        let a = service.create(CreateWebStoryInput::new("A", slides())).await.unwrap();
        service.create(CreateWebStoryInput::new("B", slides())).await.unwrap();

        let page = service.list(&ListParams::new(1, 10)).await.unwrap();
        assert_eq!(page.total, 2);

        service.delete(a.id).await.unwrap();
        assert_eq!(service.count().await.unwrap(), 1);
        assert_eq!(service.list(&ListParams::new(1, 10)).await.unwrap().total, 1);
        assert!(matches!(
            service.delete(a.id).await,
            Err(WebStoryServiceError::NotFound(_))
        ));
    }
}
