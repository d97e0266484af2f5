//! Article service
//!
//! Editorial CRUD for articles plus the cached public read paths (paged
//! listings, featured/trending rails, latest headlines).
//!
//! Promotion flags are not writable here; see [`crate::services::promotion`].
//! Every mutation clears the whole `articles:*` cache namespace, which also
//! covers the per-id and per-slug entries.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::ArticleRepository;
use crate::models::{
    normalize_categories, Article, CreateArticleInput, ListParams, PagedResult, UpdateArticleInput,
};
use crate::services::promotion::HEADLINE_WINDOW;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Default cache TTL for single articles
const ARTICLE_CACHE_TTL_SECS: u64 = 3600;

/// Listings refresh faster than single articles
const ARTICLE_LIST_CACHE_TTL_SECS: u64 = 300;

const CACHE_KEY_ARTICLE_BY_ID: &str = "articles:id:";
const CACHE_KEY_ARTICLE_BY_SLUG: &str = "articles:slug:";
const CACHE_KEY_ARTICLE_LIST: &str = "articles:list:";
const CACHE_KEY_FEATURED: &str = "articles:featured";
const CACHE_KEY_TRENDING: &str = "articles:trending";
const CACHE_KEY_LATEST: &str = "articles:latest";

/// Pattern covering every article cache entry
pub const CACHE_PATTERN_ARTICLES: &str = "articles:*";

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Article slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Drop every cached article page and record.
pub async fn invalidate_article_cache(cache: &Cache) {
    if let Err(e) = cache.delete_pattern(CACHE_PATTERN_ARTICLES).await {
        tracing::warn!("Failed to invalidate article cache: {}", e);
    }
}

pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticleRepository>, cache: Arc<Cache>) -> Self {
        Self::with_cache_ttl(repo, cache, Duration::from_secs(ARTICLE_CACHE_TTL_SECS))
    }

    pub fn with_cache_ttl(repo: Arc<dyn ArticleRepository>, cache: Arc<Cache>, cache_ttl: Duration) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    fn list_ttl(&self) -> Duration {
        self.cache_ttl.min(Duration::from_secs(ARTICLE_LIST_CACHE_TTL_SECS))
    }

    /// Create a new, unpromoted article
    ///
    /// # Errors
    /// - `ValidationError` if the title or content is blank, or no category survives
    ///   normalization
    /// - `DuplicateSlug` if an explicit slug is taken (generated slugs get a numeric suffix)
    pub async fn create(&self, mut input: CreateArticleInput) -> Result<Article, ArticleServiceError> {
        validate_text("title", &input.title)?;
        validate_text("content", &input.content)?;
        input.title = input.title.trim().to_string();
        input.categories = validate_categories(&input.categories)?;
        input.focus_keyword = clean_optional(input.focus_keyword);
        input.image_url = clean_optional(input.image_url);

        input.slug = input.slug.trim().to_string();
        if input.slug.is_empty() {
            input.slug = self.unique_slug(&generate_slug(&input.title)).await?;
        } else if self
            .repo
            .exists_by_slug(&input.slug)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(ArticleServiceError::DuplicateSlug(input.slug));
        }

        let article = self.repo.create(&input).await.context("Failed to create article")?;
        invalidate_article_cache(&self.cache).await;

        tracing::info!(id = article.id, slug = %article.slug, "Article created");
        Ok(article)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Article>, ArticleServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_ARTICLE_BY_ID, id);
        if let Some(article) = self.cache.get::<Article>(&cache_key).await.ok().flatten() {
            return Ok(Some(article));
        }

        let article = self.repo.get_by_id(id).await.context("Failed to get article by ID")?;
        if let Some(ref art) = article {
            let _ = self.cache.set(&cache_key, art, self.cache_ttl).await;
        }
        Ok(article)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>, ArticleServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_ARTICLE_BY_SLUG, slug);
        if let Some(article) = self.cache.get::<Article>(&cache_key).await.ok().flatten() {
            return Ok(Some(article));
        }

        let article = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get article by slug")?;
        if let Some(ref art) = article {
            let _ = self.cache.set(&cache_key, art, self.cache_ttl).await;
        }
        Ok(article)
    }

    /// Paged listing, newest first, optionally restricted to one category
    pub async fn list(
        &self,
        params: &ListParams,
        category: Option<&str>,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let cache_key = format!(
            "{}{}:{}:{}",
            CACHE_KEY_ARTICLE_LIST,
            params.page,
            params.per_page,
            category.unwrap_or("")
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Article>>(&cache_key).await {
            return Ok(cached);
        }

        let articles = self
            .repo
            .list(category, params.offset(), params.limit())
            .await
            .context("Failed to list articles")?;
        let total = self.repo.count(category).await.context("Failed to count articles")?;

        let result = PagedResult::new(articles, total, params);
        let _ = self.cache.set(&cache_key, &result, self.list_ttl()).await;
        Ok(result)
    }

    pub async fn list_featured(&self) -> Result<Vec<Article>, ArticleServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<Article>>(CACHE_KEY_FEATURED).await {
            return Ok(cached);
        }
        let articles = self
            .repo
            .list_featured()
            .await
            .context("Failed to list featured articles")?;
        let _ = self.cache.set(CACHE_KEY_FEATURED, &articles, self.list_ttl()).await;
        Ok(articles)
    }

    pub async fn list_trending(&self) -> Result<Vec<Article>, ArticleServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<Article>>(CACHE_KEY_TRENDING).await {
            return Ok(cached);
        }
        let articles = self
            .repo
            .list_trending()
            .await
            .context("Failed to list trending articles")?;
        let _ = self.cache.set(CACHE_KEY_TRENDING, &articles, self.list_ttl()).await;
        Ok(articles)
    }

    /// The articles currently in the latest-headlines window
    pub async fn latest_headlines(&self) -> Result<Vec<Article>, ArticleServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<Article>>(CACHE_KEY_LATEST).await {
            return Ok(cached);
        }
        let articles = self
            .repo
            .latest(HEADLINE_WINDOW)
            .await
            .context("Failed to load latest headlines")?;
        let _ = self.cache.set(CACHE_KEY_LATEST, &articles, self.list_ttl()).await;
        Ok(articles)
    }

    /// Search title and summary
    pub async fn search(
        &self,
        keyword: &str,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ArticleServiceError::ValidationError(
                "Search keyword cannot be empty".to_string(),
            ));
        }

        let articles = self
            .repo
            .search(keyword, params.offset(), params.limit())
            .await
            .context("Failed to search articles")?;
        let total = self
            .repo
            .count_search(keyword)
            .await
            .context("Failed to count search results")?;

        Ok(PagedResult::new(articles, total, params))
    }

    /// Update editorial fields. Promotion flags are never touched.
    pub async fn update(&self, id: i64, mut input: UpdateArticleInput) -> Result<Article, ArticleServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ArticleServiceError::NotFound(id.to_string()))?;

        if let Some(ref title) = input.title {
            validate_text("title", title)?;
            input.title = Some(title.trim().to_string());
        }
        if let Some(ref content) = input.content {
            validate_text("content", content)?;
        }
        if let Some(ref categories) = input.categories {
            input.categories = Some(validate_categories(categories)?);
        }
        if let Some(ref slug) = input.slug {
            let slug = slug.trim().to_string();
            if slug.is_empty() {
                return Err(ArticleServiceError::ValidationError(
                    "Article slug cannot be empty".to_string(),
                ));
            }
            if slug != existing.slug
                && self
                    .repo
                    .exists_by_slug_excluding(&slug, id)
                    .await
                    .context("Failed to check slug uniqueness")?
            {
                return Err(ArticleServiceError::DuplicateSlug(slug));
            }
            input.slug = Some(slug);
        }

        let article = self
            .repo
            .update(id, &input)
            .await
            .context("Failed to update article")?;
        invalidate_article_cache(&self.cache).await;

        tracing::info!(id, "Article updated");
        Ok(article)
    }

    /// Unconditional delete; promotion rules do not apply
    pub async fn delete(&self, id: i64) -> Result<(), ArticleServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete article")?;
        if !deleted {
            return Err(ArticleServiceError::NotFound(id.to_string()));
        }
        invalidate_article_cache(&self.cache).await;

        tracing::info!(id, "Article deleted");
        Ok(())
    }

    /// Count a page view. Cached copies keep their older count until they expire.
    pub async fn record_view(&self, id: i64) -> Result<(), ArticleServiceError> {
        let found = self.repo.record_view(id).await.context("Failed to record view")?;
        if !found {
            return Err(ArticleServiceError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ArticleServiceError> {
        Ok(self.repo.count(None).await.context("Failed to count articles")?)
    }

    pub async fn total_views(&self) -> Result<i64, ArticleServiceError> {
        Ok(self.repo.total_views().await.context("Failed to sum views")?)
    }

    /// `base`, or `base-2`, `base-3`, ... whichever is free first.
    async fn unique_slug(&self, base: &str) -> Result<String, ArticleServiceError> {
        let mut candidate = base.to_string();
        let mut n = 2;
        while self
            .repo
            .exists_by_slug(&candidate)
            .await
            .context("Failed to check slug uniqueness")?
        {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        Ok(candidate)
    }
}

fn validate_text(field: &str, value: &str) -> Result<(), ArticleServiceError> {
    if value.trim().is_empty() {
        return Err(ArticleServiceError::ValidationError(format!(
            "Article {} cannot be empty",
            field
        )));
    }
    Ok(())
}

fn validate_categories(categories: &[String]) -> Result<Vec<String>, ArticleServiceError> {
    let normalized = normalize_categories(categories);
    if normalized.is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Article needs at least one category".to_string(),
        ));
    }
    Ok(normalized)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Generate a URL-friendly slug from a title
///
/// Lowercases, maps ASCII punctuation and whitespace to single hyphens and
/// keeps non-ASCII letters. Falls back to `"article"` when nothing is left.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "article".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxArticleRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::FlagUpdate;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use proptest::prelude::*;

    async fn setup_test_service() -> (Arc<dyn ArticleRepository>, ArticleService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let repo = SqlxArticleRepository::boxed(pool);
        let cache = create_cache(&CacheConfig::default())
            .await
            .expect("Failed to create cache");

        (repo.clone(), ArticleService::new(repo, cache))
    }

    fn input(title: &str) -> CreateArticleInput {
        CreateArticleInput::new(title, "<p>Body</p>", vec!["news".to_string()])
    }

    fn dated(title: &str, hours: i64) -> CreateArticleInput {
        input(title).with_created_at(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + ChronoDuration::hours(hours))
    }

    // ========================================================================
    // Slug generation
    // ========================================================================

    #[test]
    fn test_generate_slug_simple() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Budget: what's next?  "), "budget-what-s-next");
        assert_eq!(generate_slug("snake_case__title"), "snake-case-title");
    }

    #[test]
    fn test_generate_slug_keeps_non_ascii() {
        assert_eq!(generate_slug("Élection 2026"), "élection-2026");
    }

    #[test]
    fn test_generate_slug_fallback() {
        assert_eq!(generate_slug("!!!"), "article");
    }

    // ========================================================================
    // Create / validation
    // ========================================================================

    #[tokio::test]
    async fn test_create_article_defaults() {
        let (_, service) = setup_test_service().await;
        let created = service
            .create(CreateArticleInput::new(
                "  Budget Passes  ",
                "<p>Body</p>",
                vec![" politics ".into(), "politics".into(), "economy".into()],
            ))
            .await
            .unwrap();

        assert_eq!(created.title, "Budget Passes");
        assert_eq!(created.slug, "budget-passes");
        assert_eq!(created.categories, vec!["politics", "economy"]);
        assert!(!created.is_featured);
        assert!(!created.is_trending);
        assert!(created.trending_topic.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields() {
        let (_, service) = setup_test_service().await;

        let result = service.create(input("   ")).await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));

        let result = service
            .create(CreateArticleInput::new("Title", " ", vec!["news".into()]))
            .await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));

        let result = service
            .create(CreateArticleInput::new("Title", "Body", vec![" ".into(), "".into()]))
            .await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));

        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_generated_slug_is_made_unique() {
        let (_, service) = setup_test_service().await;
        let a = service.create(input("Storm Warning")).await.unwrap();
        let b = service.create(input("Storm Warning")).await.unwrap();
        let c = service.create(input("Storm Warning")).await.unwrap();

        assert_eq!(a.slug, "storm-warning");
        assert_eq!(b.slug, "storm-warning-2");
        assert_eq!(c.slug, "storm-warning-3");
    }

    #[tokio::test]
    async fn test_create_explicit_duplicate_slug_fails() {
        let (_, service) = setup_test_service().await;
        service.create(input("One").with_slug("same")).await.unwrap();
        let result = service.create(input("Two").with_slug("same")).await;
        assert!(matches!(result, Err(ArticleServiceError::DuplicateSlug(s)) if s == "same"));
    }

    // ========================================================================
    // Reads and caching
    // ========================================================================

    #[tokio::test]
    async fn test_get_by_slug_is_refreshed_after_update() {
        let (_, service) = setup_test_service().await;
        let created = service.create(input("Original")).await.unwrap();

        let cached = service.get_by_slug(&created.slug).await.unwrap().unwrap();
        assert_eq!(cached.title, "Original");

        service
            .update(created.id, UpdateArticleInput::new().with_title("Revised"))
            .await
            .unwrap();

        let fresh = service.get_by_slug(&created.slug).await.unwrap().unwrap();
        assert_eq!(fresh.title, "Revised");
        let fresh = service.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fresh.title, "Revised");
    }

    #[tokio::test]
    async fn test_list_filters_by_category() {
        let (_, service) = setup_test_service().await;
        service
            .create(CreateArticleInput::new("A", "x", vec!["sports".into()]))
            .await
            .unwrap();
        service
            .create(CreateArticleInput::new("B", "x", vec!["politics".into()]))
            .await
            .unwrap();

        let params = ListParams::new(1, 10);
        assert_eq!(service.list(&params, None).await.unwrap().total, 2);
        let sports = service.list(&params, Some("sports")).await.unwrap();
        assert_eq!(sports.total, 1);
        assert_eq!(sports.items[0].title, "A");
        assert_eq!(service.list(&params, Some("  ")).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_list_cache_invalidated_by_create() {
        let (_, service) = setup_test_service().await;
        let params = ListParams::new(1, 10);
        service.create(input("First")).await.unwrap();
        assert_eq!(service.list(&params, None).await.unwrap().total, 1);

        service.create(input("Second")).await.unwrap();
        assert_eq!(service.list(&params, None).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_latest_headlines_is_top_four() {
        let (_, service) = setup_test_service().await;
        for n in 0..6 {
            service.create(dated(&format!("Story {}", n), n)).await.unwrap();
        }

        let latest = service.latest_headlines().await.unwrap();
        let titles: Vec<_> = latest.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Story 5", "Story 4", "Story 3", "Story 2"]);
    }

    #[tokio::test]
    async fn test_featured_and_trending_rails() {
        let (repo, service) = setup_test_service().await;
        let a = service.create(dated("A", 0)).await.unwrap();
        let b = service.create(dated("B", 1)).await.unwrap();
        repo.update_flags(a.id, &FlagUpdate::featured(true)).await.unwrap();
        repo.update_flags(b.id, &FlagUpdate::trending(Some("Storms".into())))
            .await
            .unwrap();

        let featured = service.list_featured().await.unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].id, a.id);

        let trending = service.list_trending().await.unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].trending_topic.as_deref(), Some("Storms"));
    }

    #[tokio::test]
    async fn test_search() {
        let (_, service) = setup_test_service().await;
        service.create(input("Budget vote")).await.unwrap();
        service.create(input("Match report")).await.unwrap();

        let result = service.search("budget", &ListParams::default()).await.unwrap();
        assert_eq!(result.total, 1);
        assert!(matches!(
            service.search("  ", &ListParams::default()).await,
            Err(ArticleServiceError::ValidationError(_))
        ));
    }

    // ========================================================================
    // Update / delete / views
    // ========================================================================

    #[tokio::test]
    async fn test_update_validation() {
        let (_, service) = setup_test_service().await;
        let a = service.create(input("A").with_slug("a")).await.unwrap();
        service.create(input("B").with_slug("b")).await.unwrap();

        let result = service.update(a.id, UpdateArticleInput::new().with_title(" ")).await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));

        let result = service
            .update(a.id, UpdateArticleInput::new().with_categories(vec!["".into()]))
            .await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));

        let taken = UpdateArticleInput {
            slug: Some("b".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(a.id, taken).await,
            Err(ArticleServiceError::DuplicateSlug(_))
        ));

        let same = UpdateArticleInput {
            slug: Some("a".into()),
            ..Default::default()
        };
        assert!(service.update(a.id, same).await.is_ok());

        assert!(matches!(
            service.update(999, UpdateArticleInput::new().with_title("x")).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_does_not_touch_flags() {
        let (repo, service) = setup_test_service().await;
        let a = service.create(input("A")).await.unwrap();
        repo.update_flags(a.id, &FlagUpdate::trending(Some("Storms".into())))
            .await
            .unwrap();

        let updated = service
            .update(a.id, UpdateArticleInput::new().with_content("<p>new</p>"))
            .await
            .unwrap();
        assert!(updated.is_trending);
        assert_eq!(updated.trending_topic.as_deref(), Some("Storms"));
    }

    #[tokio::test]
    async fn test_delete_and_views() {
        let (_, service) = setup_test_service().await;
        let a = service.create(input("A")).await.unwrap();

        service.record_view(a.id).await.unwrap();
        service.record_view(a.id).await.unwrap();
        assert_eq!(service.total_views().await.unwrap(), 2);

        service.delete(a.id).await.unwrap();
        assert!(service.get_by_id(a.id).await.unwrap().is_none());
        assert!(matches!(service.delete(a.id).await, Err(ArticleServiceError::NotFound(_))));
        assert!(matches!(
            service.record_view(a.id).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Pages never exceed `per_page`, report the full total and come back
        /// newest first.
        #[test]
        fn property_list_pagination_sorting(
            article_count in 1..10i64,
            page in 1..5u32,
            per_page in 1..10u32
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (_, service) = setup_test_service().await;
                for n in 0..article_count {
                    service.create(dated(&format!("Story {}", n), n)).await.unwrap();
                }

                let params = ListParams::new(page, per_page);
                let result = service.list(&params, None).await.unwrap();

                prop_assert_eq!(result.total, article_count);
                prop_assert!(result.items.len() <= per_page as usize);
                let expected = (article_count - params.offset()).clamp(0, per_page as i64);
                prop_assert_eq!(result.items.len() as i64, expected);
                for pair in result.items.windows(2) {
                    prop_assert!(pair[0].created_at > pair[1].created_at);
                }
                Ok(())
            });
            result?;
        }
    }
}
