//! Web story model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slideshow-style visual story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebStory {
    pub id: i64,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// Slides in display order
    pub slides: Vec<StorySlide>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One full-screen slide of a web story
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySlide {
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    /// Optional swipe-up link, usually to the full article
    #[serde(default)]
    pub link_url: Option<String>,
}

impl StorySlide {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            caption: None,
            link_url: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateWebStoryInput {
    #[serde(default)]
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub slides: Vec<StorySlide>,
}

impl CreateWebStoryInput {
    pub fn new(title: impl Into<String>, slides: Vec<StorySlide>) -> Self {
        Self {
            title: title.into(),
            slides,
            ..Default::default()
        }
    }
}

/// Absent fields keep their stored value; `slides` replaces the whole list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWebStoryInput {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub cover_image_url: Option<String>,
    pub slides: Option<Vec<StorySlide>>,
}
