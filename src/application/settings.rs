//! Editable site settings backing the about page.

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::application::render::render_markdown;
use crate::application::repos::{RepoError, SettingsRepo};

const KEY_ABOUT_TITLE: &str = "about_title";
const KEY_ABOUT_INTRO: &str = "about_intro";
const KEY_ABOUT_CONTENT: &str = "about_content";
const KEY_ABOUT_CONTENT_HTML: &str = "about_content_html";
const KEY_TWITTER_URL: &str = "twitter_url";
const KEY_GITHUB_URL: &str = "github_url";
const KEY_LINKEDIN_URL: &str = "linkedin_url";

const DEFAULT_ABOUT_TITLE: &str = "Welcome to my blog";
const DEFAULT_ABOUT_INTRO: &str = "Sharing thoughts, stories, and ideas with the world.";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("`{field}` is not a valid http(s) URL")]
    InvalidUrl { field: &'static str },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// About-page content as rendered publicly, defaults applied.
#[derive(Debug, Clone)]
pub struct AboutContent {
    pub title: String,
    pub intro: String,
    pub content_markdown: String,
    pub content_html: String,
    pub twitter_url: String,
    pub github_url: String,
    pub linkedin_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct AboutUpdate {
    pub title: String,
    pub intro: String,
    pub content_markdown: String,
    pub twitter_url: String,
    pub github_url: String,
    pub linkedin_url: String,
}

#[derive(Clone)]
pub struct SettingsService {
    repo: Arc<dyn SettingsRepo>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepo>) -> Self {
        Self { repo }
    }

    pub async fn about(&self) -> Result<AboutContent, SettingsError> {
        Ok(AboutContent {
            title: self.get_or(KEY_ABOUT_TITLE, DEFAULT_ABOUT_TITLE).await?,
            intro: self.get_or(KEY_ABOUT_INTRO, DEFAULT_ABOUT_INTRO).await?,
            content_markdown: self.get_or(KEY_ABOUT_CONTENT, "").await?,
            content_html: self.get_or(KEY_ABOUT_CONTENT_HTML, "").await?,
            twitter_url: self.get_or(KEY_TWITTER_URL, "").await?,
            github_url: self.get_or(KEY_GITHUB_URL, "").await?,
            linkedin_url: self.get_or(KEY_LINKEDIN_URL, "").await?,
        })
    }

    pub async fn update_about(&self, update: AboutUpdate) -> Result<(), SettingsError> {
        validate_url_field(&update.twitter_url, "twitter_url")?;
        validate_url_field(&update.github_url, "github_url")?;
        validate_url_field(&update.linkedin_url, "linkedin_url")?;

        let content_html = render_markdown(&update.content_markdown);

        self.repo
            .upsert_setting(KEY_ABOUT_TITLE, update.title.trim())
            .await?;
        self.repo
            .upsert_setting(KEY_ABOUT_INTRO, update.intro.trim())
            .await?;
        self.repo
            .upsert_setting(KEY_ABOUT_CONTENT, &update.content_markdown)
            .await?;
        self.repo
            .upsert_setting(KEY_ABOUT_CONTENT_HTML, &content_html)
            .await?;
        self.repo
            .upsert_setting(KEY_TWITTER_URL, update.twitter_url.trim())
            .await?;
        self.repo
            .upsert_setting(KEY_GITHUB_URL, update.github_url.trim())
            .await?;
        self.repo
            .upsert_setting(KEY_LINKEDIN_URL, update.linkedin_url.trim())
            .await?;

        Ok(())
    }

    async fn get_or(&self, key: &str, default: &str) -> Result<String, SettingsError> {
        Ok(self
            .repo
            .get_setting(key)
            .await?
            .map(|record| record.value)
            .unwrap_or_else(|| default.to_string()))
    }
}

fn validate_url_field(value: &str, field: &'static str) -> Result<(), SettingsError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(SettingsError::InvalidUrl { field }),
    }
}
