//! Administrative write operations over posts and tags.
//!
//! Every derived field (slug, excerpt, rendered HTML, reading time) is
//! computed here at write time, so the persistence layer stores only
//! finished values.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::render::render_markdown;
use crate::application::repos::{
    CreatePostParams, PostListScope, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError,
    TagsRepo, TagsWriteRepo, UpdatePostParams,
};
use crate::domain::entities::{PostRecord, TagRecord, TagWithCount};
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async};
use crate::domain::text::{derive_excerpt, reading_minutes};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("`{0}` must not be empty")]
    EmptyField(&'static str),
    #[error("post not found")]
    NotFound,
    #[error("could not derive a unique slug")]
    SlugCollision,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugError> for ContentError {
    fn from(err: SlugError) -> Self {
        match err {
            SlugError::EmptyInput | SlugError::Unrepresentable { .. } => {
                ContentError::EmptyField("title")
            }
            SlugError::Exhausted { .. } => ContentError::SlugCollision,
        }
    }
}

impl From<SlugAsyncError<RepoError>> for ContentError {
    fn from(err: SlugAsyncError<RepoError>) -> Self {
        match err {
            SlugAsyncError::Slug(inner) => inner.into(),
            SlugAsyncError::Predicate(inner) => ContentError::Repo(inner),
        }
    }
}

/// Author-supplied fields for creating or updating a post.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    /// Explicit excerpt; derived from the body when blank.
    pub excerpt: Option<String>,
    pub body_markdown: String,
    /// Raw tag names; normalized and deduplicated here.
    pub tags: Vec<String>,
    pub published: bool,
    pub featured: bool,
    /// Stored upload path for the cover image, when one is set.
    pub cover_image: Option<String>,
}

#[derive(Clone)]
pub struct ContentService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    tags: Arc<dyn TagsRepo>,
    tags_write: Arc<dyn TagsWriteRepo>,
}

impl ContentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        tags: Arc<dyn TagsRepo>,
        tags_write: Arc<dyn TagsWriteRepo>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            tags,
            tags_write,
        }
    }

    pub async fn create(&self, draft: PostDraft) -> Result<PostRecord, ContentError> {
        let title = required(&draft.title, "title")?;
        let body = required(&draft.body_markdown, "body")?;

        let posts = self.posts.clone();
        let slug = generate_unique_slug_async(&title, move |candidate| {
            let posts = posts.clone();
            let candidate = candidate.to_string();
            async move { posts.find_by_slug(&candidate).await.map(|hit| hit.is_none()) }
        })
        .await?;

        let now = OffsetDateTime::now_utc();
        let params = CreatePostParams {
            slug,
            excerpt: resolve_excerpt(draft.excerpt.as_deref(), &body),
            body_html: render_markdown(&body),
            reading_minutes: reading_minutes(&body),
            title,
            body_markdown: body,
            cover_image: draft.cover_image,
            published: draft.published,
            featured: draft.featured,
            published_at: draft.published.then_some(now),
        };

        let post = self.posts_write.create_post(params).await?;
        let tag_ids = self.resolve_tags(&draft.tags).await?;
        self.posts_write.replace_post_tags(post.id, &tag_ids).await?;

        Ok(post)
    }

    pub async fn update(&self, id: Uuid, draft: PostDraft) -> Result<PostRecord, ContentError> {
        let title = required(&draft.title, "title")?;
        let body = required(&draft.body_markdown, "body")?;

        let existing = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(ContentError::NotFound)?;

        // The slug stays stable unless the title actually changed.
        let slug = if title == existing.title {
            existing.slug.clone()
        } else {
            let posts = self.posts.clone();
            generate_unique_slug_async(&title, move |candidate| {
                let posts = posts.clone();
                let candidate = candidate.to_string();
                async move {
                    posts
                        .find_by_slug(&candidate)
                        .await
                        .map(|hit| hit.is_none_or(|other| other.id == id))
                }
            })
            .await?
        };

        let published_at = if draft.published {
            existing
                .published_at
                .or_else(|| Some(OffsetDateTime::now_utc()))
        } else {
            existing.published_at
        };

        let params = UpdatePostParams {
            id,
            slug,
            excerpt: resolve_excerpt(draft.excerpt.as_deref(), &body),
            body_html: render_markdown(&body),
            reading_minutes: reading_minutes(&body),
            title,
            body_markdown: body,
            cover_image: draft.cover_image,
            published: draft.published,
            featured: draft.featured,
            published_at,
        };

        let post = self.posts_write.update_post(params).await?;
        let tag_ids = self.resolve_tags(&draft.tags).await?;
        self.posts_write.replace_post_tags(post.id, &tag_ids).await?;

        Ok(post)
    }

    /// Remove the post and its tag associations. The record is returned so
    /// callers can clean up the stored cover image.
    pub async fn delete(&self, id: Uuid) -> Result<PostRecord, ContentError> {
        let existing = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(ContentError::NotFound)?;

        self.posts_write.delete_post(id).await?;
        Ok(existing)
    }

    pub async fn set_published(
        &self,
        id: Uuid,
        published: bool,
    ) -> Result<PostRecord, ContentError> {
        let existing = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(ContentError::NotFound)?;

        let published_at = if published {
            existing
                .published_at
                .or_else(|| Some(OffsetDateTime::now_utc()))
        } else {
            existing.published_at
        };

        self.posts_write
            .set_published(id, published, published_at)
            .await
            .map_err(ContentError::from)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, ContentError> {
        self.posts.find_by_id(id).await.map_err(ContentError::from)
    }

    pub async fn list(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, ContentError> {
        self.posts
            .list_posts(scope, filter, page)
            .await
            .map_err(ContentError::from)
    }

    pub async fn count(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, ContentError> {
        self.posts
            .count_posts(scope, filter)
            .await
            .map_err(ContentError::from)
    }

    pub async fn total_views(&self) -> Result<i64, ContentError> {
        self.posts.sum_views().await.map_err(ContentError::from)
    }

    pub async fn tags_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, ContentError> {
        self.tags
            .list_for_post(post_id)
            .await
            .map_err(ContentError::from)
    }

    pub async fn list_tags_with_counts(&self) -> Result<Vec<TagWithCount>, ContentError> {
        self.tags
            .list_with_counts()
            .await
            .map_err(ContentError::from)
    }

    /// Remove a tag, detaching it from every post. The posts survive.
    pub async fn delete_tag(&self, id: Uuid) -> Result<(), ContentError> {
        self.tags_write
            .delete_tag(id)
            .await
            .map_err(ContentError::from)
    }

    /// Normalize, deduplicate and get-or-create the given tag names.
    async fn resolve_tags(&self, names: &[String]) -> Result<Vec<Uuid>, ContentError> {
        let mut normalized: Vec<String> = Vec::new();
        for raw in names {
            let name = raw.trim().to_lowercase();
            if name.is_empty() || normalized.contains(&name) {
                continue;
            }
            normalized.push(name);
        }

        let mut ids = Vec::with_capacity(normalized.len());
        for name in normalized {
            let tag = match self.tags.find_by_name(&name).await? {
                Some(tag) => tag,
                None => self.create_tag(&name).await?,
            };
            ids.push(tag.id);
        }

        Ok(ids)
    }

    async fn create_tag(&self, name: &str) -> Result<TagRecord, ContentError> {
        let tags = self.tags.clone();
        let slug = generate_unique_slug_async(name, move |candidate| {
            let tags = tags.clone();
            let candidate = candidate.to_string();
            async move { tags.find_by_slug(&candidate).await.map(|hit| hit.is_none()) }
        })
        .await?;

        match self.tags_write.create_tag(&slug, name).await {
            Ok(tag) => Ok(tag),
            // Lost a create race: the winner's row is the tag we wanted.
            Err(RepoError::Duplicate { .. }) => self
                .tags
                .find_by_name(name)
                .await?
                .ok_or(ContentError::SlugCollision),
            Err(err) => Err(err.into()),
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ContentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ContentError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

fn resolve_excerpt(explicit: Option<&str>, body: &str) -> String {
    match explicit.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => derive_excerpt(body),
    }
}

/// Split a comma-separated tag field into raw names.
pub fn split_tag_field(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
