//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{
    AdminUserRecord, PostRecord, SessionRecord, SettingRecord, TagRecord, TagWithCount,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Visibility scope for post listings.
#[derive(Debug, Clone, Copy)]
pub enum PostListScope {
    /// Published posts only, newest publication first.
    Public,
    /// Every post, newest creation first, optionally filtered by state.
    Admin { published: Option<bool> },
}

#[derive(Debug, Clone, Default)]
pub struct PostQueryFilter {
    /// Restrict to posts carrying the tag with this slug.
    pub tag: Option<String>,
    /// Case-insensitive substring over title and body.
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub body_html: String,
    pub reading_minutes: i32,
    pub cover_image: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub body_html: String,
    pub reading_minutes: i32,
    pub cover_image: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub published_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError>;

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    /// Newest published featured post, if any.
    async fn find_featured(&self) -> Result<Option<PostRecord>, RepoError>;

    /// Published posts sharing at least one tag with `post_id`.
    async fn list_related(&self, post_id: Uuid, limit: u32)
    -> Result<Vec<PostRecord>, RepoError>;

    async fn sum_views(&self) -> Result<i64, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn set_published(
        &self,
        id: Uuid,
        published: bool,
        published_at: Option<OffsetDateTime>,
    ) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;

    /// Replace the post's tag set. The new set is attached verbatim; callers
    /// are responsible for deduplication.
    async fn replace_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError>;

    /// Single atomic view-counter increment.
    async fn increment_views(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn list_all(&self) -> Result<Vec<TagRecord>, RepoError>;

    /// Tags with their published-post usage counts, unused tags included.
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError>;

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<TagRecord>, RepoError>;
}

#[async_trait]
pub trait TagsWriteRepo: Send + Sync {
    async fn create_tag(&self, slug: &str, name: &str) -> Result<TagRecord, RepoError>;

    /// Removes the tag and detaches it from every post; the posts survive.
    async fn delete_tag(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_username(&self, username: &str)
    -> Result<Option<AdminUserRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AdminUserRecord>, RepoError>;

    async fn count_users(&self) -> Result<u64, RepoError>;

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<AdminUserRecord, RepoError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str)
    -> Result<(), RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn insert_session(&self, session: SessionRecord) -> Result<(), RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError>;

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError>;

    /// Remove every session that expired before `now`; returns the count.
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingRecord>, RepoError>;

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<(), RepoError>;
}
