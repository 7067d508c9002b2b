//! In-memory repository fakes and a router harness for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use foglio::application::auth::AuthService;
use foglio::application::content::ContentService;
use foglio::application::feed::FeedService;
use foglio::application::pagination::{Page, PageRequest};
use foglio::application::repos::{
    CreatePostParams, PostListScope, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError,
    SessionsRepo, SettingsRepo, TagsRepo, TagsWriteRepo, UpdatePostParams, UsersRepo,
};
use foglio::application::settings::SettingsService;
use foglio::config::{PaginationSettings, SiteSettings};
use foglio::domain::entities::{
    AdminUserRecord, PostRecord, SessionRecord, SettingRecord, TagRecord, TagWithCount,
};
use foglio::infra::http::{AppState, build_router};
use foglio::infra::uploads::UploadStorage;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

pub const TEST_SECRET_KEY: &str = "integration-test-secret-key-0123456789abcdef";
pub const TEST_ADMIN_USERNAME: &str = "admin";
pub const TEST_ADMIN_PASSWORD: &str = "admin123";

#[derive(Default)]
struct Store {
    posts: Vec<PostRecord>,
    tags: Vec<TagRecord>,
    post_tags: HashMap<Uuid, Vec<Uuid>>,
    users: Vec<AdminUserRecord>,
    sessions: Vec<SessionRecord>,
    settings: HashMap<String, String>,
}

/// A single fake backing every repository trait, mirroring the relational
/// semantics the tests depend on (scopes, filters, detach-on-delete).
#[derive(Default)]
pub struct MemoryRepos {
    store: Mutex<Store>,
}

impl MemoryRepos {
    pub fn post_count(&self) -> usize {
        self.store.lock().unwrap().posts.len()
    }

    pub fn post_by_id(&self, id: Uuid) -> Option<PostRecord> {
        self.store
            .lock()
            .unwrap()
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
    }

    fn matches_filter(store: &Store, post: &PostRecord, filter: &PostQueryFilter) -> bool {
        if let Some(tag_slug) = filter.tag.as_ref() {
            let Some(tag) = store.tags.iter().find(|tag| &tag.slug == tag_slug) else {
                return false;
            };
            let attached = store
                .post_tags
                .get(&post.id)
                .map(|ids| ids.contains(&tag.id))
                .unwrap_or(false);
            if !attached {
                return false;
            }
        }

        if let Some(search) = filter.search.as_ref() {
            let needle = search.to_lowercase();
            let hit = post.title.to_lowercase().contains(&needle)
                || post.body_markdown.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        true
    }

    fn collect(store: &Store, scope: PostListScope, filter: &PostQueryFilter) -> Vec<PostRecord> {
        let mut rows: Vec<PostRecord> = store
            .posts
            .iter()
            .filter(|post| match scope {
                PostListScope::Public => post.published,
                PostListScope::Admin { published } => {
                    published.is_none_or(|wanted| post.published == wanted)
                }
            })
            .filter(|post| Self::matches_filter(store, post, filter))
            .cloned()
            .collect();

        match scope {
            PostListScope::Public => rows.sort_by_key(|post| {
                std::cmp::Reverse(post.published_at.unwrap_or(post.created_at))
            }),
            PostListScope::Admin { .. } => {
                rows.sort_by_key(|post| std::cmp::Reverse(post.created_at))
            }
        }

        rows
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let store = self.store.lock().unwrap();
        let rows = Self::collect(&store, scope, filter);
        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError> {
        let store = self.store.lock().unwrap();
        Ok(Self::collect(&store, scope, filter).len() as u64)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .posts
            .iter()
            .find(|post| post.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.post_by_id(id))
    }

    async fn find_featured(&self) -> Result<Option<PostRecord>, RepoError> {
        let store = self.store.lock().unwrap();
        let mut rows: Vec<PostRecord> = store
            .posts
            .iter()
            .filter(|post| post.published && post.featured)
            .cloned()
            .collect();
        rows.sort_by_key(|post| std::cmp::Reverse(post.published_at.unwrap_or(post.created_at)));
        Ok(rows.into_iter().next())
    }

    async fn list_related(
        &self,
        post_id: Uuid,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let store = self.store.lock().unwrap();
        let own_tags = store.post_tags.get(&post_id).cloned().unwrap_or_default();
        let mut rows: Vec<PostRecord> = store
            .posts
            .iter()
            .filter(|post| post.published && post.id != post_id)
            .filter(|post| {
                store
                    .post_tags
                    .get(&post.id)
                    .map(|ids| ids.iter().any(|id| own_tags.contains(id)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|post| std::cmp::Reverse(post.published_at.unwrap_or(post.created_at)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn sum_views(&self) -> Result<i64, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .posts
            .iter()
            .map(|post| post.views)
            .sum())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut store = self.store.lock().unwrap();
        if store.posts.iter().any(|post| post.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "posts_slug_key".to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            excerpt: params.excerpt,
            body_markdown: params.body_markdown,
            body_html: params.body_html,
            reading_minutes: params.reading_minutes,
            cover_image: params.cover_image,
            published: params.published,
            featured: params.featured,
            views: 0,
            published_at: params.published_at,
            created_at: now,
            updated_at: now,
        };
        store.posts.push(record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut store = self.store.lock().unwrap();
        let post = store
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.slug = params.slug;
        post.title = params.title;
        post.excerpt = params.excerpt;
        post.body_markdown = params.body_markdown;
        post.body_html = params.body_html;
        post.reading_minutes = params.reading_minutes;
        post.cover_image = params.cover_image;
        post.published = params.published;
        post.featured = params.featured;
        post.published_at = params.published_at;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn set_published(
        &self,
        id: Uuid,
        published: bool,
        published_at: Option<OffsetDateTime>,
    ) -> Result<PostRecord, RepoError> {
        let mut store = self.store.lock().unwrap();
        let post = store
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(RepoError::NotFound)?;
        post.published = published;
        post.published_at = published_at;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().unwrap();
        store.posts.retain(|post| post.id != id);
        store.post_tags.remove(&id);
        Ok(())
    }

    async fn replace_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        self.store
            .lock()
            .unwrap()
            .post_tags
            .insert(post_id, tag_ids.to_vec());
        Ok(())
    }

    async fn increment_views(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().unwrap();
        if let Some(post) = store.posts.iter_mut().find(|post| post.id == id) {
            post.views += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl TagsRepo for MemoryRepos {
    async fn list_all(&self) -> Result<Vec<TagRecord>, RepoError> {
        let mut tags = self.store.lock().unwrap().tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let store = self.store.lock().unwrap();
        let mut counts: Vec<TagWithCount> = store
            .tags
            .iter()
            .map(|tag| {
                let count = store
                    .posts
                    .iter()
                    .filter(|post| post.published)
                    .filter(|post| {
                        store
                            .post_tags
                            .get(&post.id)
                            .map(|ids| ids.contains(&tag.id))
                            .unwrap_or(false)
                    })
                    .count() as i64;
                TagWithCount {
                    id: tag.id,
                    slug: tag.slug.clone(),
                    name: tag.name.clone(),
                    count,
                }
            })
            .collect();
        counts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counts)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let store = self.store.lock().unwrap();
        let ids = store.post_tags.get(&post_id).cloned().unwrap_or_default();
        let mut tags: Vec<TagRecord> = store
            .tags
            .iter()
            .filter(|tag| ids.contains(&tag.id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .tags
            .iter()
            .find(|tag| tag.slug == slug)
            .cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<TagRecord>, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .tags
            .iter()
            .find(|tag| tag.name == name)
            .cloned())
    }
}

#[async_trait]
impl TagsWriteRepo for MemoryRepos {
    async fn create_tag(&self, slug: &str, name: &str) -> Result<TagRecord, RepoError> {
        let mut store = self.store.lock().unwrap();
        if store.tags.iter().any(|tag| tag.name == name || tag.slug == slug) {
            return Err(RepoError::Duplicate {
                constraint: "tags_name_key".to_string(),
            });
        }

        let record = TagRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        store.tags.push(record.clone());
        Ok(record)
    }

    async fn delete_tag(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().unwrap();
        store.tags.retain(|tag| tag.id != id);
        for ids in store.post_tags.values_mut() {
            ids.retain(|tag_id| *tag_id != id);
        }
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AdminUserRecord>, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AdminUserRecord>, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn count_users(&self) -> Result<u64, RepoError> {
        Ok(self.store.lock().unwrap().users.len() as u64)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<AdminUserRecord, RepoError> {
        let record = AdminUserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.lock().unwrap().users.push(record.clone());
        Ok(record)
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepoError> {
        let mut store = self.store.lock().unwrap();
        let user = store
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepos {
    async fn insert_session(&self, session: SessionRecord) -> Result<(), RepoError> {
        self.store.lock().unwrap().sessions.push(session);
        Ok(())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError> {
        self.store
            .lock()
            .unwrap()
            .sessions
            .retain(|session| session.prefix != prefix);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut store = self.store.lock().unwrap();
        let before = store.sessions.len();
        store.sessions.retain(|session| session.expires_at > now);
        Ok((before - store.sessions.len()) as u64)
    }
}

#[async_trait]
impl SettingsRepo for MemoryRepos {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingRecord>, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .settings
            .get(key)
            .map(|value| SettingRecord {
                key: key.to_string(),
                value: value.clone(),
                updated_at: OffsetDateTime::now_utc(),
            }))
    }

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<(), RepoError> {
        self.store
            .lock()
            .unwrap()
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub repos: Arc<MemoryRepos>,
    pub content: Arc<ContentService>,
    pub auth: Arc<AuthService>,
    _uploads_dir: TempDir,
}

/// Build the real application router over in-memory repositories, with the
/// default admin credential seeded.
pub async fn test_app() -> TestApp {
    let repos = Arc::new(MemoryRepos::default());

    let feed = Arc::new(FeedService::new(repos.clone(), repos.clone(), repos.clone()));
    let content = Arc::new(ContentService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
    ));
    let auth = Arc::new(AuthService::new(
        repos.clone(),
        repos.clone(),
        Duration::from_secs(3600),
    ));
    let settings = Arc::new(SettingsService::new(repos.clone()));

    auth.ensure_seed_admin(TEST_ADMIN_USERNAME, TEST_ADMIN_PASSWORD)
        .await
        .expect("seed admin");

    let uploads_dir = TempDir::new().expect("tempdir");
    let upload_storage = Arc::new(
        UploadStorage::new(uploads_dir.path().to_path_buf(), 1024 * 1024).expect("storage"),
    );

    let site = SiteSettings {
        title: "Test Blog".to_string(),
        subtitle: "Testing".to_string(),
        author: "Tester".to_string(),
    };
    let pagination = PaginationSettings {
        posts_per_page: NonZeroU32::new(10).expect("non-zero"),
        admin_page_size: NonZeroU32::new(20).expect("non-zero"),
    };

    let state = AppState::new(
        feed,
        content.clone(),
        auth.clone(),
        settings,
        upload_storage,
        None,
        site,
        pagination,
        1024 * 1024,
        TEST_SECRET_KEY,
    );

    TestApp {
        router: build_router(state),
        repos,
        content,
        auth,
        _uploads_dir: uploads_dir,
    }
}
