//! Public read operations: homepage, post detail, tag pages, search.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{
    PostListScope, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError, TagsRepo,
};
use crate::domain::entities::{PostRecord, TagRecord, TagWithCount};

const RELATED_POST_LIMIT: u32 = 3;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown tag")]
    UnknownTag,
    #[error("post not found")]
    PostNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A post summary together with its tags, ready for card rendering.
#[derive(Debug, Clone)]
pub struct PostWithTags {
    pub post: PostRecord,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone)]
pub struct HomeContext {
    pub featured: Option<PostWithTags>,
    pub posts: Page<PostWithTags>,
    pub tags: Vec<TagWithCount>,
}

#[derive(Debug, Clone)]
pub struct PostDetailContext {
    pub post: PostRecord,
    pub tags: Vec<TagRecord>,
    pub related: Vec<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct TagPageContext {
    pub tag: TagRecord,
    pub posts: Page<PostWithTags>,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    tags: Arc<dyn TagsRepo>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        tags: Arc<dyn TagsRepo>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            tags,
        }
    }

    /// Homepage: the newest featured published post, recent published posts
    /// (featured excluded), and the tag cloud.
    pub async fn home(&self, page: PageRequest) -> Result<HomeContext, FeedError> {
        let featured = self.posts.find_featured().await?;

        let listing = self
            .posts
            .list_posts(PostListScope::Public, &PostQueryFilter::default(), page)
            .await?;

        let featured_id = featured.as_ref().map(|post| post.id);
        let mut cards = Vec::with_capacity(listing.items.len());
        for post in listing.items.iter().cloned() {
            if Some(post.id) == featured_id {
                continue;
            }
            cards.push(self.with_tags(post).await?);
        }

        let posts = Page {
            items: cards,
            page: listing.page,
            per_page: listing.per_page,
            total_items: listing.total_items,
        };

        let featured = match featured {
            Some(post) => Some(self.with_tags(post).await?),
            None => None,
        };

        let tags = self.tags.list_with_counts().await?;
        let tags = tags.into_iter().filter(|tag| tag.count > 0).collect();

        Ok(HomeContext {
            featured,
            posts,
            tags,
        })
    }

    /// Published post by slug, with its tags and up to three related posts.
    /// The view counter increments out-of-band so a slow write never delays
    /// the response.
    pub async fn post_by_slug(&self, slug: &str) -> Result<PostDetailContext, FeedError> {
        let post = self
            .posts
            .find_by_slug(slug)
            .await?
            .filter(|post| post.published)
            .ok_or(FeedError::PostNotFound)?;

        let tags = self.tags.list_for_post(post.id).await?;
        let related = self.posts.list_related(post.id, RELATED_POST_LIMIT).await?;

        let writer = self.posts_write.clone();
        let post_id = post.id;
        tokio::spawn(async move {
            if let Err(err) = writer.increment_views(post_id).await {
                warn!(
                    target = "foglio::feed",
                    post_id = %post_id,
                    error = %err,
                    "view counter increment failed"
                );
            }
        });

        Ok(PostDetailContext {
            post,
            tags,
            related,
        })
    }

    pub async fn tag_page(
        &self,
        tag_slug: &str,
        page: PageRequest,
    ) -> Result<TagPageContext, FeedError> {
        let tag = self
            .tags
            .find_by_slug(tag_slug)
            .await?
            .ok_or(FeedError::UnknownTag)?;

        let filter = PostQueryFilter {
            tag: Some(tag.slug.clone()),
            search: None,
        };
        let listing = self
            .posts
            .list_posts(PostListScope::Public, &filter, page)
            .await?;

        let mut cards = Vec::with_capacity(listing.items.len());
        for post in listing.items.iter().cloned() {
            cards.push(self.with_tags(post).await?);
        }

        Ok(TagPageContext {
            tag,
            posts: Page {
                items: cards,
                page: listing.page,
                per_page: listing.per_page,
                total_items: listing.total_items,
            },
        })
    }

    /// Case-insensitive substring search over title and body, published
    /// posts only.
    pub async fn search(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<PostWithTags>, FeedError> {
        let filter = PostQueryFilter {
            tag: None,
            search: Some(query.to_string()),
        };
        let listing = self
            .posts
            .list_posts(PostListScope::Public, &filter, page)
            .await?;

        let mut cards = Vec::with_capacity(listing.items.len());
        for post in listing.items.iter().cloned() {
            cards.push(self.with_tags(post).await?);
        }

        Ok(Page {
            items: cards,
            page: listing.page,
            per_page: listing.per_page,
            total_items: listing.total_items,
        })
    }

    async fn with_tags(&self, post: PostRecord) -> Result<PostWithTags, FeedError> {
        let tags = self.tags.list_for_post(post.id).await?;
        Ok(PostWithTags { post, tags })
    }
}
