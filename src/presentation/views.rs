//! Public-site view models and template rendering helpers.

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::PostWithTags;
use crate::application::pagination::Page;
use crate::config::SiteSettings;
use crate::domain::entities::{TagRecord, TagWithCount};

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
pub const ISO_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        HttpError::from_error(
            err.source,
            StatusCode::INTERNAL_SERVER_ERROR,
            err.public_message,
            &err.error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError {
            source: "presentation::views::render_template",
            public_message: "Template rendering failed",
            error: err,
        }
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: SiteChrome) -> Response {
    let template = ErrorTemplate {
        chrome,
        heading: "Page not found",
        detail: "The page you are looking for does not exist or has moved.",
    };
    let mut response = render_template_response(template, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Masthead and footer values shared by every public page.
#[derive(Clone)]
pub struct SiteChrome {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub year: i32,
}

impl SiteChrome {
    pub fn from_settings(site: &SiteSettings) -> Self {
        Self {
            title: site.title.clone(),
            subtitle: site.subtitle.clone(),
            author: site.author.clone(),
            year: OffsetDateTime::now_utc().year(),
        }
    }
}

#[derive(Clone)]
pub struct TagBadge {
    pub slug: String,
    pub name: String,
}

impl From<TagRecord> for TagBadge {
    fn from(tag: TagRecord) -> Self {
        Self {
            slug: tag.slug,
            name: tag.name,
        }
    }
}

#[derive(Clone)]
pub struct TagChip {
    pub slug: String,
    pub name: String,
    pub count: i64,
}

impl From<TagWithCount> for TagChip {
    fn from(tag: TagWithCount) -> Self {
        Self {
            slug: tag.slug,
            name: tag.name,
            count: tag.count,
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub reading_minutes: i32,
    pub iso_date: String,
    pub display_date: String,
    pub badges: Vec<TagBadge>,
    pub cover_image: Option<String>,
}

impl From<PostWithTags> for PostCard {
    fn from(card: PostWithTags) -> Self {
        let date = card.post.published_at.unwrap_or(card.post.created_at);
        Self {
            slug: card.post.slug,
            title: card.post.title,
            excerpt: card.post.excerpt,
            reading_minutes: card.post.reading_minutes,
            iso_date: format_iso_date(date),
            display_date: format_human_date(date),
            badges: card.tags.into_iter().map(TagBadge::from).collect(),
            cover_image: card.post.cover_image,
        }
    }
}

/// Ready-to-render pagination links; handlers precompute the hrefs.
#[derive(Clone, Default)]
pub struct PaginationView {
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    pub page: u32,
    pub total_pages: u32,
}

impl PaginationView {
    /// Build links as `base_path?{extra_query}&page=N`, omitting the page
    /// parameter noise when there is only one page.
    pub fn build<T>(page: &Page<T>, base_path: &str, extra_query: &str) -> Self {
        let href = |number: u32| {
            let separator = if extra_query.is_empty() { "" } else { "&" };
            format!("{base_path}?{extra_query}{separator}page={number}")
        };

        Self {
            prev_href: page.prev_page().map(href),
            next_href: page.next_page().map(href),
            page: page.page,
            total_pages: page.total_pages(),
        }
    }

    pub fn is_paged(&self) -> bool {
        self.total_pages > 1
    }
}

pub struct PostDetailView {
    pub title: String,
    pub body_html: String,
    pub iso_date: String,
    pub display_date: String,
    pub reading_minutes: i32,
    pub views: i64,
    pub badges: Vec<TagBadge>,
    pub cover_image: Option<String>,
}

pub struct RelatedPostView {
    pub slug: String,
    pub title: String,
}

pub struct AboutView {
    pub title: String,
    pub intro: String,
    pub content_html: String,
    pub twitter_url: String,
    pub github_url: String,
    pub linkedin_url: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub chrome: SiteChrome,
    pub featured: Option<PostCard>,
    pub posts: Vec<PostCard>,
    pub tags: Vec<TagChip>,
    pub pagination: PaginationView,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub chrome: SiteChrome,
    pub post: PostDetailView,
    pub related: Vec<RelatedPostView>,
}

#[derive(Template)]
#[template(path = "tag.html")]
pub struct TagTemplate {
    pub chrome: SiteChrome,
    pub tag_name: String,
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub chrome: SiteChrome,
    pub query: String,
    pub searched: bool,
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutTemplate {
    pub chrome: SiteChrome,
    pub about: AboutView,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub chrome: SiteChrome,
    pub heading: &'static str,
    pub detail: &'static str,
}

pub fn format_human_date(date: OffsetDateTime) -> String {
    date.format(HUMAN_DATE_FORMAT).unwrap_or_default()
}

pub fn format_iso_date(date: OffsetDateTime) -> String {
    date.format(ISO_DATE_FORMAT).unwrap_or_default()
}
