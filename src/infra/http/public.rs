//! Public-site routes: listings, post pages, search, about, uploads.

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        error::HttpError,
        feed::FeedError,
        pagination::PageRequest,
    },
    infra::uploads::UploadStorageError,
    presentation::views::{
        AboutTemplate, AboutView, IndexTemplate, PaginationView, PostCard, PostDetailView,
        PostTemplate, RelatedPostView, SearchTemplate, SiteChrome, TagChip, TagTemplate,
        format_human_date, format_iso_date, render_not_found_response, render_template_response,
    },
};

use super::AppState;

pub fn build_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/post/{slug}", get(post_detail))
        .route("/tag/{slug}", get(tag_index))
        .route("/search", get(search))
        .route("/about", get(about))
        .route("/uploads/{*path}", get(serve_upload))
        .route("/static/{*path}", get(crate::infra::assets::serve_static))
        .route("/_health/db", get(db_health))
        .fallback(fallback)
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchQuery {
    q: Option<String>,
    page: Option<u32>,
}

fn page_request(state: &AppState, page: Option<u32>) -> PageRequest {
    PageRequest::clamped(page.unwrap_or(1), state.pagination.posts_per_page.get())
}

async fn index(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let chrome = SiteChrome::from_settings(&state.site);

    let home = match state.feed.home(page_request(&state, query.page)).await {
        Ok(home) => home,
        Err(err) => return feed_error_to_response(err, chrome),
    };

    let pagination = PaginationView::build(&home.posts, "/", "");
    let template = IndexTemplate {
        chrome,
        featured: home.featured.map(PostCard::from),
        posts: home.posts.items.into_iter().map(PostCard::from).collect(),
        tags: home.tags.into_iter().map(TagChip::from).collect(),
        pagination,
    };

    render_template_response(template, StatusCode::OK)
}

async fn post_detail(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let chrome = SiteChrome::from_settings(&state.site);

    let detail = match state.feed.post_by_slug(&slug).await {
        Ok(detail) => detail,
        Err(err) => return feed_error_to_response(err, chrome),
    };

    let date = detail.post.published_at.unwrap_or(detail.post.created_at);
    let template = PostTemplate {
        chrome,
        post: PostDetailView {
            title: detail.post.title,
            body_html: detail.post.body_html,
            iso_date: format_iso_date(date),
            display_date: format_human_date(date),
            reading_minutes: detail.post.reading_minutes,
            views: detail.post.views,
            badges: detail.tags.into_iter().map(Into::into).collect(),
            cover_image: detail.post.cover_image,
        },
        related: detail
            .related
            .into_iter()
            .map(|post| RelatedPostView {
                slug: post.slug,
                title: post.title,
            })
            .collect(),
    };

    render_template_response(template, StatusCode::OK)
}

async fn tag_index(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = SiteChrome::from_settings(&state.site);

    let context = match state
        .feed
        .tag_page(&slug, page_request(&state, query.page))
        .await
    {
        Ok(context) => context,
        Err(err) => return feed_error_to_response(err, chrome),
    };

    let pagination = PaginationView::build(&context.posts, &format!("/tag/{slug}"), "");
    let template = TagTemplate {
        chrome,
        tag_name: context.tag.name,
        posts: context.posts.items.into_iter().map(PostCard::from).collect(),
        pagination,
    };

    render_template_response(template, StatusCode::OK)
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Response {
    let chrome = SiteChrome::from_settings(&state.site);

    let term = query.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        let template = SearchTemplate {
            chrome,
            query: String::new(),
            searched: false,
            posts: Vec::new(),
            pagination: PaginationView::default(),
        };
        return render_template_response(template, StatusCode::OK);
    }

    let results = match state
        .feed
        .search(term, page_request(&state, query.page))
        .await
    {
        Ok(results) => results,
        Err(err) => return feed_error_to_response(err, chrome),
    };

    let encoded: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("q", term)
        .finish();
    let pagination = PaginationView::build(&results, "/search", &encoded);

    let template = SearchTemplate {
        chrome,
        query: term.to_string(),
        searched: true,
        posts: results.items.into_iter().map(PostCard::from).collect(),
        pagination,
    };

    render_template_response(template, StatusCode::OK)
}

async fn about(State(state): State<AppState>) -> Response {
    let chrome = SiteChrome::from_settings(&state.site);

    let about = match state.settings.about().await {
        Ok(about) => about,
        Err(err) => {
            return HttpError::from_error(
                "infra::http::public::about",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load about page",
                &err,
            )
            .into_response();
        }
    };

    let template = AboutTemplate {
        chrome,
        about: AboutView {
            title: about.title,
            intro: about.intro,
            content_html: about.content_html,
            twitter_url: about.twitter_url,
            github_url: about.github_url,
            linkedin_url: about.linkedin_url,
        },
    };

    render_template_response(template, StatusCode::OK)
}

async fn serve_upload(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Upload not found",
                "The requested upload is not available",
            )
            .into_response()
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let len = bytes.len();

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }

    response
}

async fn db_health(State(state): State<AppState>) -> Response {
    const SOURCE: &str = "infra::http::public::db_health";

    match state.db.as_ref() {
        Some(db) => match db.health_check().await {
            Ok(()) => (StatusCode::OK, "ok").into_response(),
            Err(err) => HttpError::new(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Database unavailable",
                err.to_string(),
            )
            .into_response(),
        },
        None => HttpError::new(
            SOURCE,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database unavailable",
            "no database configured",
        )
        .into_response(),
    }
}

async fn fallback(State(state): State<AppState>) -> Response {
    render_not_found_response(SiteChrome::from_settings(&state.site))
}

fn feed_error_to_response(err: FeedError, chrome: SiteChrome) -> Response {
    match err {
        FeedError::UnknownTag | FeedError::PostNotFound => render_not_found_response(chrome),
        FeedError::Repo(err) => HttpError::from_error(
            "infra::http::public::feed_error_to_response",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}
