use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;

use crate::{
    application::auth::AdminPrincipal,
    application::error::HttpError,
    application::pagination::PageRequest,
    application::repos::{PostListScope, PostQueryFilter},
    presentation::admin::DashboardTemplate,
    presentation::views::render_template_response,
};

use super::{AppState, admin_chrome, posts::admin_post_row};

const RECENT_POST_LIMIT: u32 = 5;

pub(super) async fn dashboard(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
) -> Response {
    const SOURCE: &str = "infra::http::admin::dashboard";

    let filter = PostQueryFilter::default();
    let all = PostListScope::Admin { published: None };
    let published_scope = PostListScope::Admin {
        published: Some(true),
    };
    let draft_scope = PostListScope::Admin {
        published: Some(false),
    };

    let counts = async {
        let total = state.content.count(all, &filter).await?;
        let published = state.content.count(published_scope, &filter).await?;
        let drafts = state.content.count(draft_scope, &filter).await?;
        let views = state.content.total_views().await?;
        let recent = state
            .content
            .list(all, &filter, PageRequest::clamped(1, RECENT_POST_LIMIT))
            .await?;
        Ok::<_, crate::application::content::ContentError>((
            total, published, drafts, views, recent,
        ))
    };

    let (total, published, drafts, views, recent) = match counts.await {
        Ok(values) => values,
        Err(err) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load dashboard",
                &err,
            )
            .into_response();
        }
    };

    let (jar, chrome) = admin_chrome(jar, &principal);
    let template = DashboardTemplate {
        chrome,
        total_posts: total,
        published_posts: published,
        draft_posts: drafts,
        total_views: views,
        recent: recent.items.into_iter().map(admin_post_row).collect(),
    };

    (jar, render_template_response(template, StatusCode::OK)).into_response()
}
