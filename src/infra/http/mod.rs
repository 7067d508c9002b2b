//! HTTP surface: one listener, public routes plus the gated admin panel.

pub mod admin;
pub mod flash;
pub mod middleware;
pub mod public;

use std::sync::Arc;

use axum::{Router, extract::FromRef};
use axum_extra::extract::cookie::Key;

use crate::{
    application::{
        auth::AuthService, content::ContentService, feed::FeedService, settings::SettingsService,
    },
    config::{PaginationSettings, SiteSettings},
    infra::{db::PostgresRepositories, uploads::UploadStorage},
};

/// Everything the handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedService>,
    pub content: Arc<ContentService>,
    pub auth: Arc<AuthService>,
    pub settings: Arc<SettingsService>,
    pub upload_storage: Arc<UploadStorage>,
    /// Present in real deployments; absent in router-level tests, where the
    /// health endpoint reports unavailable.
    pub db: Option<Arc<PostgresRepositories>>,
    pub site: SiteSettings,
    pub pagination: PaginationSettings,
    pub upload_body_limit: usize,
    cookie_key: Key,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feed: Arc<FeedService>,
        content: Arc<ContentService>,
        auth: Arc<AuthService>,
        settings: Arc<SettingsService>,
        upload_storage: Arc<UploadStorage>,
        db: Option<Arc<PostgresRepositories>>,
        site: SiteSettings,
        pagination: PaginationSettings,
        upload_body_limit: usize,
        secret_key: &str,
    ) -> Self {
        Self {
            feed,
            content,
            auth,
            settings,
            upload_storage,
            db,
            site,
            pagination,
            upload_body_limit,
            cookie_key: Key::derive_from(secret_key.as_bytes()),
        }
    }
}

// Lets `PrivateCookieJar` pull its encryption key straight from the state.
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Assemble the complete application router.
pub fn build_router(state: AppState) -> Router {
    let admin = admin::build_router(state.clone());

    public::build_router(state.clone())
        .nest("/admin", admin)
        .layer(axum::middleware::from_fn(middleware::log_responses))
        .layer(axum::middleware::from_fn(middleware::set_request_context))
        .with_state(state)
}
