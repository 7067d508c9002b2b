//! Admin panel: session-gated management routes.

mod dashboard;
mod posts;
mod settings;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Form, State},
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    application::auth::AdminPrincipal,
    infra::http::flash::{push_flash, take_flash},
    presentation::admin::{AdminChrome, LoginTemplate},
    presentation::views::render_template_response,
};

use super::AppState;

const SESSION_COOKIE: &str = "foglio_session";

pub fn build_router(state: AppState) -> Router<AppState> {
    let gated = Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/posts", get(posts::list_posts))
        .route("/posts/new", get(posts::new_post_form).post(posts::create_post))
        .route(
            "/posts/{id}/edit",
            get(posts::edit_post_form).post(posts::update_post),
        )
        .route("/posts/{id}/delete", post(posts::delete_post))
        .route("/posts/{id}/publish", post(posts::toggle_publish))
        .route(
            "/about",
            get(settings::about_form).post(settings::update_about),
        )
        .route(
            "/password",
            get(settings::change_password_form).post(settings::change_password),
        )
        .route("/logout", post(logout))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/login", get(login_form).post(login_submit))
        .merge(gated)
        .layer(DefaultBodyLimit::max(state.upload_body_limit))
        .with_state(state)
}

/// Gate: resolve the session cookie or bounce to the login form.
async fn require_admin(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    let principal = match token {
        Some(token) => state.auth.resolve(&token).await.ok(),
        None => None,
    };

    match principal {
        Some(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        None => Redirect::to("/admin/login").into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_form(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    // Already signed in? Straight to the dashboard.
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && state.auth.resolve(cookie.value()).await.is_ok()
    {
        return Redirect::to("/admin").into_response();
    }

    let (jar, flash) = take_flash(jar);
    let template = LoginTemplate {
        chrome: AdminChrome::new(None, flash),
    };
    (jar, render_template_response(template, axum::http::StatusCode::OK)).into_response()
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.auth.authenticate(&form.username, &form.password).await {
        Ok(issued) => {
            let jar = jar.add(session_cookie(&issued.token, issued.expires_at));
            let jar = push_flash(jar, "success", "Welcome back!");
            (jar, Redirect::to("/admin")).into_response()
        }
        Err(err) => {
            tracing::warn!(
                target = "foglio::http::admin",
                username = %form.username,
                error = %err,
                "login rejected"
            );
            let jar = push_flash(jar, "error", "Invalid username or password");
            (jar, Redirect::to("/admin/login")).into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let _ = state.auth.logout(cookie.value()).await;
    }

    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    let jar = jar.remove(removal);
    let jar = push_flash(jar, "info", "You have been logged out.");
    (jar, Redirect::to("/admin/login")).into_response()
}

fn session_cookie(token: &str, expires_at: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .expires(expires_at)
        .build()
}

/// Build the shared admin shell for a request, consuming any pending flash.
fn admin_chrome(
    jar: PrivateCookieJar,
    principal: &AdminPrincipal,
) -> (PrivateCookieJar, AdminChrome) {
    let (jar, flash) = take_flash(jar);
    (
        jar,
        AdminChrome::new(Some(principal.username.clone()), flash),
    )
}
