//! About-page editor and password change.

use axum::{
    Extension,
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;

use crate::{
    application::auth::{AdminPrincipal, AuthError},
    application::error::HttpError,
    application::settings::{AboutUpdate, SettingsError},
    infra::http::flash::push_flash,
    presentation::admin::{AboutFormTemplate, AboutFormView, ChangePasswordTemplate},
    presentation::views::render_template_response,
};

use super::{AppState, admin_chrome};

const SOURCE_BASE: &str = "infra::http::admin::settings";

pub(super) async fn about_form(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
) -> Response {
    let about = match state.settings.about().await {
        Ok(about) => about,
        Err(err) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load about settings",
                &err,
            )
            .into_response();
        }
    };

    let (jar, chrome) = admin_chrome(jar, &principal);
    let template = AboutFormTemplate {
        chrome,
        form: AboutFormView {
            title: about.title,
            intro: about.intro,
            content_markdown: about.content_markdown,
            twitter_url: about.twitter_url,
            github_url: about.github_url,
            linkedin_url: about.linkedin_url,
        },
    };

    (jar, render_template_response(template, StatusCode::OK)).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AboutForm {
    about_title: String,
    about_intro: String,
    about_content: String,
    twitter_url: String,
    github_url: String,
    linkedin_url: String,
}

pub(super) async fn update_about(
    State(state): State<AppState>,
    Extension(_principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
    Form(form): Form<AboutForm>,
) -> Response {
    let update = AboutUpdate {
        title: form.about_title,
        intro: form.about_intro,
        content_markdown: form.about_content,
        twitter_url: form.twitter_url,
        github_url: form.github_url,
        linkedin_url: form.linkedin_url,
    };

    match state.settings.update_about(update).await {
        Ok(()) => {
            let jar = push_flash(jar, "success", "About page updated successfully!");
            (jar, Redirect::to("/admin/about")).into_response()
        }
        Err(SettingsError::InvalidUrl { field }) => {
            let jar = push_flash(jar, "error", &format!("{field} must be an http(s) URL"));
            (jar, Redirect::to("/admin/about")).into_response()
        }
        Err(err) => HttpError::from_error(
            SOURCE_BASE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save about settings",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn change_password_form(
    State(_state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
) -> Response {
    let (jar, chrome) = admin_chrome(jar, &principal);
    let template = ChangePasswordTemplate { chrome };
    (jar, render_template_response(template, StatusCode::OK)).into_response()
}

#[derive(Debug, Deserialize)]
pub(super) struct ChangePasswordForm {
    current_password: String,
    new_password: String,
    confirm_password: String,
}

pub(super) async fn change_password(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    if form.new_password != form.confirm_password {
        let jar = push_flash(jar, "error", "New passwords do not match.");
        return (jar, Redirect::to("/admin/password")).into_response();
    }

    match state
        .auth
        .change_password(principal.user_id, &form.current_password, &form.new_password)
        .await
    {
        Ok(()) => {
            let jar = push_flash(jar, "success", "Your password has been updated.");
            (jar, Redirect::to("/admin")).into_response()
        }
        Err(AuthError::CurrentPasswordMismatch) => {
            let jar = push_flash(jar, "error", "Current password is incorrect.");
            (jar, Redirect::to("/admin/password")).into_response()
        }
        Err(AuthError::WeakPassword) => {
            let jar = push_flash(jar, "error", "New password is too short.");
            (jar, Redirect::to("/admin/password")).into_response()
        }
        Err(err) => HttpError::from_error(
            SOURCE_BASE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to change password",
            &err,
        )
        .into_response(),
    }
}
