//! Admin post management: listing, editor forms, create/update/delete.

use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use axum_extra::extract::cookie::PrivateCookieJar;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    application::auth::AdminPrincipal,
    application::content::{ContentError, PostDraft, split_tag_field},
    application::error::HttpError,
    application::pagination::PageRequest,
    application::repos::{PostListScope, PostQueryFilter},
    domain::entities::PostRecord,
    infra::http::flash::push_flash,
    infra::uploads::UploadStorageError,
    presentation::admin::{AdminPostRow, AdminPostsTemplate, PostFormTemplate, PostFormView},
    presentation::views::{PaginationView, format_iso_date, render_template_response},
};

use super::{AppState, admin_chrome};

const SOURCE_BASE: &str = "infra::http::admin::posts";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdminListQuery {
    status: Option<String>,
    page: Option<u32>,
}

pub(super) fn admin_post_row(post: PostRecord) -> AdminPostRow {
    AdminPostRow {
        id: post.id.to_string(),
        edit_href: format!("/admin/posts/{}/edit", post.id),
        public_href: format!("/post/{}", post.slug),
        title: post.title,
        slug: post.slug,
        published: post.published,
        featured: post.featured,
        views: post.views,
        created_date: format_iso_date(post.created_at),
    }
}

fn parse_status(status: Option<&str>) -> (Option<bool>, &'static str) {
    match status {
        Some("published") => (Some(true), "published"),
        Some("draft") => (Some(false), "draft"),
        _ => (None, "all"),
    }
}

pub(super) async fn list_posts(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
    Query(query): Query<AdminListQuery>,
) -> Response {
    let (published, status_key) = parse_status(query.status.as_deref());
    let scope = PostListScope::Admin { published };
    let page = PageRequest::clamped(
        query.page.unwrap_or(1),
        state.pagination.admin_page_size.get(),
    );

    let listing = match state
        .content
        .list(scope, &PostQueryFilter::default(), page)
        .await
    {
        Ok(listing) => listing,
        Err(err) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list posts",
                &err,
            )
            .into_response();
        }
    };

    let extra_query = if status_key == "all" {
        String::new()
    } else {
        format!("status={status_key}")
    };
    let pagination = PaginationView::build(&listing, "/admin/posts", &extra_query);

    let (jar, chrome) = admin_chrome(jar, &principal);
    let template = AdminPostsTemplate {
        chrome,
        posts: listing.items.into_iter().map(admin_post_row).collect(),
        status: status_key.to_string(),
        pagination,
    };

    (jar, render_template_response(template, StatusCode::OK)).into_response()
}

pub(super) async fn new_post_form(
    State(_state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
) -> Response {
    let (jar, chrome) = admin_chrome(jar, &principal);
    let template = PostFormTemplate {
        chrome,
        heading: "New Post",
        action: "/admin/posts/new".to_string(),
        form: PostFormView::default(),
        delete_action: None,
    };

    (jar, render_template_response(template, StatusCode::OK)).into_response()
}

pub(super) async fn edit_post_form(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
    Path(id): Path<Uuid>,
) -> Response {
    let post = match state.content.find_by_id(id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            let jar = push_flash(jar, "error", "Post not found");
            return (jar, Redirect::to("/admin/posts")).into_response();
        }
        Err(err) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load post",
                &err,
            )
            .into_response();
        }
    };

    let tags = match state.content.tags_for_post(id).await {
        Ok(tags) => tags,
        Err(err) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load post tags",
                &err,
            )
            .into_response();
        }
    };

    let tags_field = tags
        .into_iter()
        .map(|tag| tag.name)
        .collect::<Vec<_>>()
        .join(", ");

    let (jar, chrome) = admin_chrome(jar, &principal);
    let template = PostFormTemplate {
        chrome,
        heading: "Edit Post",
        action: format!("/admin/posts/{id}/edit"),
        form: PostFormView {
            title: post.title,
            excerpt: post.excerpt,
            body_markdown: post.body_markdown,
            tags_field,
            published: post.published,
            featured: post.featured,
            cover_image: post.cover_image,
        },
        delete_action: Some(format!("/admin/posts/{id}/delete")),
    };

    (jar, render_template_response(template, StatusCode::OK)).into_response()
}

struct PostFormData {
    title: String,
    excerpt: String,
    body_markdown: String,
    tags_field: String,
    published: bool,
    featured: bool,
    cover_upload: Option<(String, Bytes)>,
}

#[derive(Debug, thiserror::Error)]
enum PostFormError {
    #[error("form payload could not be read")]
    InvalidFormData,
    #[error("uploaded file exceeds the configured size limit")]
    PayloadTooLarge,
}

async fn read_post_form(multipart: &mut Multipart) -> Result<PostFormData, PostFormError> {
    let mut form = PostFormData {
        title: String::new(),
        excerpt: String::new(),
        body_markdown: String::new(),
        tags_field: String::new(),
        published: false,
        featured: false,
        cover_upload: None,
    };

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("title") => {
                    form.title = field.text().await.map_err(|_| PostFormError::InvalidFormData)?;
                }
                Some("excerpt") => {
                    form.excerpt =
                        field.text().await.map_err(|_| PostFormError::InvalidFormData)?;
                }
                Some("body") => {
                    form.body_markdown =
                        field.text().await.map_err(|_| PostFormError::InvalidFormData)?;
                }
                Some("tags") => {
                    form.tags_field =
                        field.text().await.map_err(|_| PostFormError::InvalidFormData)?;
                }
                Some("published") => {
                    let value = field.text().await.map_err(|_| PostFormError::InvalidFormData)?;
                    form.published = checkbox_checked(&value);
                }
                Some("featured") => {
                    let value = field.text().await.map_err(|_| PostFormError::InvalidFormData)?;
                    form.featured = checkbox_checked(&value);
                }
                Some("cover_image") => {
                    let filename = field
                        .file_name()
                        .map(|value| value.to_string())
                        .filter(|value| !value.trim().is_empty());
                    let Some(filename) = filename else {
                        // Empty file input on an unchanged form.
                        continue;
                    };
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| match err.status() {
                            StatusCode::PAYLOAD_TOO_LARGE => PostFormError::PayloadTooLarge,
                            _ => PostFormError::InvalidFormData,
                        })?;
                    if !bytes.is_empty() {
                        form.cover_upload = Some((filename, bytes));
                    }
                }
                _ => continue,
            },
            Ok(None) => break,
            Err(err) => {
                warn!(
                    target = SOURCE_BASE,
                    status = err.status().as_u16(),
                    error = %err,
                    "failed to read post form"
                );
                return Err(match err.status() {
                    StatusCode::PAYLOAD_TOO_LARGE => PostFormError::PayloadTooLarge,
                    _ => PostFormError::InvalidFormData,
                });
            }
        }
    }

    Ok(form)
}

fn checkbox_checked(value: &str) -> bool {
    matches!(value.trim(), "on" | "true" | "1" | "yes")
}

/// Store an uploaded cover image, flashing a friendly message on rejection.
async fn store_cover(
    state: &AppState,
    upload: (String, Bytes),
) -> Result<String, (&'static str, String)> {
    let (filename, bytes) = upload;
    match state.upload_storage.store_image(&filename, bytes).await {
        Ok(stored) => Ok(stored.stored_path),
        Err(UploadStorageError::DisallowedExtension) => Err((
            "error",
            "Cover image must be a png, jpg, jpeg, gif or webp file".to_string(),
        )),
        Err(UploadStorageError::PayloadTooLarge) => {
            Err(("error", "Cover image is too large".to_string()))
        }
        Err(UploadStorageError::EmptyPayload) => {
            Err(("error", "Cover image upload was empty".to_string()))
        }
        Err(err) => {
            error!(
                target = SOURCE_BASE,
                error = %err,
                "failed to store cover image"
            );
            Err(("error", "Failed to store the cover image".to_string()))
        }
    }
}

async fn delete_cover_file(state: &AppState, stored_path: &str) {
    if let Err(err) = state.upload_storage.delete(stored_path).await {
        warn!(
            target = SOURCE_BASE,
            path = stored_path,
            error = %err,
            "failed to remove cover image file"
        );
    }
}

fn content_error_flash(err: &ContentError) -> String {
    match err {
        ContentError::EmptyField(field) => format!("The {field} must not be empty"),
        ContentError::NotFound => "Post not found".to_string(),
        ContentError::SlugCollision => "Could not derive a unique slug for this title".to_string(),
        ContentError::Repo(_) => "Saving the post failed, try again".to_string(),
    }
}

pub(super) async fn create_post(
    State(state): State<AppState>,
    Extension(_principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
    mut multipart: Multipart,
) -> Response {
    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => {
            let jar = push_flash(jar, "error", &err.to_string());
            return (jar, Redirect::to("/admin/posts/new")).into_response();
        }
    };

    let cover_image = match form.cover_upload {
        Some(upload) => match store_cover(&state, upload).await {
            Ok(path) => Some(path),
            Err((kind, message)) => {
                let jar = push_flash(jar, kind, &message);
                return (jar, Redirect::to("/admin/posts/new")).into_response();
            }
        },
        None => None,
    };

    let draft = PostDraft {
        title: form.title,
        excerpt: Some(form.excerpt),
        body_markdown: form.body_markdown,
        tags: split_tag_field(&form.tags_field),
        published: form.published,
        featured: form.featured,
        cover_image,
    };

    match state.content.create(draft).await {
        Ok(_) => {
            let jar = push_flash(jar, "success", "Post created successfully!");
            (jar, Redirect::to("/admin/posts")).into_response()
        }
        Err(err) => {
            let jar = push_flash(jar, "error", &content_error_flash(&err));
            (jar, Redirect::to("/admin/posts/new")).into_response()
        }
    }
}

pub(super) async fn update_post(
    State(state): State<AppState>,
    Extension(_principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Response {
    let edit_href = format!("/admin/posts/{id}/edit");

    let existing = match state.content.find_by_id(id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            let jar = push_flash(jar, "error", "Post not found");
            return (jar, Redirect::to("/admin/posts")).into_response();
        }
        Err(err) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load post",
                &err,
            )
            .into_response();
        }
    };

    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => {
            let jar = push_flash(jar, "error", &err.to_string());
            return (jar, Redirect::to(&edit_href)).into_response();
        }
    };

    // A new upload replaces the previous cover; its file goes once the
    // update is committed.
    let previous_cover = existing.cover_image.clone();
    let (cover_image, replaced) = match form.cover_upload {
        Some(upload) => match store_cover(&state, upload).await {
            Ok(path) => (Some(path), true),
            Err((kind, message)) => {
                let jar = push_flash(jar, kind, &message);
                return (jar, Redirect::to(&edit_href)).into_response();
            }
        },
        None => (previous_cover.clone(), false),
    };

    let draft = PostDraft {
        title: form.title,
        excerpt: Some(form.excerpt),
        body_markdown: form.body_markdown,
        tags: split_tag_field(&form.tags_field),
        published: form.published,
        featured: form.featured,
        cover_image,
    };

    match state.content.update(id, draft).await {
        Ok(_) => {
            if replaced && let Some(old) = previous_cover {
                delete_cover_file(&state, &old).await;
            }
            let jar = push_flash(jar, "success", "Post updated successfully!");
            (jar, Redirect::to("/admin/posts")).into_response()
        }
        Err(err) => {
            let jar = push_flash(jar, "error", &content_error_flash(&err));
            (jar, Redirect::to(&edit_href)).into_response()
        }
    }
}

pub(super) async fn delete_post(
    State(state): State<AppState>,
    Extension(_principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
    Path(id): Path<Uuid>,
) -> Response {
    match state.content.delete(id).await {
        Ok(removed) => {
            if let Some(cover) = removed.cover_image {
                delete_cover_file(&state, &cover).await;
            }
            let jar = push_flash(jar, "success", "Post deleted successfully!");
            (jar, Redirect::to("/admin/posts")).into_response()
        }
        Err(err) => {
            let jar = push_flash(jar, "error", &content_error_flash(&err));
            (jar, Redirect::to("/admin/posts")).into_response()
        }
    }
}

pub(super) async fn toggle_publish(
    State(state): State<AppState>,
    Extension(_principal): Extension<AdminPrincipal>,
    jar: PrivateCookieJar,
    Path(id): Path<Uuid>,
) -> Response {
    let existing = match state.content.find_by_id(id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            let jar = push_flash(jar, "error", "Post not found");
            return (jar, Redirect::to("/admin/posts")).into_response();
        }
        Err(err) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load post",
                &err,
            )
            .into_response();
        }
    };

    match state.content.set_published(id, !existing.published).await {
        Ok(updated) => {
            let message = if updated.published {
                "Post published successfully!"
            } else {
                "Post unpublished successfully!"
            };
            let jar = push_flash(jar, "success", message);
            (jar, Redirect::to("/admin/posts")).into_response()
        }
        Err(err) => {
            let jar = push_flash(jar, "error", &content_error_flash(&err));
            (jar, Redirect::to("/admin/posts")).into_response()
        }
    }
}
