//! The admin gate: unauthenticated requests bounce to login and mutate
//! nothing; a session cookie opens the panel.

mod common;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use foglio::application::content::PostDraft;
use tower::util::ServiceExt;

use common::{TEST_ADMIN_PASSWORD, TEST_ADMIN_USERNAME, test_app};

const MULTIPART_BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

async fn send(app: &common::TestApp, request: Request<Body>) -> Response<Body> {
    app.router
        .clone()
        .oneshot(request)
        .await
        .expect("response")
}

fn form_request(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn multipart_body(fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{MULTIPART_BOUNDARY}--\r\n"));
    body
}

fn multipart_request(uri: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(multipart_body(fields)))
        .expect("request")
}

/// Collect the `name=value` pairs from every Set-Cookie header into one
/// Cookie header value.
fn cookie_header(response: &Response<Body>) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn login(app: &common::TestApp) -> String {
    let response = send(
        app,
        form_request(
            "/admin/login",
            None,
            &format!("username={TEST_ADMIN_USERNAME}&password={TEST_ADMIN_PASSWORD}"),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin");
    cookie_header(&response)
}

#[tokio::test]
async fn admin_pages_redirect_to_login_without_a_session() {
    let app = test_app().await;

    for uri in ["/admin", "/admin/posts", "/admin/posts/new", "/admin/about"] {
        let response = send(
            &app,
            Request::builder().uri(uri).body(Body::empty()).expect("request"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "uri: {uri}");
        assert_eq!(location(&response), "/admin/login", "uri: {uri}");
    }
}

#[tokio::test]
async fn unauthenticated_writes_are_rejected_and_change_nothing() {
    let app = test_app().await;

    let existing = app
        .content
        .create(PostDraft {
            title: "Untouchable".to_string(),
            body_markdown: "original body".to_string(),
            published: true,
            ..PostDraft::default()
        })
        .await
        .expect("create");

    // Create attempt without a session.
    let response = send(
        &app,
        multipart_request(
            "/admin/posts/new",
            None,
            &[("title", "Intruder Post"), ("body", "injected")],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");
    assert_eq!(app.repos.post_count(), 1);

    // Edit, delete and publish attempts against the existing post.
    let edit_uri = format!("/admin/posts/{}/edit", existing.id);
    let response = send(
        &app,
        multipart_request(&edit_uri, None, &[("title", "Hacked"), ("body", "hacked")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");

    let delete_uri = format!("/admin/posts/{}/delete", existing.id);
    let response = send(&app, form_request(&delete_uri, None, "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");

    let publish_uri = format!("/admin/posts/{}/publish", existing.id);
    let response = send(&app, form_request(&publish_uri, None, "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");

    // About and password endpoints too.
    let response = send(&app, form_request("/admin/about", None, "about_title=x")).await;
    assert_eq!(location(&response), "/admin/login");
    let response = send(
        &app,
        form_request(
            "/admin/password",
            None,
            "current_password=a&new_password=bbbbbbbb&confirm_password=bbbbbbbb",
        ),
    )
    .await;
    assert_eq!(location(&response), "/admin/login");

    // The stored post is untouched.
    let after = app.repos.post_by_id(existing.id).expect("still there");
    assert_eq!(after.title, "Untouchable");
    assert_eq!(after.body_markdown, "original body");
    assert!(after.published);
    assert_eq!(app.repos.post_count(), 1);
}

#[tokio::test]
async fn wrong_credentials_do_not_open_a_session() {
    let app = test_app().await;

    let response = send(
        &app,
        form_request("/admin/login", None, "username=admin&password=wrong"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");

    // Whatever cookies came back (a flash, at most) do not grant access.
    let cookies = cookie_header(&response);
    let response = send(
        &app,
        Request::builder()
            .uri("/admin")
            .header(header::COOKIE, cookies)
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");
}

#[tokio::test]
async fn login_opens_the_dashboard() {
    let app = test_app().await;
    let cookies = login(&app).await;

    let response = send(
        &app,
        Request::builder()
            .uri("/admin")
            .header(header::COOKIE, &cookies)
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let html = String::from_utf8_lossy(&body);
    assert!(html.contains("Dashboard"));
    assert!(html.contains(TEST_ADMIN_USERNAME));
}

#[tokio::test]
async fn authenticated_create_persists_a_post() {
    let app = test_app().await;
    let cookies = login(&app).await;

    let response = send(
        &app,
        multipart_request(
            "/admin/posts/new",
            Some(&cookies),
            &[
                ("title", "Hello World"),
                ("excerpt", ""),
                ("body", "A body written through the panel."),
                ("tags", "rust, web"),
                ("published", "on"),
            ],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/posts");
    assert_eq!(app.repos.post_count(), 1);

    let stored = app
        .content
        .list_tags_with_counts()
        .await
        .expect("tags")
        .into_iter()
        .map(|tag| tag.name)
        .collect::<Vec<_>>();
    assert!(stored.contains(&"rust".to_string()));
    assert!(stored.contains(&"web".to_string()));
}

#[tokio::test]
async fn validation_failures_flash_and_leave_data_unchanged() {
    let app = test_app().await;
    let cookies = login(&app).await;

    let response = send(
        &app,
        multipart_request(
            "/admin/posts/new",
            Some(&cookies),
            &[("title", "   "), ("body", "some body")],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/posts/new");
    assert_eq!(app.repos.post_count(), 0);
}

#[tokio::test]
async fn logout_closes_the_session() {
    let app = test_app().await;
    let cookies = login(&app).await;

    let response = send(&app, form_request("/admin/logout", Some(&cookies), "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");

    // The old session cookie no longer opens the panel.
    let response = send(
        &app,
        Request::builder()
            .uri("/admin")
            .header(header::COOKIE, &cookies)
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/login");
}
