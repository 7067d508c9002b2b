//! Public-site behavior driven through the real router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use foglio::application::content::PostDraft;
use tower::util::ServiceExt;

use common::test_app;

async fn get(app: &common::TestApp, uri: &str) -> (StatusCode, String) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

fn draft(title: &str, body: &str, published: bool) -> PostDraft {
    PostDraft {
        title: title.to_string(),
        body_markdown: body.to_string(),
        published,
        ..PostDraft::default()
    }
}

#[tokio::test]
async fn homepage_lists_published_posts_only() {
    let app = test_app().await;

    app.content
        .create(draft("Published Piece", "visible body", true))
        .await
        .expect("create published");
    app.content
        .create(draft("Secret Draft", "hidden body", false))
        .await
        .expect("create draft");

    let (status, html) = get(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Published Piece"));
    assert!(!html.contains("Secret Draft"));
}

#[tokio::test]
async fn post_page_renders_body_and_404s_on_drafts() {
    let app = test_app().await;

    let published = app
        .content
        .create(draft("Hello World", "Some **bold** prose.", true))
        .await
        .expect("create");
    let hidden = app
        .content
        .create(draft("Hidden", "draft body", false))
        .await
        .expect("create draft");

    let (status, html) = get(&app, &format!("/post/{}", published.slug)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<strong>bold</strong>"));
    assert!(html.contains("min read"));

    let (status, _) = get(&app, &format!("/post/{}", hidden.slug)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/post/never-existed").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identical_titles_resolve_to_distinct_pages() {
    let app = test_app().await;

    let first = app
        .content
        .create(draft("Hello World", "first body", true))
        .await
        .expect("first");
    let second = app
        .content
        .create(draft("Hello World", "second body", true))
        .await
        .expect("second");

    assert_eq!(first.slug, "hello-world");
    assert_eq!(second.slug, "hello-world-1");

    let (status, html) = get(&app, "/post/hello-world").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("first body"));

    let (status, html) = get(&app, "/post/hello-world-1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("second body"));
}

#[tokio::test]
async fn search_matches_title_or_body_case_insensitively() {
    let app = test_app().await;

    app.content
        .create(draft("Hello World", "greetings", true))
        .await
        .expect("title match");
    app.content
        .create(draft("Other Title", "this body says HELLO twice, hello", true))
        .await
        .expect("body match");
    app.content
        .create(draft("Unrelated", "nothing relevant here", true))
        .await
        .expect("no match");
    app.content
        .create(draft("Hello Draft", "hello but unpublished", false))
        .await
        .expect("draft match");

    let (status, html) = get(&app, "/search?q=hello").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Hello World"));
    assert!(html.contains("Other Title"));
    assert!(!html.contains("Unrelated"));
    assert!(!html.contains("Hello Draft"));
}

#[tokio::test]
async fn empty_search_renders_the_form_without_results() {
    let app = test_app().await;

    let (status, html) = get(&app, "/search").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!html.contains("Results for"));
}

#[tokio::test]
async fn tag_pages_filter_posts_and_unknown_tags_404() {
    let app = test_app().await;

    let mut tagged = draft("Rust Notes", "about rust", true);
    tagged.tags = vec!["rust".to_string()];
    app.content.create(tagged).await.expect("tagged");

    let mut other = draft("Cooking", "about food", true);
    other.tags = vec!["food".to_string()];
    app.content.create(other).await.expect("other");

    let (status, html) = get(&app, "/tag/rust").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Rust Notes"));
    assert!(!html.contains("Cooking"));

    let (status, _) = get(&app, "/tag/jazz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_tag_detaches_it_but_keeps_posts() {
    let app = test_app().await;

    let mut first = draft("First", "body", true);
    first.tags = vec!["shared".to_string()];
    let first = app.content.create(first).await.expect("first");

    let mut second = draft("Second", "body", true);
    second.tags = vec!["shared".to_string(), "solo".to_string()];
    let second = app.content.create(second).await.expect("second");

    let tags = app.content.list_tags_with_counts().await.expect("tags");
    let shared = tags
        .iter()
        .find(|tag| tag.name == "shared")
        .expect("shared tag");

    app.content.delete_tag(shared.id).await.expect("delete tag");

    // Both posts survive with the tag detached.
    assert!(app.repos.post_by_id(first.id).is_some());
    assert!(app.repos.post_by_id(second.id).is_some());
    assert!(
        app.content
            .tags_for_post(first.id)
            .await
            .expect("tags")
            .is_empty()
    );
    let remaining: Vec<String> = app
        .content
        .tags_for_post(second.id)
        .await
        .expect("tags")
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    assert_eq!(remaining, vec!["solo".to_string()]);

    let (status, _) = get(&app, "/tag/shared").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn about_page_renders_defaults() {
    let app = test_app().await;

    let (status, html) = get(&app, "/about").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Welcome to my blog"));
}

#[tokio::test]
async fn unknown_routes_render_the_404_page() {
    let app = test_app().await;

    let (status, html) = get(&app, "/definitely/not/here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(html.contains("Page not found"));
}
