//! Admin-panel view models and templates.

use askama::Template;

use crate::presentation::views::PaginationView;

/// One-shot notice carried across a redirect.
#[derive(Clone)]
pub struct FlashView {
    pub kind: String,
    pub text: String,
}

/// Shared admin shell: who is signed in, plus any pending flash notice.
#[derive(Clone, Default)]
pub struct AdminChrome {
    pub username: Option<String>,
    pub flash: Option<FlashView>,
}

impl AdminChrome {
    pub fn new(username: Option<String>, flash: Option<FlashView>) -> Self {
        Self { username, flash }
    }
}

pub struct AdminPostRow {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub published: bool,
    pub featured: bool,
    pub views: i64,
    pub created_date: String,
    pub edit_href: String,
    pub public_href: String,
}

#[derive(Default)]
pub struct PostFormView {
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub tags_field: String,
    pub published: bool,
    pub featured: bool,
    pub cover_image: Option<String>,
}

pub struct AboutFormView {
    pub title: String,
    pub intro: String,
    pub content_markdown: String,
    pub twitter_url: String,
    pub github_url: String,
    pub linkedin_url: String,
}

#[derive(Template)]
#[template(path = "admin/login.html")]
pub struct LoginTemplate {
    pub chrome: AdminChrome,
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub chrome: AdminChrome,
    pub total_posts: u64,
    pub published_posts: u64,
    pub draft_posts: u64,
    pub total_views: i64,
    pub recent: Vec<AdminPostRow>,
}

#[derive(Template)]
#[template(path = "admin/posts.html")]
pub struct AdminPostsTemplate {
    pub chrome: AdminChrome,
    pub posts: Vec<AdminPostRow>,
    pub status: String,
    pub pagination: PaginationView,
}

#[derive(Template)]
#[template(path = "admin/post_form.html")]
pub struct PostFormTemplate {
    pub chrome: AdminChrome,
    pub heading: &'static str,
    pub action: String,
    pub form: PostFormView,
    pub delete_action: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/about_form.html")]
pub struct AboutFormTemplate {
    pub chrome: AdminChrome,
    pub form: AboutFormView,
}

#[derive(Template)]
#[template(path = "admin/change_password.html")]
pub struct ChangePasswordTemplate {
    pub chrome: AdminChrome,
}
