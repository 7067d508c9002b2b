//! Markdown rendering for post bodies and the about page.
//!
//! Rendering happens at write time; the sanitized HTML is stored next to
//! the markdown source. Untrusted markup never reaches templates raw: the
//! comrak output passes through an ammonia allowlist before persistence.

use ammonia::Builder as AmmoniaBuilder;
use comrak::{markdown_to_html, options::Options};
use once_cell::sync::Lazy;

static SANITIZER: Lazy<AmmoniaBuilder<'static>> = Lazy::new(build_sanitizer);

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.r#unsafe = true; // sanitized below

    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    builder.add_generic_attributes(&["class"]);
    builder.add_url_schemes(["http", "https", "mailto"].iter().copied());
    builder
}

/// Render a markdown body to sanitized HTML.
pub fn render_markdown(markdown: &str) -> String {
    let html = markdown_to_html(markdown, &default_options());
    SANITIZER.clean(&html).to_string()
}
