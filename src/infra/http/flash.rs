//! One-shot flash notices carried across redirects in the private cookie jar.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::presentation::admin::FlashView;

const FLASH_COOKIE: &str = "foglio_flash";

#[derive(Debug, Serialize, Deserialize)]
struct FlashPayload {
    kind: String,
    text: String,
}

/// Queue a notice for the next rendered admin page.
pub fn push_flash(jar: PrivateCookieJar, kind: &str, text: &str) -> PrivateCookieJar {
    let payload = FlashPayload {
        kind: kind.to_string(),
        text: text.to_string(),
    };
    let value = serde_json::to_string(&payload).unwrap_or_default();

    let cookie = Cookie::build((FLASH_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    jar.add(cookie)
}

/// Pop the pending notice, clearing the cookie.
pub fn take_flash(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<FlashView>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };

    let flash = serde_json::from_str::<FlashPayload>(cookie.value())
        .ok()
        .map(|payload| FlashView {
            kind: payload.kind,
            text: payload.text,
        });

    let removal = Cookie::build((FLASH_COOKIE, "")).path("/").build();
    (jar.remove(removal), flash)
}
