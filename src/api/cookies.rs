use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::types::SessionKey;

const SESSION_COOKIE_NAME: &str = "spotdash_session";
const OWNER_COOKIE_NAME: &str = "spotdash_user";

/// Session key cookie; lives as long as the browser session.
pub(super) fn session_cookie(key: SessionKey, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, key.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Remembers which user authorized from this browser so a later visit can
/// restore the stored credential without a new login.
pub(super) fn owner_cookie(owner: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((OWNER_COOKIE_NAME, owner.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(30))
        .build()
}

pub(super) fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/"))
        .remove(Cookie::build(OWNER_COOKIE_NAME).path("/"))
}

/// Session key from the jar; a malformed value counts as absent.
pub(super) fn session_key(jar: &CookieJar) -> Option<SessionKey> {
    jar.get(SESSION_COOKIE_NAME)
        .and_then(|c| c.value().parse().ok())
}

pub(super) fn owner(jar: &CookieJar) -> Option<String> {
    jar.get(OWNER_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
