//! Defines functions for carrying the session ID in a private cookie.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::session::{Session, SessionId};

pub(crate) const COOKIE_SESSION_ID: &str = "session_id";

/// Add the session cookie to the cookie jar.
///
/// The cookie expires at the same time as the session.
pub(crate) fn set_session_cookie(jar: PrivateCookieJar, session: &Session) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION_ID, session.id.to_string()))
            .expires(session.expires_at)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Set the session cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION_ID, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

pub(crate) fn get_session_id(jar: &PrivateCookieJar) -> Option<SessionId> {
    jar.get(COOKIE_SESSION_ID)
        .map(|cookie| SessionId::new(cookie.value_trimmed()))
        .filter(|session_id| session_id.as_ref() != "deleted")
}
