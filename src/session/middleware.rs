//! Middleware that attaches a session to every request and enforces CSRF tokens.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    http::{HeaderMap, Method, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::{User, get_user_by_id},
    session::{
        Session, SessionId,
        cookie::{get_session_id, set_session_cookie},
        db::{create_session, delete_session, get_session},
    },
};

/// The name of the header HTMX sends the CSRF token in.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The session attached to the current request.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(session): Extension<CurrentSession>` to receive the session.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSession {
    pub id: SessionId,
    pub csrf_token: String,
    /// The logged in user, if any.
    pub user: Option<User>,
}

impl CurrentSession {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// The state needed for the session middleware.
#[derive(Clone)]
pub struct SessionState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How long new sessions last.
    pub session_duration: Duration,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SessionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_duration: state.session_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<SessionState> for Key {
    fn from_ref(state: &SessionState) -> Self {
        state.cookie_key.clone()
    }
}

/// Load the session named by the session cookie, or start a new one.
///
/// Requests that change state (anything other than GET, HEAD and OPTIONS) must
/// carry the session's CSRF token in the [CSRF_HEADER] header, otherwise a 403
/// response is returned and the handler is not run.
///
/// New sessions are sent to the client in a session cookie unless the handler
/// already set one, e.g. after logging in.
pub async fn session_middleware(
    State(state): State<SessionState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let loaded = match state.db_connection.lock() {
        Ok(connection) => load_or_create_session(
            get_session_id(&jar),
            state.session_duration,
            OffsetDateTime::now_utc(),
            &connection,
        ),
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            Err(Error::DatabaseLockError)
        }
    };

    let (session, user, is_new) = match loaded {
        Ok(loaded) => loaded,
        Err(error) => {
            tracing::error!("could not load session: {error}");
            return error.into_response();
        }
    };

    if changes_state(request.method())
        && (is_new || !has_valid_csrf_token(request.headers(), &session.csrf_token))
    {
        tracing::warn!(
            "rejected {} {} with a missing or invalid CSRF token",
            request.method(),
            request.uri().path()
        );
        return Error::InvalidCsrfToken.into_response();
    }

    request.extensions_mut().insert(CurrentSession {
        id: session.id.clone(),
        csrf_token: session.csrf_token.clone(),
        user,
    });

    let response = next.run(request).await;

    if !is_new || response.headers().contains_key(SET_COOKIE) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let jar = set_session_cookie(jar, &session);
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}

/// Returns the session, its user and whether the session was just created.
fn load_or_create_session(
    session_id: Option<SessionId>,
    session_duration: Duration,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(Session, Option<User>, bool), Error> {
    let existing = match session_id {
        Some(session_id) => match get_session(&session_id, connection) {
            Ok(session) if session.is_expired(now) => {
                delete_session(&session.id, connection)?;
                None
            }
            Ok(session) => Some(session),
            Err(Error::NotFound) => None,
            Err(error) => return Err(error),
        },
        None => None,
    };

    let Some(session) = existing else {
        let session = create_session(None, session_duration, connection)?;
        return Ok((session, None, true));
    };

    let user = match session.user_id {
        Some(user_id) => match get_user_by_id(user_id, connection) {
            Ok(user) => Some(user),
            Err(Error::NotFound) => None,
            Err(error) => return Err(error),
        },
        None => None,
    };

    Ok((session, user, false))
}

fn changes_state(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn has_valid_csrf_token(headers: &HeaderMap, csrf_token: &str) -> bool {
    headers
        .get(CSRF_HEADER)
        .and_then(|header| header.to_str().ok())
        .is_some_and(|token| token == csrf_token)
}
