//! Log-out route handler that ends the session and redirects to the shop.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error, endpoints,
    session::{CurrentSession, delete_session, invalidate_session_cookie},
};

/// The state needed to log out.
#[derive(Debug, Clone)]
pub struct LogOutState {
    pub cookie_key: Key,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogOutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<LogOutState> for Key {
    fn from_ref(state: &LogOutState) -> Self {
        state.cookie_key.clone()
    }
}

/// Delete the session, invalidate the session cookie and redirect the client to the shop.
pub async fn post_log_out(
    State(state): State<LogOutState>,
    Extension(session): Extension<CurrentSession>,
    jar: PrivateCookieJar,
) -> Response {
    let result = match state.db_connection.lock() {
        Ok(connection) => delete_session(&session.id, &connection),
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            Err(Error::DatabaseLockError)
        }
    };

    if let Err(error) = result {
        tracing::error!("Could not delete session on log out: {error}");
        return error.into_alert_response();
    }

    if let Some(user) = &session.user {
        tracing::info!("User {} logged out", user.id);
    }

    (
        StatusCode::SEE_OTHER,
        HxRedirect(endpoints::ROOT.to_owned()),
        invalidate_session_cookie(jar),
    )
        .into_response()
}

#[cfg(test)]
mod log_out_tests {
    use axum::{
        Extension,
        extract::State,
        http::{StatusCode, header::SET_COOKIE},
    };
    use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        app_state::create_cookie_key,
        auth::log_out::{LogOutState, post_log_out},
        endpoints,
        session::{
            COOKIE_SESSION_ID, CurrentSession, DEFAULT_SESSION_DURATION, create_session,
            get_session,
        },
        test_utils::{assert_hx_redirect, test_db_with_user},
    };

    #[tokio::test]
    async fn log_out_deletes_session_and_expires_cookie() {
        let (db_connection, user) = test_db_with_user();
        let session = create_session(
            Some(user.id),
            DEFAULT_SESSION_DURATION,
            &db_connection.lock().unwrap(),
        )
        .unwrap();
        let state = LogOutState {
            cookie_key: create_cookie_key("42"),
            db_connection: db_connection.clone(),
        };
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        let response = post_log_out(
            State(state),
            Extension(CurrentSession {
                id: session.id.clone(),
                csrf_token: session.csrf_token,
                user: Some(user),
            }),
            jar,
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::ROOT);
        assert_eq!(
            get_session(&session.id, &db_connection.lock().unwrap()),
            Err(Error::NotFound)
        );

        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|header| Cookie::parse(header.to_str().unwrap().to_owned()).unwrap())
            .find(|cookie| cookie.name() == COOKIE_SESSION_ID)
            .expect("session cookie not set");
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
