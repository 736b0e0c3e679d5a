//! This file defines the routes for displaying the log-in page and handling log-in requests.
//! The session module handles the lower level session and cookie logic.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    auth::{Email, User, get_user_by_email, normalize_redirect_url},
    endpoints,
    html::{auth_card, base, email_input, link, password_input, submit_button},
    session::{CurrentSession, rotate_session, set_session_cookie, take_flash},
};

pub const INVALID_EMAIL_ERROR_MSG: &str = "Please enter a valid email";
pub const EMPTY_PASSWORD_ERROR_MSG: &str = "Password is a required field";
pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Invalid email or password";

/// The validation messages for the log-in form.
#[derive(Debug, Default)]
struct LogInErrors<'a> {
    email: Option<&'a str>,
    password: Option<&'a str>,
}

fn log_in_form(email: &str, errors: &LogInErrors, redirect_url: Option<&str>) -> Markup {
    html! {
        form
            hx-post=(endpoints::LOG_IN)
            hx-target-422="this"
            hx-target-error="#alert-container"
            hx-swap="outerHTML"
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            @if let Some(redirect_url) = redirect_url {
                input type="hidden" name="redirect_url" value=(redirect_url);
            }

            (email_input(email, errors.email))

            (password_input("password", "Password", errors.password))

            (submit_button("Log in"))

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Forgot your password? "
                (link(endpoints::RESET, "Reset it here"))
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Don't have an account? "
                (link(endpoints::SIGN_UP, "Sign up here"))
            }
        }
    }
}

fn parse_redirect_url(raw_url: Option<&str>, source: &str) -> Option<String> {
    match raw_url.and_then(normalize_redirect_url) {
        Some(redirect_url) => Some(redirect_url),
        None => {
            if let Some(redirect_url) = raw_url {
                tracing::warn!("Invalid redirect URL from {source}: {redirect_url}");
            }
            None
        }
    }
}

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How long the session created at log-in lasts.
    pub session_duration: Duration,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_duration: state.session_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

/// Display the log-in page.
pub async fn get_log_in_page(
    State(state): State<LoginState>,
    Extension(session): Extension<CurrentSession>,
    Query(query): Query<RedirectQuery>,
) -> Result<Response, Error> {
    let flash = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        take_flash(&session.id, &connection)?
    };

    let redirect_url = parse_redirect_url(query.redirect_url.as_deref(), "log-in query");
    let form = log_in_form("", &LogInErrors::default(), redirect_url.as_deref());
    let content = auth_card("Log in to your account", flash.as_deref(), &form);

    Ok(base("Log In", &session.csrf_token, &content).into_response())
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in request the visitor gets a new session bound to the
/// user and is redirected. Otherwise, the form is returned with an error
/// message explaining the problem.
pub async fn post_log_in(
    State(state): State<LoginState>,
    Extension(session): Extension<CurrentSession>,
    jar: PrivateCookieJar,
    Form(user_data): Form<LogInData>,
) -> Response {
    let redirect_url = parse_redirect_url(user_data.redirect_url.as_deref(), "log-in form");
    let redirect_url = redirect_url.as_deref();

    let invalid_form = |errors: LogInErrors| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            log_in_form(&user_data.email, &errors, redirect_url),
        )
            .into_response()
    };

    let email = Email::new(user_data.email.trim());
    let mut errors = LogInErrors::default();

    if email.is_err() {
        errors.email = Some(INVALID_EMAIL_ERROR_MSG);
    }

    if user_data.password.is_empty() {
        errors.password = Some(EMPTY_PASSWORD_ERROR_MSG);
    }

    let email = match email {
        Ok(email) if errors.password.is_none() => email,
        _ => return invalid_form(errors),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let user: User = match get_user_by_email(&email, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => {
            tracing::warn!("Log-in attempt for unknown email {email}");
            return invalid_form(LogInErrors {
                email: None,
                password: Some(INVALID_CREDENTIALS_ERROR_MSG),
            });
        }
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return error.into_alert_response();
        }
    };

    match user.password_hash.verify(&user_data.password) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Wrong password for user {}", user.id);
            return invalid_form(LogInErrors {
                email: None,
                password: Some(INVALID_CREDENTIALS_ERROR_MSG),
            });
        }
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return Error::HashingError(error.to_string()).into_alert_response();
        }
    }

    let new_session = match rotate_session(&session.id, user.id, state.session_duration, &connection)
    {
        Ok(new_session) => new_session,
        Err(error) => {
            tracing::error!("Could not create session for user {}: {error}", user.id);
            return error.into_alert_response();
        }
    };

    tracing::info!("User {} logged in", user.id);

    (
        StatusCode::SEE_OTHER,
        HxRedirect(redirect_url.unwrap_or(endpoints::ROOT).to_owned()),
        set_session_cookie(jar, &new_session),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect_url: Option<String>,
}

/// The raw data entered by the user in the log-in form.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    pub email: String,

    /// Password entered during log-in.
    ///
    /// It is compared against the stored hash, so it is not checked for strength here.
    pub password: String,

    /// Optional URL to redirect to after logging in.
    /// Only accepted from the log-in form submission.
    pub redirect_url: Option<String>,
}
