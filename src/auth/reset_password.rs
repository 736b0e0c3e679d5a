//! Password reset via single-use links sent by email.
//!
//! The flow is:
//! 1. The user asks for a reset link at [endpoints::RESET].
//! 2. A token is stored against the user and emailed as a link to [endpoints::NEW_PASSWORD_VIEW].
//! 3. The user picks a new password, which clears the token.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Extension, Form,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{
        Email, PasswordHash, RESET_TOKEN_DURATION, User, ValidatedPassword, generate_token,
        get_user_by_email, get_user_by_reset_token, set_reset_token, update_password,
    },
    endpoints::{self, format_endpoint},
    html::{auth_card, base, email_input, link, password_input, submit_button},
    mail::{Mailer, password_reset_email},
    session::{CurrentSession, SessionId, set_flash, take_flash},
};

pub const UNKNOWN_EMAIL_MSG: &str = "No account with that email was found";
pub const RESET_EMAIL_SENT_MSG: &str = "Check your email for a link to reset your password";
pub const INVALID_TOKEN_MSG: &str = "Invalid token";
pub const EXPIRED_TOKEN_MSG: &str = "Your reset token has expired";
pub const PASSWORD_MISMATCH_MSG: &str = "Passwords need to match";
pub const PASSWORD_UPDATED_MSG: &str = "Your password has been updated, please log in";

/// The state needed for resetting passwords.
#[derive(Clone)]
pub struct ResetState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub mailer: Arc<dyn Mailer>,
    /// The externally reachable base URL reset links point to.
    pub public_url: String,
}

impl FromRef<AppState> for ResetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            mailer: state.mailer.clone(),
            public_url: state.public_url.clone(),
        }
    }
}

fn lock(db_connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)
}

/// Set the flash message and send an HTMX redirect to `url`.
fn flash_hx_redirect(
    session_id: &SessionId,
    message: &str,
    url: &str,
    connection: &Connection,
) -> Response {
    match set_flash(session_id, message, connection) {
        Ok(()) => (HxRedirect(url.to_owned()), StatusCode::SEE_OTHER).into_response(),
        Err(error) => error.into_alert_response(),
    }
}

fn reset_form() -> Markup {
    html! {
        form
            hx-post=(endpoints::RESET)
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            (email_input("", None))

            (submit_button("Reset Password"))

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Remembered it? "
                (link(endpoints::LOG_IN, "Log in here"))
            }
        }
    }
}

/// Display the form for requesting a password reset email.
pub async fn get_reset_page(
    State(state): State<ResetState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Response, Error> {
    let flash = take_flash(&session.id, &*lock(&state.db_connection)?)?;
    let content = auth_card("Reset your password", flash.as_deref(), &reset_form());

    Ok(base("Reset Password", &session.csrf_token, &content).into_response())
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ResetForm {
    pub email: String,
}

/// Store a reset token for the account and email the user a link to use it.
pub async fn post_reset(
    State(state): State<ResetState>,
    Extension(session): Extension<CurrentSession>,
    Form(form): Form<ResetForm>,
) -> Response {
    let email = {
        let connection = match lock(&state.db_connection) {
            Ok(connection) => connection,
            Err(error) => return error.into_alert_response(),
        };

        let user = match Email::new(&form.email).and_then(|email| get_user_by_email(&email, &connection)) {
            Ok(user) => user,
            Err(Error::NotFound | Error::InvalidEmail(_)) => {
                return flash_hx_redirect(&session.id, UNKNOWN_EMAIL_MSG, endpoints::RESET, &connection);
            }
            Err(error) => return error.into_alert_response(),
        };

        let token = generate_token();
        let expires_at = OffsetDateTime::now_utc() + RESET_TOKEN_DURATION;

        if let Err(error) = set_reset_token(user.id, &token, expires_at, &connection) {
            tracing::error!("Could not store reset token for user {}: {error}", user.id);
            return error.into_alert_response();
        }

        password_reset_email(user.email, &state.public_url, &token)
    };

    if let Err(error) = state.mailer.send(email).await {
        tracing::error!("Could not send password reset email: {error}");
        return error.into_alert_response();
    }

    match lock(&state.db_connection) {
        Ok(connection) => {
            flash_hx_redirect(&session.id, RESET_EMAIL_SENT_MSG, endpoints::ROOT, &connection)
        }
        Err(error) => error.into_alert_response(),
    }
}

/// Look up the user for a reset token, setting a flash message explaining why
/// the token was rejected.
fn check_reset_token(
    session_id: &SessionId,
    token: &str,
    connection: &Connection,
) -> Result<Option<User>, Error> {
    let message = match get_user_by_reset_token(token, OffsetDateTime::now_utc(), connection) {
        Ok(user) => return Ok(Some(user)),
        Err(Error::InvalidResetToken) => INVALID_TOKEN_MSG,
        Err(Error::ExpiredResetToken) => EXPIRED_TOKEN_MSG,
        Err(error) => return Err(error),
    };

    tracing::warn!("Rejected password reset token: {message}");
    set_flash(session_id, message, connection)?;

    Ok(None)
}

fn new_password_form(token: &str) -> Markup {
    html! {
        form
            hx-post=(endpoints::RESET_PASSWORD)
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            input type="hidden" name="token" value=(token);

            (password_input("password", "New Password", None))

            (password_input("confirm_password", "Confirm Password", None))

            (submit_button("Update Password"))
        }
    }
}

/// Display the form for choosing a new password, if the token in the link is valid.
pub async fn get_new_password_page(
    State(state): State<ResetState>,
    Extension(session): Extension<CurrentSession>,
    Path(token): Path<String>,
) -> Result<Response, Error> {
    let connection = lock(&state.db_connection)?;

    if check_reset_token(&session.id, &token, &connection)?.is_none() {
        return Ok(Redirect::to(endpoints::LOG_IN).into_response());
    }

    let flash = take_flash(&session.id, &connection)?;
    let content = auth_card("Choose a new password", flash.as_deref(), &new_password_form(&token));

    Ok(base("New Password", &session.csrf_token, &content).into_response())
}

#[derive(Clone, Serialize, Deserialize)]
pub struct NewPasswordForm {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

/// Replace the password of the user owning the token and invalidate the token.
pub async fn post_reset_password(
    State(state): State<ResetState>,
    Extension(session): Extension<CurrentSession>,
    Form(form): Form<NewPasswordForm>,
) -> Response {
    let user = {
        let connection = match lock(&state.db_connection) {
            Ok(connection) => connection,
            Err(error) => return error.into_alert_response(),
        };

        match check_reset_token(&session.id, &form.token, &connection) {
            Ok(Some(user)) => user,
            Ok(None) => {
                return (HxRedirect(endpoints::LOG_IN.to_owned()), StatusCode::SEE_OTHER)
                    .into_response();
            }
            Err(error) => return error.into_alert_response(),
        }
    };

    let retry_url = format_endpoint(endpoints::NEW_PASSWORD_VIEW, &form.token);

    let password = if form.password != form.confirm_password {
        Err(PASSWORD_MISMATCH_MSG.to_owned())
    } else {
        ValidatedPassword::new(&form.password).map_err(|error| error.to_string())
    };

    let password_hash = match password {
        Ok(password) => PasswordHash::new(password, PasswordHash::DEFAULT_COST),
        Err(message) => {
            return match lock(&state.db_connection) {
                Ok(connection) => flash_hx_redirect(&session.id, &message, &retry_url, &connection),
                Err(error) => error.into_alert_response(),
            };
        }
    };

    let password_hash = match password_hash {
        Ok(password_hash) => password_hash,
        Err(error) => {
            tracing::error!("an error occurred while hashing a password: {error}");
            return error.into_alert_response();
        }
    };

    let connection = match lock(&state.db_connection) {
        Ok(connection) => connection,
        Err(error) => return error.into_alert_response(),
    };

    match update_password(user.id, &form.token, &password_hash, &connection) {
        Ok(()) => {}
        Err(Error::InvalidResetToken) => {
            tracing::warn!("Reset token for user {} was already used", user.id);
            return flash_hx_redirect(&session.id, INVALID_TOKEN_MSG, endpoints::LOG_IN, &connection);
        }
        Err(error) => {
            tracing::error!("Could not update password for user {}: {error}", user.id);
            return error.into_alert_response();
        }
    }

    tracing::info!("User {} reset their password", user.id);

    flash_hx_redirect(&session.id, PASSWORD_UPDATED_MSG, endpoints::LOG_IN, &connection)
}
