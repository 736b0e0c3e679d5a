//! The sign-up page for creating a customer account.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::{Email, PasswordHash, ValidatedPassword, create_user},
    endpoints,
    html::{auth_card, base, email_input, link, password_input, submit_button},
    session::CurrentSession,
};

pub const INVALID_EMAIL_ERROR_MSG: &str = "Please enter a valid email";
pub const DUPLICATE_EMAIL_ERROR_MSG: &str = "That email is already in use";
pub const PASSWORD_MISMATCH_ERROR_MSG: &str = "Passwords need to match";

#[derive(Debug, Default)]
struct SignUpErrors {
    email: Option<String>,
    password: Option<String>,
    confirm_password: Option<String>,
}

impl SignUpErrors {
    fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.confirm_password.is_none()
    }
}

fn sign_up_form(email: &str, errors: &SignUpErrors) -> Markup {
    html! {
        form
            hx-post=(endpoints::SIGN_UP)
            hx-target-422="this"
            hx-target-error="#alert-container"
            hx-swap="outerHTML"
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            (email_input(email, errors.email.as_deref()))

            (password_input("password", "Password", errors.password.as_deref()))

            (password_input("confirm_password", "Confirm Password", errors.confirm_password.as_deref()))

            (submit_button("Sign up"))

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Already have an account? "
                (link(endpoints::LOG_IN, "Log in here"))
            }
        }
    }
}

/// Display the sign-up page.
pub async fn get_sign_up_page(Extension(session): Extension<CurrentSession>) -> Response {
    let form = sign_up_form("", &SignUpErrors::default());
    let content = auth_card("Create an account", None, &form);

    base("Sign Up", &session.csrf_token, &content).into_response()
}

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct SignUpState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SignUpState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The raw data entered by the user in the sign-up form.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Create a user from the sign-up form and redirect to the log-in page.
///
/// Every invalid field is reported at once in the returned form.
pub async fn post_sign_up(
    State(state): State<SignUpState>,
    Form(form): Form<SignUpForm>,
) -> Response {
    let invalid_form = |errors: &SignUpErrors| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            sign_up_form(&form.email, errors),
        )
            .into_response()
    };

    let mut errors = SignUpErrors::default();

    let email = Email::new(&form.email)
        .inspect_err(|_| errors.email = Some(INVALID_EMAIL_ERROR_MSG.to_owned()))
        .ok();

    let password = ValidatedPassword::new(&form.password)
        .inspect_err(|error| errors.password = Some(error.to_string()))
        .ok();

    if form.password != form.confirm_password {
        errors.confirm_password = Some(PASSWORD_MISMATCH_ERROR_MSG.to_owned());
    }

    let (Some(email), Some(password)) = (email, password) else {
        return invalid_form(&errors);
    };

    if !errors.is_empty() {
        return invalid_form(&errors);
    }

    let password_hash = match PasswordHash::new(password, PasswordHash::DEFAULT_COST) {
        Ok(password_hash) => password_hash,
        Err(error) => {
            tracing::error!("an error occurred while hashing a password: {error}");
            return error.into_alert_response();
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_user(email, password_hash, &connection) {
        Ok(user) => {
            tracing::info!("Created user {}", user.id);
            (
                HxRedirect(endpoints::LOG_IN.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(Error::DuplicateEmail) => invalid_form(&SignUpErrors {
            email: Some(DUPLICATE_EMAIL_ERROR_MSG.to_owned()),
            ..Default::default()
        }),
        Err(error) => {
            tracing::error!("An unhandled error occurred while inserting a new user: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod sign_up_tests {
    use axum::{
        Extension, Form,
        extract::State,
        http::StatusCode,
        response::Response,
    };
    use scraper::Selector;

    use crate::{
        auth::{Email, get_user_by_email},
        endpoints,
        test_utils::{
            assert_form_input, assert_hx_endpoint, assert_hx_redirect, assert_valid_html,
            must_get_form, parse_html_document, parse_html_fragment, test_db_with_user,
            test_session,
        },
    };

    use super::{
        DUPLICATE_EMAIL_ERROR_MSG, INVALID_EMAIL_ERROR_MSG, PASSWORD_MISMATCH_ERROR_MSG,
        SignUpForm, SignUpState, get_sign_up_page, post_sign_up,
    };

    const STRONG_PASSWORD: &str = "correct horse battery staple";

    async fn sign_up(state: &SignUpState, email: &str, password: &str, confirm: &str) -> Response {
        post_sign_up(
            State(state.clone()),
            Form(SignUpForm {
                email: email.to_owned(),
                password: password.to_owned(),
                confirm_password: confirm.to_owned(),
            }),
        )
        .await
    }

    fn error_messages(html: &scraper::Html) -> Vec<String> {
        html.select(&Selector::parse("p.text-red-500").unwrap())
            .map(|p| p.text().collect::<String>())
            .collect()
    }

    #[tokio::test]
    async fn sign_up_page_displays_form() {
        let response = get_sign_up_page(Extension(test_session(None))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        assert_hx_endpoint(&form, endpoints::SIGN_UP, "hx-post");
        assert_form_input(&form, "email", "email");
        assert_form_input(&form, "password", "password");
        assert_form_input(&form, "confirm_password", "password");
    }

    #[tokio::test]
    async fn sign_up_creates_user_and_redirects_to_log_in() {
        let (db_connection, _) = test_db_with_user();
        let state = SignUpState {
            db_connection: db_connection.clone(),
        };

        let response = sign_up(&state, "New@Example.com", STRONG_PASSWORD, STRONG_PASSWORD).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::LOG_IN);
        let user = get_user_by_email(
            &Email::new("new@example.com").unwrap(),
            &db_connection.lock().unwrap(),
        )
        .unwrap();
        assert!(user.password_hash.verify(STRONG_PASSWORD).unwrap());
    }

    #[tokio::test]
    async fn sign_up_rejects_duplicate_email() {
        let (db_connection, user) = test_db_with_user();
        let state = SignUpState { db_connection };

        let response = sign_up(&state, user.email.as_ref(), STRONG_PASSWORD, STRONG_PASSWORD).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = parse_html_fragment(response).await;
        assert_eq!(error_messages(&html), vec![DUPLICATE_EMAIL_ERROR_MSG]);
    }

    #[tokio::test]
    async fn sign_up_reports_every_invalid_field() {
        let (db_connection, _) = test_db_with_user();
        let state = SignUpState { db_connection };

        let response = sign_up(&state, "not-an-email", "abc", "abcd").await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = parse_html_fragment(response).await;
        let messages = error_messages(&html);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], INVALID_EMAIL_ERROR_MSG);
        assert!(messages[1].contains("at least 6 characters"));
        assert_eq!(messages[2], PASSWORD_MISMATCH_ERROR_MSG);
    }

    #[tokio::test]
    async fn sign_up_rejects_mismatched_passwords() {
        let (db_connection, _) = test_db_with_user();
        let state = SignUpState { db_connection };

        let response = sign_up(&state, "new@example.com", STRONG_PASSWORD, "something else").await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = parse_html_fragment(response).await;
        assert_eq!(error_messages(&html), vec![PASSWORD_MISMATCH_ERROR_MSG]);
    }
}
