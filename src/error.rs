//! Defines the app level error type and conversions to rendered HTML pages and alerts.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{alert::Alert, internal_server_error::InternalServerError, not_found::NotFoundError};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The string is not a valid email address.
    #[error("{0} is not a valid email address")]
    InvalidEmail(String),

    /// A user with the email address already exists.
    #[error("the email address is already in use")]
    DuplicateEmail,

    /// A product was submitted without a title.
    #[error("Title is a required field")]
    EmptyTitle,

    /// A product was submitted with a price that is not a non-negative number.
    #[error("Price must be a number")]
    InvalidPrice,

    /// A product was submitted without a description.
    #[error("Description is a required field")]
    EmptyDescription,

    /// The uploaded file is missing or is not a PNG or JPEG image.
    #[error("Attached file is not an image")]
    NotAnImage,

    /// The multipart form could not be parsed.
    #[error("Could not parse multipart form: {0}")]
    MultipartError(String),

    /// Reading or writing a file on disk failed.
    #[error("file system error: {0}")]
    FileError(String),

    /// The user tried to modify a resource they do not own.
    #[error("the user does not own the requested resource")]
    NotOwner,

    /// The reset token does not match any user.
    #[error("the password reset token is invalid")]
    InvalidResetToken,

    /// The reset token matched a user but is past its expiry.
    #[error("the password reset token has expired")]
    ExpiredResetToken,

    /// The CSRF token in the request is missing or does not match the session.
    #[error("missing or invalid CSRF token")]
    InvalidCsrfToken,

    /// The payment processor rejected a request or could not be reached.
    #[error("payment processor error: {0}")]
    PaymentError(String),

    /// An email could not be built or delivered.
    #[error("could not send email: {0}")]
    MailError(String),

    /// The invoice PDF could not be rendered.
    #[error("could not render PDF: {0}")]
    PdfError(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Tried to update a product that does not exist
    #[error("tried to update a product that is not in the database")]
    UpdateMissingProduct,

    /// Tried to delete a product that does not exist
    #[error("tried to delete a product that is not in the database")]
    DeleteMissingProduct,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => NotFoundError.into_response(),
            Error::InvalidCsrfToken => (
                StatusCode::FORBIDDEN,
                InternalServerError {
                    description: "Invalid Request",
                    fix: "Your session may have expired. Reload the page and try again.",
                }
                .into_html(),
            )
                .into_response(),
            Error::InvalidTimezoneError(timezone) => InternalServerError {
                description: "Invalid Timezone Settings",
                fix: &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            }
            .into_response(),
            Error::DatabaseLockError => InternalServerError::default().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// Convert the error into an HTTP response with an HTML alert.
    pub fn into_alert_response(self) -> Response {
        let (status_code, alert) = match self {
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Not found".to_owned(),
                    details: "The requested item could not be found. \
                    Try refreshing the page to see if it has been deleted."
                        .to_owned(),
                },
            ),
            Error::UpdateMissingProduct => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not update product".to_owned(),
                    details: "The product could not be found.".to_owned(),
                },
            ),
            Error::NotOwner => (
                StatusCode::FORBIDDEN,
                Alert::Error {
                    message: "Unauthorized user".to_owned(),
                    details: "You can only change products that you created.".to_owned(),
                },
            ),
            Error::PaymentError(_) => (
                StatusCode::BAD_GATEWAY,
                Alert::Error {
                    message: "Payment unavailable".to_owned(),
                    details: "The payment provider could not be reached. Try again later."
                        .to_owned(),
                },
            ),
            Error::InvalidTimezoneError(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Invalid Timezone Settings".to_owned(),
                    details: format!(
                        "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                    ),
                },
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Something went wrong".to_owned(),
                    details:
                        "An unexpected error occurred, check the server logs for more details."
                            .to_owned(),
                },
            ),
        };

        (status_code, alert.into_html()).into_response()
    }
}
