//! The 404 page.
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::error_view;

/// Renders the "page not found" view with a 404 status.
pub struct NotFoundError;

impl IntoResponse for NotFoundError {
    fn into_response(self) -> Response {
        (
            StatusCode::NOT_FOUND,
            Html(
                error_view(
                    "Not Found",
                    "404",
                    "Something's missing.",
                    "Sorry, we can't find that page. You'll find lots to explore on the home page.",
                )
                .into_string(),
            ),
        )
            .into_response()
    }
}

/// Fallback handler for unknown routes.
pub async fn get_404_not_found() -> Response {
    NotFoundError.into_response()
}
