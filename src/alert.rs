//! Alert system for displaying success and error messages to users.
//!
//! Alerts are swapped into the `#alert-container` element that every page
//! renders, either as the target of a failed HTMX request or out-of-band.

use axum::response::{Html, IntoResponse, Response};
use maud::{Markup, html};

/// An alert message rendered as a dismissable toast.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// A success message with extra details.
    Success {
        /// The headline.
        message: String,
        /// A longer explanation shown under the headline.
        details: String,
    },
    /// An error message with extra details.
    Error {
        /// The headline.
        message: String,
        /// A longer explanation shown under the headline.
        details: String,
    },
}

impl Alert {
    pub fn into_markup(self) -> Markup {
        let (message, details, container_style, icon) = match self {
            Alert::Success { message, details } => (
                message,
                details,
                "flex items-start p-4 mb-4 text-green-800 rounded-lg bg-green-50 \
                dark:bg-gray-800 dark:text-green-400",
                "✓",
            ),
            Alert::Error { message, details } => (
                message,
                details,
                "flex items-start p-4 mb-4 text-red-800 rounded-lg bg-red-50 \
                dark:bg-gray-800 dark:text-red-400",
                "!",
            ),
        };

        html! {
            div
                id="alert-container"
                hx-swap-oob="true"
                class="w-full max-w-md px-4"
                style="position: fixed; bottom: 1rem; left: 50%; transform: translateX(-50%); z-index: 9999;"
            {
                div class=(container_style) role="alert"
                {
                    span class="shrink-0 me-3 font-bold" { (icon) }

                    div
                    {
                        p class="font-medium" { (message) }

                        @if !details.is_empty() {
                            p class="text-sm" { (details) }
                        }
                    }

                    button
                        type="button"
                        class="ms-auto -mx-1.5 -my-1.5 rounded-lg p-1.5 inline-flex items-center justify-center h-8 w-8"
                        aria-label="Close"
                        onclick="this.closest('#alert-container').classList.add('hidden')"
                    {
                        "×"
                    }
                }
            }
        }
    }

    pub fn into_html(self) -> Html<String> {
        Html(self.into_markup().into_string())
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}
