//! Storefront is a server-rendered web shop.
//!
//! Visitors browse a paginated product catalogue. Customers sign up, fill a
//! cart, pay through a hosted checkout page and download PDF invoices for
//! their orders. Any customer can list their own products for sale.
//!
//! This library provides the HTTP handlers that directly serve HTML pages,
//! using HTMX for form submissions.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod alert;
mod app_state;
mod auth;
mod cart;
mod checkout;
mod config;
mod db;
mod endpoints;
mod error;
mod html;
mod internal_server_error;
mod logging;
mod mail;
mod navigation;
mod not_found;
mod order;
mod pagination;
mod product;
mod routing;
mod session;
mod timezone;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppSettings, AppState};
pub use checkout::{OfflinePaymentProcessor, PaymentProcessor, StripeClient};
pub use config::Config;
pub use db::initialize as initialize_db;
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use mail::{LogMailer, Mailer, SmtpMailer};
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use session::delete_expired_sessions;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
