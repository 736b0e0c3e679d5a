//! The order history page and invoice downloads.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::{OffsetDateTime, UtcOffset, macros::format_description};

use crate::{
    AppState, Error,
    auth::User,
    endpoints::{self, format_endpoint},
    html::{CARD_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, base, flash_message},
    navigation::NavBar,
    order::{
        Order, OrderId,
        db::{get_order, get_orders_for_user},
        invoice::{invoice_file_name, render_invoice, save_invoice},
    },
    session::{CurrentSession, SessionId, set_flash, take_flash},
    timezone::get_local_offset,
};

/// The state needed for the orders page and invoices.
#[derive(Debug, Clone)]
pub struct OrdersState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The canonical timezone order times are shown in.
    pub local_timezone: String,
    /// Where generated invoices are written.
    pub invoice_dir: PathBuf,
}

impl FromRef<AppState> for OrdersState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            invoice_dir: state.invoice_dir.clone(),
        }
    }
}

/// Format an order time as `DD/MM/YYYY, HH:mm` at the given offset.
pub fn format_order_date(created_at: OffsetDateTime, offset: UtcOffset) -> String {
    let format = format_description!("[day]/[month]/[year], [hour]:[minute]");

    created_at
        .to_offset(offset)
        .format(format)
        .unwrap_or_else(|error| {
            tracing::error!("Could not format order date {created_at}: {error}");
            created_at.to_string()
        })
}

/// Render the current user's orders, newest first.
pub async fn get_orders_page(
    State(state): State<OrdersState>,
    Extension(session): Extension<CurrentSession>,
    Extension(user): Extension<User>,
) -> Result<Response, Error> {
    let offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()))?;

    let (orders, flash) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        (
            get_orders_for_user(user.id, &connection)?,
            take_flash(&session.id, &connection)?,
        )
    };

    let content = html! {
        (NavBar::new(endpoints::ORDERS_VIEW, true).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            (flash_message(flash.as_deref()))

            @if orders.is_empty() {
                h1 class="text-xl font-bold" { "Nothing there!" }
            } @else {
                ul class="w-full max-w-2xl space-y-4"
                {
                    @for order in &orders {
                        (order_card(order, offset))
                    }
                }
            }
        }
    };

    Ok(base("Your Orders", &session.csrf_token, &content).into_response())
}

fn order_card(order: &Order, offset: UtcOffset) -> Markup {
    html! {
        li class={ (CARD_STYLE) " max-w-none p-5" }
        {
            h2 class="text-lg font-semibold"
            {
                "Order #" (order.id) " - " (format_order_date(order.created_at, offset))
            }

            ul class="list-disc list-inside my-2"
            {
                @for item in &order.items {
                    li { (item.title) " (" (item.quantity) ")" }
                }
            }

            a href=(format_endpoint(endpoints::INVOICE, order.id)) class=(LINK_STYLE) target="_blank"
            {
                "Invoice"
            }
        }
    }
}

/// Generate and return the PDF invoice for one of the current user's orders.
///
/// Unknown orders and orders of other users redirect back to the orders page
/// with a flash message.
pub async fn get_invoice(
    State(state): State<OrdersState>,
    Extension(session): Extension<CurrentSession>,
    Extension(user): Extension<User>,
    Path(raw_order_id): Path<String>,
) -> Response {
    let order = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        let order = match raw_order_id.parse::<OrderId>() {
            Ok(order_id) => get_order(order_id, &connection),
            Err(_) => Err(Error::NotFound),
        };

        match order {
            Ok(order) if order.user_id == user.id => order,
            Ok(order) => {
                tracing::warn!(
                    "User {} tried to download the invoice for order {} of user {}",
                    user.id,
                    order.id,
                    order.user_id
                );
                return flash_and_redirect(&session.id, "Unauthorized user", &connection);
            }
            Err(Error::NotFound) => {
                return flash_and_redirect(&session.id, "Invalid order", &connection);
            }
            Err(error) => return error.into_response(),
        }
    };

    let pdf = match render_invoice(&order) {
        Ok(pdf) => pdf,
        Err(error) => {
            tracing::error!("Could not render invoice for order {}: {error}", order.id);
            return error.into_response();
        }
    };

    if let Err(error) = save_invoice(&state.invoice_dir, order.id, &pdf).await {
        tracing::error!("Could not save invoice for order {}: {error}", order.id);
        return error.into_response();
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", invoice_file_name(order.id)),
            ),
        ],
        pdf,
    )
        .into_response()
}

fn flash_and_redirect(session_id: &SessionId, message: &str, connection: &Connection) -> Response {
    match set_flash(session_id, message, connection) {
        Ok(()) => Redirect::to(endpoints::ORDERS_VIEW).into_response(),
        Err(error) => error.into_response(),
    }
}
