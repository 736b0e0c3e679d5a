//! The checkout page and the payment processor's return URLs.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::User,
    cart::{CartLine, cart_total, clear_cart, get_cart_lines},
    checkout::payment::{CheckoutRequest, PaymentLineItem, PaymentProcessor, to_cents},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE,
        TABLE_ROW_STYLE, base, format_currency,
    },
    navigation::NavBar,
    order::create_order,
    session::{CurrentSession, set_flash},
};

/// The state needed for checking out.
#[derive(Clone)]
pub struct CheckoutState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub payment_processor: Arc<dyn PaymentProcessor>,
    /// The externally reachable base URL the payment processor returns customers to.
    pub public_url: String,
}

impl FromRef<AppState> for CheckoutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            payment_processor: state.payment_processor.clone(),
            public_url: state.public_url.clone(),
        }
    }
}

/// Render the checkout summary with a link to the hosted payment page.
///
/// An empty cart redirects back to the cart page with a flash message.
pub async fn get_checkout_page(
    State(state): State<CheckoutState>,
    Extension(session): Extension<CurrentSession>,
    Extension(user): Extension<User>,
) -> Response {
    checkout_page(state, session, user).await
}

/// The payment processor sends customers here when they abandon payment.
pub async fn get_checkout_cancel_page(
    State(state): State<CheckoutState>,
    Extension(session): Extension<CurrentSession>,
    Extension(user): Extension<User>,
) -> Response {
    tracing::info!("User {} cancelled checkout", user.id);
    checkout_page(state, session, user).await
}

async fn checkout_page(state: CheckoutState, session: CurrentSession, user: User) -> Response {
    let lines = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        match get_cart_lines(user.id, &connection) {
            Ok(lines) if lines.is_empty() => {
                return match set_flash(&session.id, "Your cart is empty", &connection) {
                    Ok(()) => Redirect::to(endpoints::CART).into_response(),
                    Err(error) => error.into_response(),
                };
            }
            Ok(lines) => lines,
            Err(error) => return error.into_response(),
        }
    };

    let request = checkout_request(&lines, &state.public_url);
    let payment_session = match state.payment_processor.create_checkout_session(request).await {
        Ok(payment_session) => payment_session,
        Err(error) => {
            tracing::error!("Could not create checkout session for user {}: {error}", user.id);
            return error.into_response();
        }
    };

    tracing::debug!(
        "Created checkout session {} for user {}",
        payment_session.id,
        user.id
    );

    checkout_view(&lines, &payment_session.url, &session.csrf_token).into_response()
}

fn checkout_request(lines: &[CartLine], public_url: &str) -> CheckoutRequest {
    let public_url = public_url.trim_end_matches('/');

    CheckoutRequest {
        line_items: lines
            .iter()
            .map(|line| PaymentLineItem {
                name: line.product.title.clone(),
                description: line.product.description.clone(),
                unit_amount: to_cents(line.product.price),
                quantity: line.quantity,
            })
            .collect(),
        success_url: format!("{public_url}{}", endpoints::CHECKOUT_SUCCESS),
        cancel_url: format!("{public_url}{}", endpoints::CHECKOUT_CANCEL),
    }
}

fn checkout_view(lines: &[CartLine], payment_url: &str, csrf_token: &str) -> Markup {
    let content = html! {
        (NavBar::new(endpoints::CHECKOUT_VIEW, true).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Product" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Quantity" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Price" }
                    }
                }

                tbody
                {
                    @for line in lines {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td class=(TABLE_CELL_STYLE) { (line.product.title) }
                            td class=(TABLE_CELL_STYLE) { (line.quantity) }
                            td class=(TABLE_CELL_STYLE) { (format_currency(line.subtotal())) }
                        }
                    }
                }
            }

            h2 #total class="text-xl font-bold my-4" { "Total: " (format_currency(cart_total(lines))) }

            a #order-button href=(payment_url) class={ (BUTTON_PRIMARY_STYLE) " block text-center max-w-xs" }
            {
                "Order"
            }
        }
    };

    base("Checkout", csrf_token, &content)
}

/// The payment processor sends customers here after paying.
///
/// The cart is copied into a new order and then emptied. An empty cart creates no order.
pub async fn get_checkout_success(
    State(state): State<CheckoutState>,
    Extension(user): Extension<User>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let lines = match get_cart_lines(user.id, &connection) {
        Ok(lines) => lines,
        Err(error) => return error.into_response(),
    };

    if lines.is_empty() {
        tracing::warn!("User {} completed checkout with an empty cart", user.id);
        return Redirect::to(endpoints::ORDERS_VIEW).into_response();
    }

    let order = match create_order(user.id, &lines, OffsetDateTime::now_utc(), &connection) {
        Ok(order) => order,
        Err(error) => {
            tracing::error!("Could not create order for user {}: {error}", user.id);
            return error.into_response();
        }
    };

    if let Err(error) = clear_cart(user.id, &connection) {
        tracing::error!(
            "Created order {} but could not clear the cart of user {}: {error}",
            order.id,
            user.id
        );
        return error.into_response();
    }

    tracing::info!("User {} placed order {}", user.id, order.id);

    Redirect::to(endpoints::ORDERS_VIEW).into_response()
}
