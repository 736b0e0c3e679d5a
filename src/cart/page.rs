//! The cart page and the endpoints that add and remove cart lines.

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
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::User,
    cart::db::{CartLine, get_cart, get_cart_lines, save_cart},
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, BUTTON_PRIMARY_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, flash_message,
    },
    navigation::NavBar,
    product::{ProductId, get_product},
    session::{CurrentSession, take_flash},
};

/// The state needed for the cart page and endpoints.
#[derive(Debug, Clone)]
pub struct CartState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CartState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form submitted by the add to cart and remove from cart buttons.
#[derive(Debug, Deserialize)]
pub struct CartForm {
    pub product_id: ProductId,
}

/// Render the current user's cart.
pub async fn get_cart_page(
    State(state): State<CartState>,
    Extension(session): Extension<CurrentSession>,
    Extension(user): Extension<User>,
) -> Result<Response, Error> {
    let (lines, flash) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        (
            get_cart_lines(user.id, &connection)?,
            take_flash(&session.id, &connection)?,
        )
    };

    let content = html! {
        (NavBar::new(endpoints::CART, true).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            (flash_message(flash.as_deref()))

            @if lines.is_empty() {
                h1 class="text-xl font-bold" { "No products in cart" }
            } @else {
                (cart_table(&lines))

                a href=(endpoints::CHECKOUT_VIEW) class={ (BUTTON_PRIMARY_STYLE) " block text-center mt-4 max-w-xs" }
                {
                    "Order Now!"
                }
            }
        }
    };

    Ok(base("Cart", &session.csrf_token, &content).into_response())
}

fn cart_table(lines: &[CartLine]) -> Markup {
    html! {
        table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
        {
            thead class=(TABLE_HEADER_STYLE)
            {
                tr
                {
                    th scope="col" class=(TABLE_CELL_STYLE) { "Product" }
                    th scope="col" class=(TABLE_CELL_STYLE) { "Quantity" }
                    th scope="col" class=(TABLE_CELL_STYLE) { span class="sr-only" { "Remove" } }
                }
            }

            tbody
            {
                @for line in lines {
                    tr class=(TABLE_ROW_STYLE)
                    {
                        td class=(TABLE_CELL_STYLE) { (line.product.title) }
                        td class=(TABLE_CELL_STYLE) { (line.quantity) }
                        td class=(TABLE_CELL_STYLE)
                        {
                            form
                                hx-post=(endpoints::CART_DELETE_ITEM)
                                hx-target-error="#alert-container"
                            {
                                input type="hidden" name="product_id" value=(line.product.id);
                                button type="submit" class=(BUTTON_DELETE_STYLE) { "Delete" }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Add one unit of a product to the current user's cart.
pub async fn add_to_cart_endpoint(
    State(state): State<CartState>,
    Extension(user): Extension<User>,
    Form(form): Form<CartForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let result = get_product(form.product_id, &connection).and_then(|product| {
        let mut cart = get_cart(user.id, &connection)?;
        cart.add_product(product.id);
        save_cart(user.id, &cart, &connection)
    });

    match result {
        Ok(()) => (HxRedirect(endpoints::CART.to_owned()), StatusCode::SEE_OTHER).into_response(),
        Err(Error::NotFound) => {
            tracing::warn!(
                "User {} tried to add unknown product {} to their cart",
                user.id,
                form.product_id
            );
            Error::NotFound.into_alert_response()
        }
        Err(error) => {
            tracing::error!("Could not add product to cart: {error}");
            error.into_alert_response()
        }
    }
}

/// Remove a product's line from the current user's cart.
pub async fn delete_cart_item_endpoint(
    State(state): State<CartState>,
    Extension(user): Extension<User>,
    Form(form): Form<CartForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let result = get_cart(user.id, &connection).and_then(|mut cart| {
        cart.remove_product(form.product_id);
        save_cart(user.id, &cart, &connection)
    });

    match result {
        Ok(()) => (HxRedirect(endpoints::CART.to_owned()), StatusCode::SEE_OTHER).into_response(),
        Err(error) => {
            tracing::error!("Could not remove product from cart: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod cart_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Form,
        extract::State,
        http::StatusCode,
    };
    use rusqlite::Connection;
    use scraper::Selector;

    use crate::{
        auth::User,
        cart::{
            CartItem,
            db::get_cart,
            page::{CartForm, CartState, add_to_cart_endpoint, delete_cart_item_endpoint, get_cart_page},
        },
        endpoints,
        product::{ProductDetails, ProductId, create_product},
        test_utils::{assert_hx_redirect, assert_valid_html, parse_html_document, test_db_with_user, test_session},
    };

    fn fixture() -> (CartState, User, ProductId) {
        let (db_connection, user) = test_db_with_user();
        let product_id = create_product(
            ProductDetails {
                title: "Book".to_owned(),
                price: 5.0,
                description: "desc".to_owned(),
            },
            "img.png",
            user.id,
            &db_connection.lock().unwrap(),
        )
        .unwrap()
        .id;

        (CartState { db_connection }, user, product_id)
    }

    fn connection(state: &CartState) -> std::sync::MutexGuard<'_, Connection> {
        state.db_connection.lock().unwrap()
    }

    #[tokio::test]
    async fn empty_cart_says_so() {
        let (state, user, _) = fixture();

        let response = get_cart_page(
            State(state),
            Extension(test_session(Some(user.clone()))),
            Extension(user),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let heading = html
            .select(&Selector::parse("main h1").unwrap())
            .next()
            .unwrap()
            .text()
            .collect::<String>();
        assert_eq!(heading, "No products in cart");
    }

    #[tokio::test]
    async fn adding_twice_increments_quantity() {
        let (state, user, product_id) = fixture();

        for _ in 0..2 {
            let response = add_to_cart_endpoint(
                State(state.clone()),
                Extension(user.clone()),
                Form(CartForm { product_id }),
            )
            .await;
            assert_hx_redirect(&response, endpoints::CART);
        }

        let cart = get_cart(user.id, &connection(&state)).unwrap();
        assert_eq!(
            cart.items,
            vec![CartItem {
                product_id,
                quantity: 2
            }]
        );
    }

    #[tokio::test]
    async fn adding_unknown_product_is_not_found() {
        let (state, user, _) = fixture();

        let response = add_to_cart_endpoint(
            State(state.clone()),
            Extension(user.clone()),
            Form(CartForm { product_id: 999 }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(get_cart(user.id, &connection(&state)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_line_and_page_lists_rest() {
        let (state, user, product_id) = fixture();
        add_to_cart_endpoint(
            State(state.clone()),
            Extension(user.clone()),
            Form(CartForm { product_id }),
        )
        .await;

        let response = get_cart_page(
            State(state.clone()),
            Extension(test_session(Some(user.clone()))),
            Extension(user.clone()),
        )
        .await
        .unwrap();
        let html = parse_html_document(response).await;
        let rows = html.select(&Selector::parse("tbody tr").unwrap()).count();
        assert_eq!(rows, 1);

        let response = delete_cart_item_endpoint(
            State(state.clone()),
            Extension(user.clone()),
            Form(CartForm { product_id }),
        )
        .await;

        assert_hx_redirect(&response, endpoints::CART);
        assert!(get_cart(user.id, &connection(&state)).unwrap().is_empty());
    }
}
