//! The public catalog: the shop front page, the product list and product details.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error, endpoints,
    html::{BUTTON_PRIMARY_STYLE, CARD_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, base, flash_message, format_currency},
    navigation::NavBar,
    pagination::{
        PageQuery, PaginationConfig, create_pagination_indicators, page_count, page_offset,
        pagination_view,
    },
    product::{
        Product, ProductId,
        db::{count_products, get_product, get_products_page},
    },
    session::{CurrentSession, take_flash},
};

/// The state needed for the catalog pages.
#[derive(Debug, Clone)]
pub struct ShopState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ShopState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// Render the shop front page.
pub async fn get_index_page(
    State(state): State<ShopState>,
    Extension(session): Extension<CurrentSession>,
    Query(query): Query<PageQuery>,
) -> Result<Response, Error> {
    product_list_page(state, session, query, endpoints::ROOT, "Shop")
}

/// Render the list of all products.
pub async fn get_all_products_page(
    State(state): State<ShopState>,
    Extension(session): Extension<CurrentSession>,
    Query(query): Query<PageQuery>,
) -> Result<Response, Error> {
    product_list_page(state, session, query, endpoints::PRODUCTS_VIEW, "All Products")
}

fn product_list_page(
    state: ShopState,
    session: CurrentSession,
    query: PageQuery,
    endpoint: &str,
    title: &str,
) -> Result<Response, Error> {
    let config = &state.pagination_config;
    let page = query.page_or(config.default_page);

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let product_count = count_products(&connection)
        .inspect_err(|error| tracing::error!("Could not count products: {error}"))?;
    let products = get_products_page(
        config.shop_page_size,
        page_offset(page, config.shop_page_size),
        &connection,
    )
    .inspect_err(|error| tracing::error!("Could not get page {page} of products: {error}"))?;
    let flash = take_flash(&session.id, &connection)?;

    let indicators = create_pagination_indicators(
        page,
        page_count(product_count, config.shop_page_size),
        config.max_pages,
    );

    let content = html! {
        (NavBar::new(endpoint, session.is_authenticated()).into_html())

        div class=(PAGE_CONTAINER_STYLE)
        {
            (flash_message(flash.as_deref()))

            @if products.is_empty() {
                h1 class="text-xl font-bold" { "No products found" }
            } @else {
                div class="grid gap-6 md:grid-cols-2 lg:grid-cols-3"
                {
                    @for product in &products {
                        (product_card(product, session.is_authenticated()))
                    }
                }
            }

            (pagination_view(endpoint, &indicators))
        }
    };

    Ok(base(title, &session.csrf_token, &content).into_response())
}

/// Render a single product.
pub async fn get_product_page(
    State(state): State<ShopState>,
    Extension(session): Extension<CurrentSession>,
    Path(product_id): Path<ProductId>,
) -> Result<Response, Error> {
    let product = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_product(product_id, &connection)?
    };

    let content = html! {
        (NavBar::new(endpoints::PRODUCTS_VIEW, session.is_authenticated()).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-3xl font-bold mb-4" { (product.title) }

            img
                src=(product.image_url())
                alt=(product.title)
                class="max-w-md rounded-lg mb-4";

            h2 class="text-2xl mb-2" { (format_currency(product.price)) }

            p class="mb-4" { (product.description) }

            @if session.is_authenticated() {
                (add_to_cart_button(product.id))
            }
        }
    };

    Ok(base(&product.title, &session.csrf_token, &content).into_response())
}

fn product_card(product: &Product, is_authenticated: bool) -> Markup {
    let detail_url = endpoints::format_endpoint(endpoints::PRODUCT_VIEW, product.id);

    html! {
        article class=(CARD_STYLE)
        {
            img class="rounded-t-lg" src=(product.image_url()) alt=(product.title);

            div class="p-5 space-y-2"
            {
                h2 class="text-xl font-semibold" { (product.title) }
                p class="text-lg" { (format_currency(product.price)) }
                p { (product.description) }

                div class="flex items-center gap-4"
                {
                    a href=(detail_url) class=(LINK_STYLE) { "Details" }

                    @if is_authenticated {
                        (add_to_cart_button(product.id))
                    }
                }
            }
        }
    }
}

/// A button that adds one unit of the product to the cart.
pub fn add_to_cart_button(product_id: ProductId) -> Markup {
    html! {
        form
            hx-post=(endpoints::CART)
            hx-target-error="#alert-container"
        {
            input type="hidden" name="product_id" value=(product_id);
            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add to Cart" }
        }
    }
}
