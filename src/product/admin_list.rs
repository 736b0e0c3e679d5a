//! The admin product list: the products the current user has created.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::User,
    endpoints::{self, format_endpoint},
    html::{BUTTON_DELETE_STYLE, CARD_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, base, format_currency},
    navigation::NavBar,
    pagination::{
        PageQuery, PaginationConfig, create_pagination_indicators, page_count, page_offset,
        pagination_view,
    },
    product::{
        Product,
        db::{count_products_for_user, get_products_page_for_user},
    },
    session::CurrentSession,
};

/// The state needed for the admin product list.
#[derive(Debug, Clone)]
pub struct AdminProductsState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for AdminProductsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// Render the current user's products with edit and delete controls.
pub async fn get_admin_products_page(
    State(state): State<AdminProductsState>,
    Extension(session): Extension<CurrentSession>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
) -> Result<Response, Error> {
    let config = &state.pagination_config;
    let page = query.page_or(config.default_page);

    let (products, product_count) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        let product_count = count_products_for_user(user.id, &connection)?;
        let products = get_products_page_for_user(
            user.id,
            config.admin_page_size,
            page_offset(page, config.admin_page_size),
            &connection,
        )?;

        (products, product_count)
    };

    let indicators = create_pagination_indicators(
        page,
        page_count(product_count, config.admin_page_size),
        config.max_pages,
    );

    let content = html! {
        (NavBar::new(endpoints::ADMIN_PRODUCTS_VIEW, true).into_html())

        div class=(PAGE_CONTAINER_STYLE)
        {
            @if products.is_empty() {
                h1 class="text-xl font-bold" { "No products found" }
                a href=(endpoints::ADD_PRODUCT) class=(LINK_STYLE) { "Add a product" }
            } @else {
                div class="grid gap-6 md:grid-cols-2 lg:grid-cols-3"
                {
                    @for product in &products {
                        (admin_product_card(product))
                    }
                }
            }

            (pagination_view(endpoints::ADMIN_PRODUCTS_VIEW, &indicators))
        }
    };

    Ok(base("Admin Products", &session.csrf_token, &content).into_response())
}

fn admin_product_card(product: &Product) -> Markup {
    let edit_url = format!(
        "{}?edit=true",
        format_endpoint(endpoints::EDIT_PRODUCT_VIEW, product.id)
    );
    let delete_url = format_endpoint(endpoints::DELETE_PRODUCT, product.id);

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
                    a href=(edit_url) class=(LINK_STYLE) { "Edit" }

                    button
                        type="button"
                        hx-delete=(delete_url)
                        hx-confirm={ "Are you sure you want to delete '" (product.title) "'?" }
                        hx-target="closest article"
                        hx-target-error="#alert-container"
                        hx-swap="delete"
                        class=(BUTTON_DELETE_STYLE)
                    {
                        "Delete"
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod admin_products_tests {
    use axum::{
        Extension,
        extract::{Query, State},
        http::StatusCode,
    };
    use scraper::Selector;

    use crate::{
        endpoints::{self, format_endpoint},
        pagination::{PageQuery, PaginationConfig},
        product::{
            ProductDetails,
            admin_list::{AdminProductsState, get_admin_products_page},
            db::create_product,
        },
        test_utils::{
            assert_valid_html, create_test_user, parse_html_document, test_db_with_user,
            test_session,
        },
    };

    fn details(title: &str) -> ProductDetails {
        ProductDetails {
            title: title.to_owned(),
            price: 3.0,
            description: "desc".to_owned(),
        }
    }

    #[tokio::test]
    async fn only_lists_own_products_with_controls() {
        let (db_connection, user) = test_db_with_user();
        let (mine, _theirs) = {
            let connection = db_connection.lock().unwrap();
            let other = create_test_user("other@example.com", &connection);
            let mine = create_product(details("mine"), "a.png", user.id, &connection).unwrap();
            let theirs = create_product(details("theirs"), "b.png", other.id, &connection).unwrap();
            (mine, theirs)
        };
        let state = AdminProductsState {
            db_connection,
            pagination_config: PaginationConfig::default(),
        };

        let response = get_admin_products_page(
            State(state),
            Extension(test_session(Some(user.clone()))),
            Extension(user),
            Query(PageQuery::default()),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let titles = html
            .select(&Selector::parse("article h2").unwrap())
            .map(|h2| h2.text().collect::<String>())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["mine"]);

        let delete_button = html
            .select(&Selector::parse("article button[hx-delete]").unwrap())
            .next()
            .expect("missing delete button");
        assert_eq!(
            delete_button.value().attr("hx-delete"),
            Some(format_endpoint(endpoints::DELETE_PRODUCT, mine.id).as_str())
        );
        let edit_link = html
            .select(&Selector::parse("article a").unwrap())
            .next()
            .expect("missing edit link");
        assert_eq!(
            edit_link.value().attr("href"),
            Some(format!("/admin/edit-product/{}?edit=true", mine.id).as_str())
        );
    }
}
