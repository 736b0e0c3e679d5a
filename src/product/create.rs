//! Product creation page and endpoint.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::User,
    endpoints,
    html::{FORM_CONTAINER_STYLE, base},
    navigation::NavBar,
    product::{
        ProductFormData, ProductFormErrors,
        db::create_product,
        form::{parse_product_form, product_form_view},
        image::{delete_image, save_image},
    },
    session::CurrentSession,
};

/// The state needed for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProductState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// Where uploaded product images are stored.
    pub image_dir: PathBuf,
}

impl FromRef<AppState> for CreateProductState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            image_dir: state.image_dir.clone(),
        }
    }
}

/// Render the product creation page.
pub async fn get_add_product_page(Extension(session): Extension<CurrentSession>) -> Response {
    add_product_view(&session.csrf_token).into_response()
}

/// Handle product creation form submission.
///
/// Invalid forms are returned with an error under each invalid field and a 422 status.
pub async fn create_product_endpoint(
    State(state): State<CreateProductState>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Response {
    let form = match parse_product_form(multipart).await {
        Ok(form) => form,
        Err(error) => return error.into_alert_response(),
    };

    let details = match form.validate(true) {
        Ok(details) => details,
        Err(errors) => {
            tracing::warn!("Rejected invalid product form: {errors:?}");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                product_form_view(endpoints::ADD_PRODUCT, None, &form, &errors),
            )
                .into_response();
        }
    };

    let Some(image) = &form.image else {
        return Error::NotAnImage.into_alert_response();
    };

    let image_path = match save_image(&state.image_dir, image).await {
        Ok(image_path) => image_path,
        Err(error) => {
            tracing::error!("Could not save product image: {error}");
            return error.into_alert_response();
        }
    };

    let result = match state.db_connection.lock() {
        Ok(connection) => create_product(details, &image_path, user.id, &connection),
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            Err(Error::DatabaseLockError)
        }
    };

    match result {
        Ok(product) => {
            tracing::info!("User {} created product {}", user.id, product.id);
            (
                HxRedirect(endpoints::ADMIN_PRODUCTS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a product: {error}");
            delete_image(&state.image_dir, &image_path).await;
            error.into_alert_response()
        }
    }
}

fn add_product_view(csrf_token: &str) -> Markup {
    let nav_bar = NavBar::new(endpoints::ADD_PRODUCT, true).into_html();
    let form = product_form_view(
        endpoints::ADD_PRODUCT,
        None,
        &ProductFormData::default(),
        &ProductFormErrors::default(),
    );

    let content = html! {
        (nav_bar)
        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-4" { "Add Product" }
            (form)
        }
    };

    base("Add Product", csrf_token, &content)
}

#[cfg(test)]
mod create_product_tests {
    use axum::{
        Extension,
        extract::State,
        http::StatusCode,
        response::IntoResponse,
    };
    use tempfile::TempDir;

    use crate::{
        endpoints,
        product::{
            create::{CreateProductState, create_product_endpoint, get_add_product_page},
            db::get_products_page,
        },
        test_utils::{
            assert_form_error_message, assert_form_input, assert_hx_endpoint, assert_hx_redirect,
            assert_valid_html, must_get_form, must_make_product_multipart, parse_html_document,
            parse_html_fragment, test_db_with_user, test_session,
        },
    };

    fn get_state() -> (CreateProductState, crate::auth::User, TempDir) {
        let (db_connection, user) = test_db_with_user();
        let image_dir = TempDir::new().unwrap();

        let state = CreateProductState {
            db_connection,
            image_dir: image_dir.path().to_owned(),
        };

        (state, user, image_dir)
    }

    #[tokio::test]
    async fn render_page() {
        let response = get_add_product_page(Extension(test_session(None))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        assert_hx_endpoint(&form, endpoints::ADD_PRODUCT, "hx-post");
        assert_form_input(&form, "title", "text");
        assert_form_input(&form, "image", "file");
        assert_form_input(&form, "price", "number");
    }

    #[tokio::test]
    async fn can_create_product() {
        let (state, user, image_dir) = get_state();
        let multipart = must_make_product_multipart(
            None,
            "Book",
            "12.99",
            "A good read",
            Some(("book.png", "image/png")),
        )
        .await;

        let response = create_product_endpoint(State(state.clone()), Extension(user.clone()), multipart)
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::ADMIN_PRODUCTS_VIEW);
        let products = get_products_page(10, 0, &state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title, "Book");
        assert_eq!(products[0].price, 12.99);
        assert_eq!(products[0].user_id, user.id);
        assert!(image_dir.path().join(&products[0].image_path).exists());
    }

    #[tokio::test]
    async fn rejects_non_image_upload() {
        let (state, user, _image_dir) = get_state();
        let multipart = must_make_product_multipart(
            None,
            "Book",
            "12.99",
            "A good read",
            Some(("book.pdf", "application/pdf")),
        )
        .await;

        let response = create_product_endpoint(State(state.clone()), Extension(user), multipart)
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        assert_form_error_message(&form, "Attached file is not an image");
        assert!(
            get_products_page(10, 0, &state.db_connection.lock().unwrap())
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn rejects_invalid_price_and_keeps_values() {
        let (state, user, _image_dir) = get_state();
        let multipart = must_make_product_multipart(
            None,
            "Book",
            "abc",
            "A good read",
            Some(("book.png", "image/png")),
        )
        .await;

        let response = create_product_endpoint(State(state), Extension(user), multipart)
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        assert_form_error_message(&form, "Price must be a number");
        crate::test_utils::assert_form_input_with_value(&form, "title", "text", "Book");
    }
}
