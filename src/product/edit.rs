//! Product editing page and endpoint.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::User,
    endpoints,
    html::{FORM_CONTAINER_STYLE, base},
    navigation::NavBar,
    product::{
        Product, ProductFormData, ProductFormErrors, ProductId,
        db::{get_product, update_product},
        form::{parse_product_form, product_form_view},
        image::{delete_image, save_image},
    },
    session::CurrentSession,
};

/// The state needed for editing a product.
#[derive(Debug, Clone)]
pub struct EditProductState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub image_dir: PathBuf,
}

impl FromRef<AppState> for EditProductState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            image_dir: state.image_dir.clone(),
        }
    }
}

/// The query string for the edit page. The page is only shown with `edit=true`.
#[derive(Debug, Default, Deserialize)]
pub struct EditQuery {
    pub edit: Option<String>,
}

/// Render the edit page for a product owned by the current user.
///
/// Redirects to the shop front page if the edit flag is missing, the product
/// does not exist or the product belongs to another user.
pub async fn get_edit_product_page(
    State(state): State<EditProductState>,
    Extension(session): Extension<CurrentSession>,
    Extension(user): Extension<User>,
    Path(product_id): Path<ProductId>,
    Query(query): Query<EditQuery>,
) -> Response {
    if query.edit.as_deref() != Some("true") {
        return Redirect::to(endpoints::ROOT).into_response();
    }

    let product = match state.db_connection.lock() {
        Ok(connection) => get_product(product_id, &connection),
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match product {
        Ok(product) if product.is_owned_by(user.id) => {
            edit_product_view(&product, &session.csrf_token).into_response()
        }
        Ok(product) => {
            tracing::warn!(
                "User {} tried to edit product {} owned by user {}",
                user.id,
                product.id,
                product.user_id
            );
            Redirect::to(endpoints::ROOT).into_response()
        }
        Err(Error::NotFound) => Redirect::to(endpoints::ROOT).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Handle the product edit form submission.
///
/// A new image replaces the stored one, which is then deleted from disk.
pub async fn update_product_endpoint(
    State(state): State<EditProductState>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Response {
    let form = match parse_product_form(multipart).await {
        Ok(form) => form,
        Err(error) => return error.into_alert_response(),
    };

    let Some(product_id) = form
        .product_id
        .as_deref()
        .and_then(|id| id.trim().parse::<ProductId>().ok())
    else {
        return Error::UpdateMissingProduct.into_alert_response();
    };

    let product = match state.db_connection.lock() {
        Ok(connection) => get_product(product_id, &connection),
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let product = match product {
        Ok(product) => product,
        Err(Error::NotFound) => return Error::UpdateMissingProduct.into_alert_response(),
        Err(error) => return error.into_alert_response(),
    };

    if !product.is_owned_by(user.id) {
        tracing::warn!(
            "User {} tried to update product {} owned by user {}",
            user.id,
            product.id,
            product.user_id
        );
        return (HxRedirect(endpoints::ROOT.to_owned()), StatusCode::SEE_OTHER).into_response();
    }

    let details = match form.validate(false) {
        Ok(details) => details,
        Err(errors) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                product_form_view(endpoints::EDIT_PRODUCT, Some(product.id), &form, &errors),
            )
                .into_response();
        }
    };

    let new_image_path = match &form.image {
        Some(image) => match save_image(&state.image_dir, image).await {
            Ok(image_path) => Some(image_path),
            Err(error) => {
                tracing::error!("Could not save product image: {error}");
                return error.into_alert_response();
            }
        },
        None => None,
    };

    let result = match state.db_connection.lock() {
        Ok(connection) => update_product(
            product.id,
            &details,
            new_image_path.as_deref(),
            &connection,
        ),
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            Err(Error::DatabaseLockError)
        }
    };

    match (result, new_image_path) {
        (Ok(()), Some(_)) => delete_image(&state.image_dir, &product.image_path).await,
        (Ok(()), None) => {}
        (Err(error), new_image_path) => {
            tracing::error!("Could not update product {}: {error}", product.id);
            if let Some(new_image_path) = new_image_path {
                delete_image(&state.image_dir, &new_image_path).await;
            }
            return error.into_alert_response();
        }
    }

    (
        HxRedirect(endpoints::ADMIN_PRODUCTS_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

fn edit_product_view(product: &Product, csrf_token: &str) -> Markup {
    let values = ProductFormData {
        product_id: Some(product.id.to_string()),
        title: product.title.clone(),
        price: product.price.to_string(),
        description: product.description.clone(),
        image: None,
    };
    let form = product_form_view(
        endpoints::EDIT_PRODUCT,
        Some(product.id),
        &values,
        &ProductFormErrors::default(),
    );

    let content = html! {
        (NavBar::new(endpoints::ADMIN_PRODUCTS_VIEW, true).into_html())
        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-4" { "Edit Product" }
            img src=(product.image_url()) alt=(product.title) class="max-w-xs rounded mb-4";
            (form)
        }
    };

    base("Edit Product", csrf_token, &content)
}
