//! The JSON endpoint for deleting a product.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    auth::User,
    product::{
        ProductId,
        db::{delete_product, get_product},
        image::delete_image,
    },
};

/// The state needed for deleting a product.
#[derive(Debug, Clone)]
pub struct DeleteProductState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub image_dir: PathBuf,
}

impl FromRef<AppState> for DeleteProductState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            image_dir: state.image_dir.clone(),
        }
    }
}

/// The body of every delete product response.
#[derive(Debug, Serialize)]
pub struct DeleteProductResponse {
    pub message: &'static str,
}

fn json_response(status_code: StatusCode, message: &'static str) -> Response {
    (status_code, Json(DeleteProductResponse { message })).into_response()
}

/// Delete a product owned by the current user along with its image.
///
/// Lines for the product are removed from every cart. Past orders keep their
/// copy of the product.
pub async fn delete_product_endpoint(
    State(state): State<DeleteProductState>,
    Extension(user): Extension<User>,
    Path(product_id): Path<ProductId>,
) -> Response {
    let result = match state.db_connection.lock() {
        Ok(connection) => get_product(product_id, &connection).and_then(|product| {
            if !product.is_owned_by(user.id) {
                return Err(Error::NotOwner);
            }

            delete_product(product.id, &connection)?;
            Ok(product)
        }),
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            Err(Error::DatabaseLockError)
        }
    };

    match result {
        Ok(product) => {
            tracing::info!("User {} deleted product {}", user.id, product.id);
            delete_image(&state.image_dir, &product.image_path).await;
            json_response(StatusCode::OK, "Success")
        }
        Err(Error::NotFound | Error::DeleteMissingProduct) => {
            json_response(StatusCode::NOT_FOUND, "Product not found")
        }
        Err(Error::NotOwner) => {
            tracing::warn!("User {} tried to delete product {product_id}", user.id);
            json_response(StatusCode::FORBIDDEN, "Unauthorized user")
        }
        Err(error) => {
            tracing::error!("Could not delete product {product_id}: {error}");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, "An error has occurred")
        }
    }
}

#[cfg(test)]
mod delete_product_tests {
    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
        response::Response,
    };
    use serde_json::Value;
    use tempfile::TempDir;

    use crate::{
        Error,
        cart::{Cart, get_cart, save_cart},
        product::{
            ProductDetails,
            db::{create_product, get_product},
            delete::{DeleteProductState, delete_product_endpoint},
        },
        test_utils::{create_test_user, test_db_with_user},
    };

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn details() -> ProductDetails {
        ProductDetails {
            title: "Book".to_owned(),
            price: 1.0,
            description: "desc".to_owned(),
        }
    }

    #[tokio::test]
    async fn owner_can_delete_product_and_image() {
        let (db_connection, user) = test_db_with_user();
        let image_dir = TempDir::new().unwrap();
        std::fs::write(image_dir.path().join("1-book.png"), [1]).unwrap();
        let product = {
            let connection = db_connection.lock().unwrap();
            let product = create_product(details(), "1-book.png", user.id, &connection).unwrap();
            let mut cart = Cart::default();
            cart.add_product(product.id);
            save_cart(user.id, &cart, &connection).unwrap();
            product
        };
        let user_id = user.id;
        let state = DeleteProductState {
            db_connection: db_connection.clone(),
            image_dir: image_dir.path().to_owned(),
        };

        let response = delete_product_endpoint(State(state), Extension(user), Path(product.id)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "Success");
        let connection = db_connection.lock().unwrap();
        assert_eq!(get_product(product.id, &connection), Err(Error::NotFound));
        assert!(get_cart(user_id, &connection).unwrap().is_empty());
        assert!(!image_dir.path().join("1-book.png").exists());
    }

    #[tokio::test]
    async fn other_user_is_forbidden() {
        let (db_connection, user) = test_db_with_user();
        let image_dir = TempDir::new().unwrap();
        let (product, other) = {
            let connection = db_connection.lock().unwrap();
            let product = create_product(details(), "1-book.png", user.id, &connection).unwrap();
            (product, create_test_user("other@example.com", &connection))
        };
        let state = DeleteProductState {
            db_connection: db_connection.clone(),
            image_dir: image_dir.path().to_owned(),
        };

        let response = delete_product_endpoint(State(state), Extension(other), Path(product.id)).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["message"], "Unauthorized user");
        assert!(get_product(product.id, &db_connection.lock().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (db_connection, user) = test_db_with_user();
        let image_dir = TempDir::new().unwrap();
        let state = DeleteProductState {
            db_connection,
            image_dir: image_dir.path().to_owned(),
        };

        let response = delete_product_endpoint(State(state), Extension(user), Path(42)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["message"], "Product not found");
    }
}
