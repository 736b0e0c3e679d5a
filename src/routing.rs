//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{
        auth_guard, auth_guard_hx, get_log_in_page, get_new_password_page, get_reset_page,
        get_sign_up_page, post_log_in, post_log_out, post_reset, post_reset_password,
        post_sign_up,
    },
    cart::{add_to_cart_endpoint, delete_cart_item_endpoint, get_cart_page},
    checkout::{get_checkout_cancel_page, get_checkout_page, get_checkout_success},
    endpoints,
    internal_server_error::get_internal_server_error_page,
    not_found::get_404_not_found,
    order::{get_invoice, get_orders_page},
    product::{
        create_product_endpoint, delete_product_endpoint, get_add_product_page,
        get_admin_products_page, get_all_products_page, get_edit_product_page, get_index_page,
        get_product_page, update_product_endpoint,
    },
    session::session_middleware,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::PRODUCTS_VIEW, get(get_all_products_page))
        .route(endpoints::PRODUCT_VIEW, get(get_product_page))
        .route(endpoints::LOG_IN, get(get_log_in_page).post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out))
        .route(endpoints::SIGN_UP, get(get_sign_up_page).post(post_sign_up))
        .route(endpoints::RESET, get(get_reset_page).post(post_reset))
        .route(endpoints::NEW_PASSWORD_VIEW, get(get_new_password_page))
        .route(endpoints::RESET_PASSWORD, post(post_reset_password))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let protected_routes = Router::new()
        .route(endpoints::CART, get(get_cart_page))
        .route(endpoints::CHECKOUT_VIEW, get(get_checkout_page))
        .route(endpoints::CHECKOUT_SUCCESS, get(get_checkout_success))
        .route(endpoints::CHECKOUT_CANCEL, get(get_checkout_cancel_page))
        .route(endpoints::ORDERS_VIEW, get(get_orders_page))
        .route(endpoints::INVOICE, get(get_invoice))
        .route(endpoints::ADD_PRODUCT, get(get_add_product_page))
        .route(endpoints::EDIT_PRODUCT_VIEW, get(get_edit_product_page))
        .route(endpoints::ADMIN_PRODUCTS_VIEW, get(get_admin_products_page))
        .layer(middleware::from_fn(auth_guard));

    // These POST/DELETE routes need to use the HX-REDIRECT header for auth redirects to work properly for HTMX requests.
    let protected_routes = protected_routes.merge(
        Router::new()
            .route(endpoints::CART, post(add_to_cart_endpoint))
            .route(endpoints::CART_DELETE_ITEM, post(delete_cart_item_endpoint))
            .route(endpoints::ADD_PRODUCT, post(create_product_endpoint))
            .route(endpoints::EDIT_PRODUCT, post(update_product_endpoint))
            .route(endpoints::DELETE_PRODUCT, delete(delete_product_endpoint))
            .layer(middleware::from_fn(auth_guard_hx)),
    );

    let image_dir = state.image_dir.clone();

    protected_routes
        .merge(unprotected_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .nest_service(endpoints::IMAGES, ServeDir::new(image_dir))
        .fallback(get_404_not_found)
        .with_state(state)
}

#[cfg(test)]
mod routing_tests {
    use std::sync::Arc;

    use axum::http::{HeaderName, HeaderValue, StatusCode, header::LOCATION};
    use axum_extra::extract::cookie::Cookie;
    use axum_test::{TestResponse, TestServer};
    use rusqlite::Connection;
    use scraper::{Html, Selector};
    use tempfile::TempDir;

    use crate::{
        AppState,
        app_state::AppSettings,
        checkout::OfflinePaymentProcessor,
        endpoints,
        mail::RecordingMailer,
        pagination::PaginationConfig,
        session::{COOKIE_SESSION_ID, CSRF_HEADER},
        test_utils::{TEST_PASSWORD, create_test_user},
    };

    use super::build_router;

    struct Fixture {
        server: TestServer,
        _image_dir: TempDir,
        _invoice_dir: TempDir,
    }

    fn fixture() -> Fixture {
        let image_dir = TempDir::new().unwrap();
        let invoice_dir = TempDir::new().unwrap();

        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            AppSettings {
                cookie_secret: "foobar".to_owned(),
                local_timezone: "Etc/UTC".to_owned(),
                pagination_config: PaginationConfig::default(),
                image_dir: image_dir.path().to_owned(),
                invoice_dir: invoice_dir.path().to_owned(),
                public_url: "http://localhost:3000".to_owned(),
            },
            Arc::new(RecordingMailer::default()),
            Arc::new(OfflinePaymentProcessor::default()),
        )
        .unwrap();

        create_test_user("test@example.com", &state.db_connection.lock().unwrap());

        Fixture {
            server: TestServer::try_new(build_router(state)).expect("Could not create test server."),
            _image_dir: image_dir,
            _invoice_dir: invoice_dir,
        }
    }

    /// The session cookie and the CSRF token embedded in the page.
    fn session_from_page(response: &TestResponse) -> (Cookie<'static>, String) {
        let cookie = response.cookie(COOKIE_SESSION_ID);
        let html = Html::parse_document(&response.text());
        let hx_headers = html
            .select(&Selector::parse("body").unwrap())
            .next()
            .unwrap()
            .value()
            .attr("hx-headers")
            .expect("missing hx-headers on body")
            .to_owned();
        let headers: serde_json::Value = serde_json::from_str(&hx_headers).unwrap();
        let csrf_token = headers[CSRF_HEADER].as_str().unwrap().to_owned();

        (cookie, csrf_token)
    }

    fn csrf_header(csrf_token: &str) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static(CSRF_HEADER),
            HeaderValue::from_str(csrf_token).unwrap(),
        )
    }

    #[tokio::test]
    async fn shop_is_public_and_starts_a_session() {
        let fixture = fixture();

        let response = fixture.server.get(endpoints::ROOT).await;

        response.assert_status_ok();
        let (_, csrf_token) = session_from_page(&response);
        assert_eq!(csrf_token.len(), 64);
    }

    #[tokio::test]
    async fn protected_page_redirects_to_log_in() {
        let fixture = fixture();

        let response = fixture.server.get(endpoints::CART).await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(
            response.header(LOCATION),
            "/login?redirect_url=%2Fcart"
        );
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let fixture = fixture();

        fixture
            .server
            .get("/definitely/not/a/page")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn post_without_csrf_token_is_rejected() {
        let fixture = fixture();
        let page = fixture.server.get(endpoints::LOG_IN).await;
        let (cookie, _) = session_from_page(&page);

        let response = fixture
            .server
            .post(endpoints::LOG_IN)
            .add_cookie(cookie)
            .form(&[("email", "test@example.com"), ("password", TEST_PASSWORD)])
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn post_with_wrong_csrf_token_is_rejected() {
        let fixture = fixture();
        let page = fixture.server.get(endpoints::LOG_IN).await;
        let (cookie, _) = session_from_page(&page);
        let (name, value) = csrf_header("not-the-token");

        let response = fixture
            .server
            .post(endpoints::LOG_IN)
            .add_cookie(cookie)
            .add_header(name, value)
            .form(&[("email", "test@example.com"), ("password", TEST_PASSWORD)])
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn log_in_with_csrf_token_grants_access_to_cart() {
        let fixture = fixture();
        let page = fixture.server.get(endpoints::LOG_IN).await;
        let (cookie, csrf_token) = session_from_page(&page);
        let (name, value) = csrf_header(&csrf_token);

        let response = fixture
            .server
            .post(endpoints::LOG_IN)
            .add_cookie(cookie)
            .add_header(name, value)
            .form(&[("email", "test@example.com"), ("password", TEST_PASSWORD)])
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("hx-redirect"), endpoints::ROOT);
        let logged_in_cookie = response.cookie(COOKIE_SESSION_ID);

        fixture
            .server
            .get(endpoints::CART)
            .add_cookie(logged_in_cookie)
            .await
            .assert_status_ok();
    }
}
