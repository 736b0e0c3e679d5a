//! The route URIs.
//!
//! For endpoints that take a parameter, e.g., '/products/{product_id}', use [format_endpoint].

use std::fmt::Display;

/// The shop's landing page, listing products.
pub const ROOT: &str = "/";
/// The page listing all products.
pub const PRODUCTS_VIEW: &str = "/products";
/// The page for a single product.
pub const PRODUCT_VIEW: &str = "/products/{product_id}";
/// The cart page, and the route for adding a product to the cart.
pub const CART: &str = "/cart";
/// The route for removing a product from the cart.
pub const CART_DELETE_ITEM: &str = "/cart-delete-item";
/// The checkout page.
pub const CHECKOUT_VIEW: &str = "/checkout";
/// The page the payment processor redirects to after a successful payment.
pub const CHECKOUT_SUCCESS: &str = "/checkout/success";
/// The page the payment processor redirects to after a cancelled payment.
pub const CHECKOUT_CANCEL: &str = "/checkout/cancel";
/// The page listing the user's orders.
pub const ORDERS_VIEW: &str = "/orders";
/// The route for downloading an order's invoice.
pub const INVOICE: &str = "/orders/{order_id}";
/// The page for creating a product, and the route the form posts to.
pub const ADD_PRODUCT: &str = "/admin/add-product";
/// The page for editing a product.
pub const EDIT_PRODUCT_VIEW: &str = "/admin/edit-product/{product_id}";
/// The route the edit product form posts to.
pub const EDIT_PRODUCT: &str = "/admin/edit-product";
/// The page listing the user's own products.
pub const ADMIN_PRODUCTS_VIEW: &str = "/admin/products";
/// The route for deleting a product.
pub const DELETE_PRODUCT: &str = "/admin/product/{product_id}";
/// The log-in page, and the route the log-in form posts to.
pub const LOG_IN: &str = "/login";
/// The route for logging out the current user.
pub const LOG_OUT: &str = "/logout";
/// The sign-up page, and the route the sign-up form posts to.
pub const SIGN_UP: &str = "/signup";
/// The page for requesting a password reset email, and the route its form posts to.
pub const RESET: &str = "/reset";
/// The page linked to from a password reset email.
pub const NEW_PASSWORD_VIEW: &str = "/reset/{token}";
/// The route the new password form posts to.
pub const RESET_PASSWORD: &str = "/reset-password";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for uploaded product images.
pub const IMAGES: &str = "/images";
/// The route for static files.
pub const STATIC: &str = "/static";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/products/{product_id}', '{product_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: impl Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
