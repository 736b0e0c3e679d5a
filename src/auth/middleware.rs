//! Authentication middleware that requires a logged in session and handles redirects.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_htmx::HxRedirect;

use crate::{
    auth::redirect::{build_log_in_redirect_url, build_log_in_redirect_url_from_target},
    endpoints,
    session::CurrentSession,
};

/// Checks that the session attached by the session middleware belongs to a logged in user.
/// The user is placed into the request and then the request executed normally if so, otherwise a redirect to the log-in page is returned using `get_redirect`.
#[inline]
async fn auth_guard_internal(
    mut request: Request,
    next: Next,
    get_redirect: impl Fn(&str) -> Response,
) -> Response {
    let user = request
        .extensions()
        .get::<CurrentSession>()
        .and_then(|session| session.user.clone());

    let Some(user) = user else {
        let log_in_redirect_url = build_log_in_redirect_url(&request).unwrap_or_else(|| {
            tracing::warn!("Invalid redirect URL from request. Falling back to the shop.");

            build_log_in_redirect_url_from_target(endpoints::ROOT)
                .unwrap_or_else(|| endpoints::LOG_IN.to_owned())
        });

        return get_redirect(&log_in_redirect_url);
    };

    request.extensions_mut().insert(user);

    next.run(request).await
}

/// Middleware function that requires a logged in user.
/// The user is placed into the request and then the request executed normally if the session is logged in, otherwise a redirect to the log-in page is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user): Extension<User>` to receive the user.
///
/// **Note**: Must run inside [crate::session::session_middleware].
pub async fn auth_guard(request: Request, next: Next) -> Response {
    auth_guard_internal(request, next, |redirect_url| {
        Redirect::to(redirect_url).into_response()
    })
    .await
}

/// Middleware function that requires a logged in user.
/// The user is placed into the request and then the request executed normally if the session is logged in, otherwise a HTMX redirect to the log-in page is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user): Extension<User>` to receive the user.
///
/// **Note**: Must run inside [crate::session::session_middleware].
pub async fn auth_guard_hx(request: Request, next: Next) -> Response {
    auth_guard_internal(request, next, |redirect_url| {
        (HxRedirect(redirect_url.to_owned()), StatusCode::OK).into_response()
    })
    .await
}
