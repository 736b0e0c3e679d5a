//! Middleware for logging requests and responses.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, header::CONTENT_TYPE},
    middleware::Next,
    response::Response,
};

/// Form fields whose values must never reach the logs.
const REDACTED_FIELDS: [&str; 2] = ["password", "confirm_password"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and logged in full at the `debug` level.
///
/// Only text bodies are logged: multipart uploads and binary responses such
/// as PDF invoices are passed through untouched.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let request = if is_loggable(&parts.headers) {
        let body_text = match body_to_text(body).await {
            Ok(body_text) => body_text,
            Err(error) => {
                tracing::error!("Could not read request body: {error}");
                String::new()
            }
        };

        let is_form = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        let display_text = if is_form {
            REDACTED_FIELDS
                .iter()
                .fold(body_text.clone(), |text, field| redact_field(&text, field))
        } else {
            body_text.clone()
        };
        log_request(&parts, &display_text);

        Request::from_parts(parts, body_text.into())
    } else {
        log_request(&parts, "<binary>");
        Request::from_parts(parts, body)
    };

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();

    if !is_loggable(&parts.headers) {
        log_response(&parts, "<binary>");
        return Response::from_parts(parts, body);
    }

    let body_text = match body_to_text(body).await {
        Ok(body_text) => body_text,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            String::new()
        }
    };
    log_response(&parts, &body_text);

    Response::from_parts(parts, body_text.into())
}

fn is_loggable(headers: &HeaderMap) -> bool {
    match headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()) {
        None => true,
        Some(content_type) => {
            content_type.starts_with("text/")
                || content_type.starts_with("application/json")
                || content_type.starts_with("application/x-www-form-urlencoded")
        }
    }
}

fn redact_field(form_text: &str, field_name: &str) -> String {
    form_text
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key == field_name => format!("{field_name}=********"),
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

async fn body_to_text(body: Body) -> Result<String, axum::Error> {
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await?;

    Ok(String::from_utf8_lossy(&body_bytes).to_string())
}

/// The number of bytes of a request or response body to log at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

fn truncate(body: &str) -> &str {
    let mut end = LOG_BODY_LENGTH_LIMIT.min(body.len());
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    &body[..end]
}

fn log_request(headers: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {headers:#?}\nbody: {:}...",
            truncate(body)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!("Received request: {headers:#?}\nbody: {body:?}");
    }
}

fn log_response(headers: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {headers:#?}\nbody: {:}...",
            truncate(body)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {headers:#?}\nbody: {body:?}");
    }
}
