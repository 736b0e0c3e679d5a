use std::sync::{Arc, Mutex};

use axum::extract::{FromRequest, Multipart, Request};
use rusqlite::Connection;

use crate::{
    auth::{Email, PasswordHash, User, ValidatedPassword, create_user},
    db::initialize,
    endpoints,
    session::{CurrentSession, SessionId},
};

pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// Insert a user with [TEST_PASSWORD] as their password.
///
/// Uses the lowest bcrypt cost to keep tests fast.
pub(crate) fn create_test_user(email: &str, connection: &Connection) -> User {
    let password_hash =
        PasswordHash::new(ValidatedPassword::new_unchecked(TEST_PASSWORD), 4).unwrap();

    create_user(Email::new(email).unwrap(), password_hash, connection).unwrap()
}

/// An initialized in-memory database with one user, "test@example.com".
pub(crate) fn test_db_with_user() -> (Arc<Mutex<Connection>>, User) {
    let connection = Connection::open_in_memory().unwrap();
    initialize(&connection).unwrap();
    let user = create_test_user("test@example.com", &connection);

    (Arc::new(Mutex::new(connection)), user)
}

/// A session that is not stored in the database.
pub(crate) fn test_session(user: Option<User>) -> CurrentSession {
    CurrentSession {
        id: SessionId::new("test-session"),
        csrf_token: "test-csrf-token".to_owned(),
        user,
    }
}

/// Build the multipart body the product form sends.
///
/// `image` is a file name and content type, the file content is a few
/// placeholder bytes.
pub(crate) async fn must_make_product_multipart(
    product_id: Option<&str>,
    title: &str,
    price: &str,
    description: &str,
    image: Option<(&str, &str)>,
) -> Multipart {
    let boundary = "MY_BOUNDARY123456789";
    let boundary_start = format!("--{boundary}");
    let boundary_end = format!("--{boundary}--");

    let mut lines: Vec<String> = Vec::new();

    let mut text_fields = vec![("title", title), ("price", price), ("description", description)];
    if let Some(product_id) = product_id {
        text_fields.insert(0, ("product_id", product_id));
    }

    for (name, value) in text_fields {
        lines.push(boundary_start.clone());
        lines.push(format!("Content-Disposition: form-data; name=\"{name}\""));
        lines.push("".to_owned());
        lines.push(value.to_owned());
    }

    if let Some((file_name, content_type)) = image {
        lines.push(boundary_start.clone());
        lines.push(format!(
            "Content-Disposition: form-data; name=\"image\"; filename=\"{file_name}\""
        ));
        lines.push(format!("Content-Type: {content_type}"));
        lines.push("".to_owned());
        lines.push("not really an image".to_owned());
    }

    lines.push(boundary_end);

    let data = lines.join("\r\n").into_bytes();

    let request = Request::builder()
        .method("POST")
        .uri(endpoints::ADD_PRODUCT)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(data.into())
        .unwrap();

    Multipart::from_request(request, &{}).await.unwrap()
}
