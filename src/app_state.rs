//! Implements a struct that holds the state of the web server.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error, checkout::PaymentProcessor, db::initialize, mail::Mailer,
    pagination::PaginationConfig, session::DEFAULT_SESSION_DURATION,
};

/// The state of the web server.
#[derive(Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// How long a session lasts after it is created.
    pub session_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The config that controls how to display pages of products.
    pub pagination_config: PaginationConfig,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// Where uploaded product images are stored.
    pub image_dir: PathBuf,

    /// Where generated invoices are written.
    pub invoice_dir: PathBuf,

    /// The externally reachable base URL, e.g. "https://shop.example.com".
    pub public_url: String,

    /// Delivers password reset emails.
    pub mailer: Arc<dyn Mailer>,

    /// Creates hosted checkout sessions.
    pub payment_processor: Arc<dyn PaymentProcessor>,
}

/// The parts of [AppState] that come from configuration rather than services.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct AppSettings {
    /// The secret the cookie key is derived from.
    pub cookie_secret: String,
    pub local_timezone: String,
    pub pagination_config: PaginationConfig,
    pub image_dir: PathBuf,
    pub invoice_dir: PathBuf,
    pub public_url: String,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        settings: AppSettings,
        mailer: Arc<dyn Mailer>,
        payment_processor: Arc<dyn PaymentProcessor>,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(&settings.cookie_secret),
            session_duration: DEFAULT_SESSION_DURATION,
            local_timezone: settings.local_timezone,
            pagination_config: settings.pagination_config,
            db_connection: Arc::new(Mutex::new(db_connection)),
            image_dir: settings.image_dir,
            invoice_dir: settings.invoice_dir,
            public_url: settings.public_url,
            mailer,
            payment_processor,
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
