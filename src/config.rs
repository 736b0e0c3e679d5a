//! Server configuration read from command line flags and environment variables.

use std::path::PathBuf;

use clap::Parser;

/// The storefront web server.
///
/// Every option can also be set through the environment variable named in
/// its help text. A `.env` file in the working directory is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// File path to the application SQLite database.
    #[arg(long, env = "DATABASE_PATH")]
    pub db_path: PathBuf,

    /// The port to serve the shop from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// The secret used to derive the key that encrypts session cookies.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    pub secret: String,

    /// The canonical timezone order times are shown in, e.g. "Pacific/Auckland".
    #[arg(long, env = "TIMEZONE", default_value = "Etc/UTC")]
    pub timezone: String,

    /// The externally reachable base URL used in emails and payment redirects.
    #[arg(long, env = "PUBLIC_URL", default_value = "http://localhost:3000")]
    pub public_url: String,

    /// The directory uploaded product images are stored in.
    #[arg(long, env = "IMAGE_DIR", default_value = "images")]
    pub image_dir: PathBuf,

    /// The directory generated invoices are written to.
    #[arg(long, env = "INVOICE_DIR", default_value = "data/invoices")]
    pub invoice_dir: PathBuf,

    /// The SMTP relay for password reset emails. Emails are only logged if unset.
    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// The port of the SMTP relay.
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    /// The user name to authenticate with the SMTP relay.
    #[arg(long, env = "SMTP_USERNAME", default_value = "")]
    pub smtp_username: String,

    /// The password to authenticate with the SMTP relay.
    #[arg(long, env = "SMTP_PASSWORD", default_value = "", hide_env_values = true)]
    pub smtp_password: String,

    /// The sender address of outgoing emails.
    #[arg(long, env = "MAIL_FROM", default_value = "Storefront <no-reply@localhost>")]
    pub mail_from: String,

    /// The Stripe API key. Checkout uses an offline processor if unset.
    #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    pub stripe_secret_key: Option<String>,
}

impl Config {
    /// Load `.env` if present, then parse the command line and environment.
    pub fn load() -> Self {
        if let Err(error) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {error}");
        }

        Self::parse()
    }
}

#[cfg(test)]
mod config_tests {
    use clap::Parser;

    use super::Config;

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "server",
            "--db-path",
            "shop.db",
            "--secret",
            "hunter2",
            "--port",
            "8080",
            "--stripe-secret-key",
            "sk_test_123",
        ])
        .unwrap();

        assert_eq!(config.db_path.to_str(), Some("shop.db"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_test_123"));
    }
}
