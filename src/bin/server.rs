use std::{
    fs::OpenOptions,
    net::SocketAddr,
    process::exit,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use rusqlite::Connection;
use time::OffsetDateTime;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use storefront::{
    AppSettings, AppState, Config, LogMailer, Mailer, OfflinePaymentProcessor, PaginationConfig,
    PaymentProcessor, SmtpMailer, StripeClient, build_router, delete_expired_sessions,
    graceful_shutdown, logging_middleware,
};

/// How often expired sessions are purged from the database.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    let config = Config::load();
    setup_logging();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    for dir in [&config.image_dir, &config.invoice_dir] {
        if let Err(error) = std::fs::create_dir_all(dir) {
            tracing::error!("Could not create directory {dir:?}: {error}");
            exit(1);
        }
    }

    let connection = Connection::open(&config.db_path).unwrap_or_else(|error| {
        tracing::error!("Could not open database file at {:?}: {error}", config.db_path);
        exit(1);
    });

    let state = AppState::new(
        connection,
        AppSettings {
            cookie_secret: config.secret.clone(),
            local_timezone: config.timezone.clone(),
            pagination_config: PaginationConfig::default(),
            image_dir: config.image_dir.clone(),
            invoice_dir: config.invoice_dir.clone(),
            public_url: config.public_url.clone(),
        },
        create_mailer(&config),
        create_payment_processor(&config),
    )
    .unwrap_or_else(|error| {
        tracing::error!("Could not initialize the database: {error}");
        exit(1);
    });

    tokio::spawn(clean_up_sessions(state.db_connection.clone()));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state).layer(middleware::from_fn(logging_middleware)),
    );

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    tracing::info!("HTTP server listening on {}", addr);
    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server stopped with an error: {error}");
        exit(1);
    }
}

fn create_mailer(config: &Config) -> Arc<dyn Mailer> {
    let Some(host) = &config.smtp_host else {
        tracing::warn!("SMTP_HOST is not set, password reset emails will only be logged");
        return Arc::new(LogMailer);
    };

    match SmtpMailer::new(
        host,
        config.smtp_port,
        &config.smtp_username,
        &config.smtp_password,
        &config.mail_from,
    ) {
        Ok(mailer) => Arc::new(mailer),
        Err(error) => {
            tracing::error!("Could not configure SMTP relay {host}: {error}");
            exit(1);
        }
    }
}

fn create_payment_processor(config: &Config) -> Arc<dyn PaymentProcessor> {
    match &config.stripe_secret_key {
        Some(secret_key) => Arc::new(StripeClient::new(secret_key)),
        None => {
            tracing::warn!(
                "STRIPE_SECRET_KEY is not set, checkout will skip payment and go straight to the success page"
            );
            Arc::new(OfflinePaymentProcessor::default())
        }
    }
}

async fn clean_up_sessions(db_connection: Arc<Mutex<Connection>>) {
    let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);

    loop {
        interval.tick().await;

        let result = match db_connection.lock() {
            Ok(connection) => delete_expired_sessions(OffsetDateTime::now_utc(), &connection),
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                continue;
            }
        };

        match result {
            Ok(count) => tracing::debug!("Deleted {count} expired sessions"),
            Err(error) => tracing::error!("Could not delete expired sessions: {error}"),
        }
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
    {
        Ok(log_file) => log_file,
        Err(error) => {
            eprintln!("Could not create log file: {error}");
            exit(1);
        }
    };

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
