//! Outgoing email for password reset links.

#[cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use maud::html;

use crate::{Error, auth::Email};

/// An email ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: Email,
    pub subject: String,
    pub html_body: String,
}

/// Something that can deliver emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `email`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::MailError] if the email could not be built or delivered.
    async fn send(&self, email: OutgoingEmail) -> Result<(), Error>;
}

/// Sends email through an SMTP relay using STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a mailer for the relay at `host`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::MailError] if the relay address is invalid.
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        from_address: &str,
    ) -> Result<Self, Error> {
        let credentials = Credentials::new(username.to_owned(), password.to_owned());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|error| Error::MailError(error.to_string()))?
            .port(port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: from_address.to_owned(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), Error> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| Error::MailError(format!("invalid from address {}", self.from_address)))?,
            )
            .to(email
                .to
                .as_ref()
                .parse()
                .map_err(|_| Error::MailError(format!("invalid to address {}", email.to)))?)
            .subject(&email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(|error| Error::MailError(error.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|error| Error::MailError(error.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// A mailer that writes emails to the log instead of sending them.
///
/// Used when no SMTP relay is configured. The body, including any reset link,
/// is only logged at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), Error> {
        tracing::info!(to = %email.to, subject = %email.subject, "Logged email, not sent");
        tracing::debug!(to = %email.to, body = %email.html_body, "Logged email body");

        Ok(())
    }
}

/// A mailer that keeps every email in memory instead of sending it.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[cfg(test)]
impl RecordingMailer {
    /// The emails sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), Error> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(email),
            Err(poisoned) => poisoned.into_inner().push(email),
        }

        Ok(())
    }
}

/// Build the email that carries a password reset link.
pub fn password_reset_email(to: Email, public_url: &str, token: &str) -> OutgoingEmail {
    let reset_url = format!("{}/reset/{token}", public_url.trim_end_matches('/'));
    let body = html! {
        p { "A password reset of your email account was requested" }
        p { "To reset password, click in this " a href=(reset_url) { "link" } }
    };

    OutgoingEmail {
        to,
        subject: "Password Reset".to_owned(),
        html_body: body.into_string(),
    }
}

#[cfg(test)]
mod mail_tests {
    use crate::{
        auth::Email,
        mail::{LogMailer, Mailer, RecordingMailer, password_reset_email},
    };

    #[test]
    fn reset_email_links_to_token() {
        let email = password_reset_email(
            Email::new_unchecked("foo@bar.baz"),
            "http://localhost:3000/",
            "abc123",
        );

        assert_eq!(email.subject, "Password Reset");
        assert!(
            email
                .html_body
                .contains(r#"href="http://localhost:3000/reset/abc123""#),
            "got body {}",
            email.html_body
        );
    }

    #[tokio::test]
    async fn recording_mailer_keeps_sent_emails() {
        let mailer = RecordingMailer::default();
        let email = password_reset_email(Email::new_unchecked("foo@bar.baz"), "", "abc");

        mailer.send(email.clone()).await.unwrap();

        assert_eq!(mailer.sent(), vec![email]);
    }

    #[tokio::test]
    async fn log_mailer_sends_without_a_relay() {
        let email = password_reset_email(Email::new_unchecked("foo@bar.baz"), "", "abc");

        assert_eq!(LogMailer.send(email).await, Ok(()));
    }
}
