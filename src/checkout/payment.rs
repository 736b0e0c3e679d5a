//! Hosted checkout sessions with a third-party payment processor.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;

use crate::Error;

const STRIPE_CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";
const CURRENCY: &str = "usd";

/// One line of a checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentLineItem {
    pub name: String,
    pub description: String,
    /// The price of one unit in cents.
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Everything the payment processor needs to create a checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub line_items: Vec<PaymentLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A checkout session created by the payment processor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    /// The hosted page the customer pays on.
    pub url: String,
}

/// Something that can create hosted checkout sessions.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a checkout session for `request`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::PaymentError] if the processor rejects the request or cannot be reached.
    async fn create_checkout_session(&self, request: CheckoutRequest)
    -> Result<PaymentSession, Error>;
}

/// Convert a price in dollars to whole cents.
pub fn to_cents(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// Creates checkout sessions with the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.to_owned(),
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<PaymentSession, Error> {
        let params = stripe_form_params(&request);

        let response = self
            .client
            .post(STRIPE_CHECKOUT_SESSIONS_URL)
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|error| Error::PaymentError(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Stripe rejected checkout session ({status}): {text}");
            return Err(Error::PaymentError(format!(
                "checkout session request failed with status {status}"
            )));
        }

        response
            .json::<PaymentSession>()
            .await
            .map_err(|error| Error::PaymentError(error.to_string()))
    }
}

/// Flatten a checkout request into Stripe's bracketed form encoding.
fn stripe_form_params(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("payment_method_types[0]".to_owned(), "card".to_owned()),
        ("success_url".to_owned(), request.success_url.clone()),
        ("cancel_url".to_owned(), request.cancel_url.clone()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        params.push((
            format!("{prefix}[price_data][currency]"),
            CURRENCY.to_owned(),
        ));
        params.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        params.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        // Stripe rejects empty descriptions.
        if !item.description.is_empty() {
            params.push((
                format!("{prefix}[price_data][product_data][description]"),
                item.description.clone(),
            ));
        }
        params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    params
}

/// A payment processor that never charges anyone.
///
/// The hosted checkout URL points straight at the success URL. Used in tests
/// and when no Stripe key is configured.
#[derive(Debug, Default)]
pub struct OfflinePaymentProcessor {
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl OfflinePaymentProcessor {
    /// The checkout requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CheckoutRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PaymentProcessor for OfflinePaymentProcessor {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<PaymentSession, Error> {
        let session = PaymentSession {
            id: format!("offline_{}", crate::auth::generate_token()),
            url: request.success_url.clone(),
        };

        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }

        Ok(session)
    }
}

#[cfg(test)]
mod payment_tests {
    use super::{CheckoutRequest, PaymentLineItem, stripe_form_params, to_cents};

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            line_items: vec![
                PaymentLineItem {
                    name: "Book".to_owned(),
                    description: "A good read".to_owned(),
                    unit_amount: 1299,
                    quantity: 2,
                },
                PaymentLineItem {
                    name: "Pen".to_owned(),
                    description: String::new(),
                    unit_amount: 150,
                    quantity: 1,
                },
            ],
            success_url: "http://localhost:3000/checkout/success".to_owned(),
            cancel_url: "http://localhost:3000/checkout/cancel".to_owned(),
        }
    }

    #[test]
    fn cents_are_rounded() {
        assert_eq!(to_cents(12.99), 1299);
        assert_eq!(to_cents(0.1 + 0.2), 30);
        assert_eq!(to_cents(0.0), 0);
    }

    #[test]
    fn form_params_use_bracketed_line_items() {
        let params = stripe_form_params(&request());

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1299"));
        assert_eq!(
            get("line_items[0][price_data][product_data][name]"),
            Some("Book")
        );
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("line_items[1][price_data][unit_amount]"), Some("150"));
        assert_eq!(
            get("success_url"),
            Some("http://localhost:3000/checkout/success")
        );
    }

    #[test]
    fn empty_description_is_omitted() {
        let params = stripe_form_params(&request());

        assert!(
            !params
                .iter()
                .any(|(k, _)| k == "line_items[1][price_data][product_data][description]")
        );
    }
}
