//! Paying for the cart through a hosted checkout page.

mod page;
mod payment;

pub use page::{get_checkout_cancel_page, get_checkout_page, get_checkout_success};
pub use payment::{OfflinePaymentProcessor, PaymentProcessor, StripeClient};
