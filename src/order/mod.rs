//! Completed orders and their invoices.

mod db;
mod invoice;
mod page;

pub use db::{Order, OrderId, OrderItem, create_order, create_order_tables};
pub use page::{get_invoice, get_orders_page};
