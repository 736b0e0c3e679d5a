//! The shopping cart of a logged in user.

mod db;
mod domain;
mod page;

pub use db::{CartLine, cart_total, clear_cart, create_cart_table, get_cart, get_cart_lines, save_cart};
pub use domain::{Cart, CartItem};
pub use page::{add_to_cart_endpoint, delete_cart_item_endpoint, get_cart_page};
