//! Products: the public catalog and the pages for managing your own products.

mod admin_list;
mod create;
mod db;
mod delete;
mod domain;
mod edit;
mod form;
mod image;
mod shop;

pub use admin_list::get_admin_products_page;
pub use create::{create_product_endpoint, get_add_product_page};
pub use db::{create_product, create_product_table, get_product};
pub use delete::delete_product_endpoint;
pub use domain::{Product, ProductDetails, ProductFormData, ProductFormErrors, ProductId, UploadedImage};
pub use edit::{get_edit_product_page, update_product_endpoint};
pub use shop::{get_all_products_page, get_index_page, get_product_page};
