//! The cart as an ordered list of product lines.

use crate::product::ProductId;

/// A single line in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's cart. Each product appears at most once, in the order it was first added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Add one unit of `product_id`, incrementing the quantity if it is already in the cart.
    pub fn add_product(&mut self, product_id: ProductId) {
        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            Some(item) => item.quantity += 1,
            None => self.items.push(CartItem {
                product_id,
                quantity: 1,
            }),
        }
    }

    /// Remove the line for `product_id`, if there is one.
    pub fn remove_product(&mut self, product_id: ProductId) {
        self.items.retain(|item| item.product_id != product_id);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
