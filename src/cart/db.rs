//! Loading and saving carts.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    auth::UserID,
    cart::{Cart, CartItem},
    product::Product,
};

/// A cart line joined with the product it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

/// The sum of price times quantity over all lines.
pub fn cart_total(lines: &[CartLine]) -> f64 {
    lines.iter().map(CartLine::subtotal).sum()
}

/// Initialize the cart table.
///
/// Cart lines are removed along with their product or user.
pub fn create_cart_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS cart_item (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            product_id INTEGER NOT NULL REFERENCES product(id) ON DELETE CASCADE,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            UNIQUE(user_id, product_id)
        );",
    )?;

    Ok(())
}

/// Load the user's cart in the order the products were added.
pub fn get_cart(user_id: UserID, connection: &Connection) -> Result<Cart, Error> {
    let items = connection
        .prepare(
            "SELECT product_id, quantity FROM cart_item
            WHERE user_id = :user_id ORDER BY id ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], |row| {
            Ok(CartItem {
                product_id: row.get(0)?,
                quantity: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart { items })
}

/// Replace the user's stored cart with `cart`.
pub fn save_cart(user_id: UserID, cart: &Cart, connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "DELETE FROM cart_item WHERE user_id = ?1",
        [user_id.as_i64()],
    )?;

    for item in &cart.items {
        transaction.execute(
            "INSERT INTO cart_item (user_id, product_id, quantity) VALUES (?1, ?2, ?3)",
            (user_id.as_i64(), item.product_id, item.quantity),
        )?;
    }

    transaction.commit()?;
    Ok(())
}

/// Remove every line from the user's cart.
pub fn clear_cart(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM cart_item WHERE user_id = ?1",
        [user_id.as_i64()],
    )?;

    Ok(())
}

/// Load the user's cart lines along with their products.
pub fn get_cart_lines(user_id: UserID, connection: &Connection) -> Result<Vec<CartLine>, Error> {
    connection
        .prepare(
            "SELECT p.id, p.title, p.price, p.description, p.image_path, p.user_id, c.quantity
            FROM cart_item c
            INNER JOIN product p ON p.id = c.product_id
            WHERE c.user_id = :user_id
            ORDER BY c.id ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_line)?
        .map(|maybe_line| maybe_line.map_err(|error| error.into()))
        .collect()
}

fn map_line(row: &Row) -> Result<CartLine, rusqlite::Error> {
    Ok(CartLine {
        product: Product {
            id: row.get(0)?,
            title: row.get(1)?,
            price: row.get(2)?,
            description: row.get(3)?,
            image_path: row.get(4)?,
            user_id: UserID::new(row.get(5)?),
        },
        quantity: row.get(6)?,
    })
}
