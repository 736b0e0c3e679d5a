//! Orders and their item snapshots.

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::{Error, auth::UserID, cart::CartLine, product::ProductId};

/// Database identifier for an order.
pub type OrderId = i64;

/// A copy of a cart line taken at checkout.
///
/// `product_id` is cleared if the product is deleted later, the rest is kept as is.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub product_id: Option<ProductId>,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub quantity: u32,
}

/// A completed checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserID,
    pub created_at: OffsetDateTime,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum()
    }
}

/// Initialize the order tables.
pub fn create_order_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS customer_order (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_customer_order_user_id ON customer_order(user_id);

        CREATE TABLE IF NOT EXISTS order_item (
            id INTEGER PRIMARY KEY,
            order_id INTEGER NOT NULL REFERENCES customer_order(id) ON DELETE CASCADE,
            product_id INTEGER REFERENCES product(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            price REAL NOT NULL,
            description TEXT NOT NULL,
            quantity INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_order_item_order_id ON order_item(order_id);",
    )?;

    Ok(())
}

/// Save a snapshot of `lines` as a new order for the user.
pub fn create_order(
    user_id: UserID,
    lines: &[CartLine],
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Order, Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "INSERT INTO customer_order (user_id, created_at) VALUES (?1, ?2)",
        (user_id.as_i64(), created_at),
    )?;
    let order_id = transaction.last_insert_rowid();

    let items: Vec<OrderItem> = lines
        .iter()
        .map(|line| OrderItem {
            product_id: Some(line.product.id),
            title: line.product.title.clone(),
            price: line.product.price,
            description: line.product.description.clone(),
            quantity: line.quantity,
        })
        .collect();

    for item in &items {
        transaction.execute(
            "INSERT INTO order_item (order_id, product_id, title, price, description, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                order_id,
                item.product_id,
                &item.title,
                item.price,
                &item.description,
                item.quantity,
            ),
        )?;
    }

    transaction.commit()?;

    Ok(Order {
        id: order_id,
        user_id,
        created_at,
        items,
    })
}

/// Get a single order with its items.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no order with `order_id`.
pub fn get_order(order_id: OrderId, connection: &Connection) -> Result<Order, Error> {
    let order = connection
        .query_row(
            "SELECT id, user_id, created_at FROM customer_order WHERE id = ?1",
            [order_id],
            map_order_row,
        )
        .optional()?
        .ok_or(Error::NotFound)?;

    with_items(order, connection)
}

/// Get all of the user's orders, newest first.
pub fn get_orders_for_user(user_id: UserID, connection: &Connection) -> Result<Vec<Order>, Error> {
    let orders = connection
        .prepare(
            "SELECT id, user_id, created_at FROM customer_order
            WHERE user_id = :user_id
            ORDER BY created_at DESC, id DESC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_order_row)?
        .collect::<Result<Vec<_>, _>>()?;

    orders
        .into_iter()
        .map(|order| with_items(order, connection))
        .collect()
}

fn with_items(mut order: Order, connection: &Connection) -> Result<Order, Error> {
    order.items = connection
        .prepare(
            "SELECT product_id, title, price, description, quantity FROM order_item
            WHERE order_id = :order_id ORDER BY id ASC",
        )?
        .query_map(&[(":order_id", &order.id)], map_item_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(order)
}

fn map_order_row(row: &Row) -> Result<Order, rusqlite::Error> {
    Ok(Order {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        created_at: row.get(2)?,
        items: Vec::new(),
    })
}

fn map_item_row(row: &Row) -> Result<OrderItem, rusqlite::Error> {
    Ok(OrderItem {
        product_id: row.get(0)?,
        title: row.get(1)?,
        price: row.get(2)?,
        description: row.get(3)?,
        quantity: row.get(4)?,
    })
}
