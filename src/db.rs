//! Database set-up for the shop.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error, auth::create_user_table, cart::create_cart_table, order::create_order_tables,
    product::create_product_table, session::create_session_table,
};

/// Create the all of the database tables for the application.
///
/// Foreign keys are switched on for `connection`, which cart lines and orders
/// rely on to follow product and user deletes.
///
/// # Errors
/// This function may return a [Error::SqlError] if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_session_table(&transaction)?;
    create_product_table(&transaction)?;
    create_cart_table(&transaction)?;
    create_order_tables(&transaction)?;

    transaction.commit()?;

    Ok(())
}
