//! Database operations for products.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    auth::UserID,
    product::{Product, ProductDetails, ProductId},
};

/// Initialize the product table.
pub fn create_product_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS product (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            price REAL NOT NULL,
            description TEXT NOT NULL,
            image_path TEXT NOT NULL,
            user_id INTEGER NOT NULL REFERENCES user(id)
        );

        CREATE INDEX IF NOT EXISTS idx_product_user_id ON product(user_id);",
    )?;

    Ok(())
}

/// Create a product and return it with its generated ID.
pub fn create_product(
    details: ProductDetails,
    image_path: &str,
    user_id: UserID,
    connection: &Connection,
) -> Result<Product, Error> {
    connection.execute(
        "INSERT INTO product (title, price, description, image_path, user_id)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &details.title,
            details.price,
            &details.description,
            image_path,
            user_id.as_i64(),
        ),
    )?;

    Ok(Product {
        id: connection.last_insert_rowid(),
        title: details.title,
        price: details.price,
        description: details.description,
        image_path: image_path.to_owned(),
        user_id,
    })
}

/// Retrieve a single product by ID.
pub fn get_product(product_id: ProductId, connection: &Connection) -> Result<Product, Error> {
    connection
        .prepare(
            "SELECT id, title, price, description, image_path, user_id
            FROM product WHERE id = :id",
        )?
        .query_row(&[(":id", &product_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve one page of all products in the order they were created.
pub fn get_products_page(
    limit: u64,
    offset: u64,
    connection: &Connection,
) -> Result<Vec<Product>, Error> {
    connection
        .prepare(
            "SELECT id, title, price, description, image_path, user_id
            FROM product ORDER BY id ASC LIMIT :limit OFFSET :offset",
        )?
        .query_map(
            &[(":limit", &to_sql_int(limit)), (":offset", &to_sql_int(offset))],
            map_row,
        )?
        .map(|maybe_product| maybe_product.map_err(|error| error.into()))
        .collect()
}

/// Retrieve one page of the products created by `user_id`.
pub fn get_products_page_for_user(
    user_id: UserID,
    limit: u64,
    offset: u64,
    connection: &Connection,
) -> Result<Vec<Product>, Error> {
    connection
        .prepare(
            "SELECT id, title, price, description, image_path, user_id
            FROM product WHERE user_id = :user_id
            ORDER BY id ASC LIMIT :limit OFFSET :offset",
        )?
        .query_map(
            &[
                (":user_id", &user_id.as_i64()),
                (":limit", &to_sql_int(limit)),
                (":offset", &to_sql_int(offset)),
            ],
            map_row,
        )?
        .map(|maybe_product| maybe_product.map_err(|error| error.into()))
        .collect()
}

/// SQLite treats a negative OFFSET as zero, so out of range values are clamped instead of wrapped.
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub fn count_products(connection: &Connection) -> Result<u64, Error> {
    let count: i64 = connection.query_row("SELECT COUNT(1) FROM product", [], |row| row.get(0))?;

    Ok(u64::try_from(count).unwrap_or_default())
}

pub fn count_products_for_user(user_id: UserID, connection: &Connection) -> Result<u64, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(1) FROM product WHERE user_id = ?1",
        [user_id.as_i64()],
        |row| row.get(0),
    )?;

    Ok(u64::try_from(count).unwrap_or_default())
}

/// Update a product's details, and its image if `image_path` is set.
///
/// # Errors
///
/// Returns an [Error::UpdateMissingProduct] if the product doesn't exist.
pub fn update_product(
    product_id: ProductId,
    details: &ProductDetails,
    image_path: Option<&str>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE product
        SET title = ?1, price = ?2, description = ?3, image_path = COALESCE(?4, image_path)
        WHERE id = ?5",
        (
            &details.title,
            details.price,
            &details.description,
            image_path,
            product_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingProduct);
    }

    Ok(())
}

/// Delete a product by ID, which also removes it from every cart.
///
/// # Errors
///
/// Returns an [Error::DeleteMissingProduct] if the product doesn't exist.
pub fn delete_product(product_id: ProductId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM product WHERE id = ?1", [product_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingProduct);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Product, rusqlite::Error> {
    Ok(Product {
        id: row.get(0)?,
        title: row.get(1)?,
        price: row.get(2)?,
        description: row.get(3)?,
        image_path: row.get(4)?,
        user_id: UserID::new(row.get(5)?),
    })
}

#[cfg(test)]
mod product_query_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::UserID,
        db::initialize,
        product::{
            ProductDetails,
            db::{
                count_products, count_products_for_user, create_product, delete_product,
                get_product, get_products_page, get_products_page_for_user, update_product,
            },
        },
    };

    fn get_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
            .execute_batch(
                "INSERT INTO user (id, email, password) VALUES (1, 'a@b.c', 'hash');
                INSERT INTO user (id, email, password) VALUES (2, 'd@e.f', 'hash');",
            )
            .unwrap();

        connection
    }

    fn details(title: &str) -> ProductDetails {
        ProductDetails {
            title: title.to_owned(),
            price: 9.5,
            description: "desc".to_owned(),
        }
    }

    #[test]
    fn create_and_get_product() {
        let connection = get_connection();

        let product =
            create_product(details("Book"), "1-book.png", UserID::new(1), &connection).unwrap();

        assert_eq!(get_product(product.id, &connection), Ok(product));
    }

    #[test]
    fn pages_are_in_creation_order() {
        let connection = get_connection();
        for title in ["a", "b", "c"] {
            create_product(details(title), "img.png", UserID::new(1), &connection).unwrap();
        }

        let page = get_products_page(2, 2, &connection).unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "c");
        assert_eq!(count_products(&connection), Ok(3));
    }

    #[test]
    fn user_pages_only_contain_own_products() {
        let connection = get_connection();
        create_product(details("mine"), "img.png", UserID::new(1), &connection).unwrap();
        create_product(details("theirs"), "img.png", UserID::new(2), &connection).unwrap();

        let page = get_products_page_for_user(UserID::new(1), 10, 0, &connection).unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "mine");
        assert_eq!(count_products_for_user(UserID::new(1), &connection), Ok(1));
    }

    #[test]
    fn update_keeps_image_when_none_given() {
        let connection = get_connection();
        let product =
            create_product(details("Book"), "old.png", UserID::new(1), &connection).unwrap();

        update_product(product.id, &details("New"), None, &connection).unwrap();

        let updated = get_product(product.id, &connection).unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.image_path, "old.png");
    }

    #[test]
    fn update_missing_product_fails() {
        let connection = get_connection();

        assert_eq!(
            update_product(42, &details("x"), None, &connection),
            Err(Error::UpdateMissingProduct)
        );
    }

    #[test]
    fn delete_removes_product() {
        let connection = get_connection();
        let product =
            create_product(details("Book"), "img.png", UserID::new(1), &connection).unwrap();

        delete_product(product.id, &connection).unwrap();

        assert_eq!(get_product(product.id, &connection), Err(Error::NotFound));
        assert_eq!(
            delete_product(product.id, &connection),
            Err(Error::DeleteMissingProduct)
        );
    }
}
