//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{Email, PasswordHash},
};

/// How long a password reset link stays valid.
pub const RESET_TOKEN_DURATION: Duration = Duration::minutes(30);

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered customer of the shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The address the user logs in with and receives password reset links at.
    pub email: Email,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            reset_token TEXT UNIQUE,
            reset_token_expiry TEXT
        );",
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// The user starts with an empty cart.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateEmail] if a user with `email` already exists,
/// - [Error::SqlError] if another SQL related error occurred.
pub fn create_user(
    email: Email,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (email, password) VALUES (?1, ?2)",
        (email.as_ref(), password_hash.as_ref()),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        email,
        password_hash,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has registered with `email`.
pub fn get_user_by_email(email: &Email, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, password FROM user WHERE email = :email")?
        .query_row(&[(":email", email.as_ref())], map_row)
        .map_err(|error| error.into())
}

/// Store a password reset token for the user, replacing any previous token.
pub fn set_reset_token(
    user_id: UserID,
    token: &str,
    expires_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET reset_token = ?1, reset_token_expiry = ?2 WHERE id = ?3",
        (token, expires_at, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Find the user that owns `token`, checking that the token has not expired at `now`.
///
/// # Errors
///
/// Returns a:
/// - [Error::InvalidResetToken] if no user has the token,
/// - [Error::ExpiredResetToken] if the token expired before `now`.
pub fn get_user_by_reset_token(
    token: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<User, Error> {
    let result = connection
        .prepare(
            "SELECT id, email, password, reset_token_expiry FROM user
            WHERE reset_token = :token",
        )?
        .query_row(&[(":token", token)], |row| {
            let user = map_row(row)?;
            let expires_at: OffsetDateTime = row.get(3)?;

            Ok((user, expires_at))
        });

    match result {
        Ok((user, expires_at)) if expires_at > now => Ok(user),
        Ok(_) => Err(Error::ExpiredResetToken),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::InvalidResetToken),
        Err(error) => Err(error.into()),
    }
}

/// Replace the user's password and consume their reset token.
///
/// The update only applies while `reset_token` is still the user's token, so
/// a token can be redeemed once.
///
/// # Errors
///
/// Returns [Error::InvalidResetToken] if the token no longer belongs to the user.
pub fn update_password(
    user_id: UserID,
    reset_token: &str,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1, reset_token = NULL, reset_token_expiry = NULL
        WHERE id = ?2 AND reset_token = ?3",
        (password_hash.as_ref(), user_id.as_i64(), reset_token),
    )?;

    if rows_affected == 0 {
        return Err(Error::InvalidResetToken);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    let id = UserID::new(row.get(0)?);
    let raw_email: String = row.get(1)?;
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id,
        email: Email::new_unchecked(&raw_email),
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}
