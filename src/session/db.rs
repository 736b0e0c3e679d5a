//! Server-side session storage.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row};
use time::{Duration, OffsetDateTime};

use crate::{Error, auth::UserID, auth::generate_token};

/// The default lifetime of a session.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::days(7);

/// The opaque ID stored in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw_id: &str) -> Self {
        Self(raw_id.to_owned())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A browser session, anonymous until a user logs in.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: Option<UserID>,
    pub csrf_token: String,
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// Whether the session has expired at `now`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS session (
            id TEXT PRIMARY KEY,
            user_id INTEGER REFERENCES user(id) ON DELETE CASCADE,
            csrf_token TEXT NOT NULL,
            flash TEXT,
            expires_at TEXT NOT NULL
        );",
    )?;

    Ok(())
}

/// Start a new session, optionally bound to `user_id`, that lasts for `duration`.
pub fn create_session(
    user_id: Option<UserID>,
    duration: Duration,
    connection: &Connection,
) -> Result<Session, Error> {
    let session = Session {
        id: SessionId(generate_token()),
        user_id,
        csrf_token: generate_token(),
        expires_at: OffsetDateTime::now_utc() + duration,
    };

    connection.execute(
        "INSERT INTO session (id, user_id, csrf_token, expires_at) VALUES (?1, ?2, ?3, ?4)",
        (
            session.id.as_ref(),
            session.user_id.map(|id| id.as_i64()),
            &session.csrf_token,
            session.expires_at,
        ),
    )?;

    Ok(session)
}

pub fn get_session(session_id: &SessionId, connection: &Connection) -> Result<Session, Error> {
    connection
        .prepare("SELECT id, user_id, csrf_token, expires_at FROM session WHERE id = :id")?
        .query_row(&[(":id", session_id.as_ref())], map_row)
        .map_err(|error| error.into())
}

/// Replace the session with a new one bound to `user_id`.
///
/// The session ID and CSRF token change so that an ID issued before logging
/// in cannot be used to ride the authenticated session.
pub fn rotate_session(
    old_session_id: &SessionId,
    user_id: UserID,
    duration: Duration,
    connection: &Connection,
) -> Result<Session, Error> {
    delete_session(old_session_id, connection)?;

    create_session(Some(user_id), duration, connection)
}

pub fn delete_session(session_id: &SessionId, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM session WHERE id = ?1", [session_id.as_ref()])?;

    Ok(())
}

/// Remove all sessions that expired before `now`, returning how many were removed.
pub fn delete_expired_sessions(
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute("DELETE FROM session WHERE expires_at <= ?1", [now])
        .map_err(|error| error.into())
}

/// Store a message to show on the next page the session visits.
pub fn set_flash(session_id: &SessionId, message: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE session SET flash = ?1 WHERE id = ?2",
        (message, session_id.as_ref()),
    )?;

    Ok(())
}

/// Read and clear the session's flash message.
pub fn take_flash(session_id: &SessionId, connection: &Connection) -> Result<Option<String>, Error> {
    let flash: Option<String> = connection
        .query_row(
            "SELECT flash FROM session WHERE id = ?1",
            [session_id.as_ref()],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    if flash.is_some() {
        connection.execute(
            "UPDATE session SET flash = NULL WHERE id = ?1",
            [session_id.as_ref()],
        )?;
    }

    Ok(flash)
}

fn map_row(row: &Row) -> Result<Session, rusqlite::Error> {
    let raw_id: String = row.get(0)?;
    let raw_user_id: Option<i64> = row.get(1)?;

    Ok(Session {
        id: SessionId(raw_id),
        user_id: raw_user_id.map(UserID::new),
        csrf_token: row.get(2)?,
        expires_at: row.get(3)?,
    })
}

#[cfg(test)]
mod session_db_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::{UserID, create_user_table},
        session::db::{
            DEFAULT_SESSION_DURATION, create_session, create_session_table,
            delete_expired_sessions, get_session, rotate_session, set_flash, take_flash,
        },
    };

    fn get_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_user_table(&connection).unwrap();
        create_session_table(&connection).unwrap();
        connection
            .execute(
                "INSERT INTO user (id, email, password) VALUES (1, 'foo@bar.baz', 'hash')",
                (),
            )
            .unwrap();

        connection
    }

    #[test]
    fn created_session_can_be_fetched() {
        let connection = get_db_connection();

        let session = create_session(None, DEFAULT_SESSION_DURATION, &connection).unwrap();

        assert_eq!(get_session(&session.id, &connection), Ok(session));
    }

    #[test]
    fn rotate_session_replaces_id_and_binds_user() {
        let connection = get_db_connection();
        let session = create_session(None, DEFAULT_SESSION_DURATION, &connection).unwrap();

        let rotated =
            rotate_session(&session.id, UserID::new(1), DEFAULT_SESSION_DURATION, &connection)
                .unwrap();

        assert_ne!(rotated.id, session.id);
        assert_ne!(rotated.csrf_token, session.csrf_token);
        assert_eq!(rotated.user_id, Some(UserID::new(1)));
        assert_eq!(get_session(&session.id, &connection), Err(Error::NotFound));
    }

    #[test]
    fn flash_is_read_once() {
        let connection = get_db_connection();
        let session = create_session(None, DEFAULT_SESSION_DURATION, &connection).unwrap();

        set_flash(&session.id, "Invalid order", &connection).unwrap();

        assert_eq!(
            take_flash(&session.id, &connection),
            Ok(Some("Invalid order".to_owned()))
        );
        assert_eq!(take_flash(&session.id, &connection), Ok(None));
    }

    #[test]
    fn expired_sessions_are_purged() {
        let connection = get_db_connection();
        let expired = create_session(None, Duration::seconds(-1), &connection).unwrap();
        let live = create_session(None, DEFAULT_SESSION_DURATION, &connection).unwrap();

        let removed = delete_expired_sessions(OffsetDateTime::now_utc(), &connection).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(get_session(&expired.id, &connection), Err(Error::NotFound));
        assert_eq!(get_session(&live.id, &connection), Ok(live));
    }
}
