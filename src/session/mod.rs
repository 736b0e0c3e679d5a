//! Server-side sessions for anonymous and logged in visitors, with CSRF
//! tokens and one-shot flash messages.

mod cookie;
mod db;
mod middleware;

pub(crate) use cookie::{COOKIE_SESSION_ID, invalidate_session_cookie, set_session_cookie};
pub use db::{
    DEFAULT_SESSION_DURATION, Session, SessionId, create_session, create_session_table,
    delete_expired_sessions, delete_session, get_session, rotate_session, set_flash, take_flash,
};
pub use middleware::{CSRF_HEADER, CurrentSession, SessionState, session_middleware};
