//! Customer accounts: sign-up, log-in, log-out, password reset and the
//! middleware that guards routes behind a logged in session.

mod email;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod redirect;
mod reset_password;
mod sign_up;
mod token;
mod user;

pub use email::Email;
pub use log_in::{get_log_in_page, post_log_in};
pub use log_out::post_log_out;
pub use middleware::{auth_guard, auth_guard_hx};
pub use password::{PasswordHash, ValidatedPassword};
pub use redirect::normalize_redirect_url;
pub use reset_password::{
    get_new_password_page, get_reset_page, post_reset, post_reset_password,
};
pub use sign_up::{get_sign_up_page, post_sign_up};
pub use token::generate_token;
pub use user::{
    RESET_TOKEN_DURATION, User, UserID, create_user, create_user_table, get_user_by_email,
    get_user_by_id, get_user_by_reset_token, set_reset_token, update_password,
};
