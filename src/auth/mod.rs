/**
 * Authentication
 *
 * Signup/login (password and Google), JWT session tokens, password reset
 * over email and the user document model shared by the rest of the crate.
 */

pub mod google;
pub mod handlers;
pub mod sessions;
pub mod users;

pub use handlers::{forgot_password, forgot_username, get_me, google_login, login, reset_password, signup};
