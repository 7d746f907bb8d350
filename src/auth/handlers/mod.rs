//! Auth endpoint handlers

pub mod login;
pub mod me;
pub mod password;
pub mod signup;
pub mod types;

pub use login::{google_login, login};
pub use me::get_me;
pub use password::{forgot_password, forgot_username, reset_password};
pub use signup::signup;
