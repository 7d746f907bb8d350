//! Request/response bodies for the auth endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::users::UserDoc;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login accepts a username or an email in `identifier`
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Public view of a user, never includes the password hash
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub access: String,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub avatar_url: Option<String>,
    pub post_karma: i64,
    pub comment_karma: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&UserDoc> for UserResponse {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: user.username.clone(),
            email: user.email.clone(),
            access: user.access.clone(),
            display_name: user.display_name.clone(),
            about: user.about.clone(),
            avatar_url: user.avatar_url.clone(),
            post_karma: user.post_karma,
            comment_karma: user.comment_karma,
            created_at: user.created_at,
        }
    }
}
