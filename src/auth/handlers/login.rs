/**
 * Login Handlers
 *
 * POST /api/auth/login - username-or-email + password
 * POST /api/auth/google - Google ID token, find-or-create by email
 *
 * Password and Google accounts share the users collection; a Google-only
 * account has no password hash and cannot log in with a password.
 */

use axum::extract::State;
use axum::Json;
use bcrypt::verify;
use mongodb::bson::oid::ObjectId;

use crate::auth::google::verify_id_token;
use crate::auth::handlers::signup::is_valid_username;
use crate::auth::handlers::types::{AuthResponse, GoogleLoginRequest, LoginRequest, UserResponse};
use crate::auth::sessions::create_token;
use crate::auth::users::{self, UserDoc};
use crate::error::{ApiError, ApiResult};
use crate::server::state::AppState;

fn session_response(state: &AppState, user: &UserDoc) -> ApiResult<Json<AuthResponse>> {
    let token = create_token(&state.config.jwt_secret, &user.username)
        .map_err(|e| ApiError::internal(format!("create token: {e}")))?;
    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = if request.identifier.contains('@') {
        users::find_by_email(&state.db, &request.identifier).await?
    } else {
        users::find_by_username(&state.db, &request.identifier).await?
    };

    // Same error for unknown user and wrong password
    let invalid = || ApiError::unauthorized("Invalid credentials");

    let user = user.ok_or_else(invalid)?;
    // Google-only accounts have no hash to check against
    let password_hash = user.password_hash.as_deref().ok_or_else(invalid)?;

    if !verify(&request.password, password_hash)? {
        tracing::debug!("wrong password for {}", user.username);
        return Err(invalid());
    }

    tracing::info!("login: {}", user.username);
    session_response(&state, &user)
}

/// Derive a username from an email local part, suffixed for uniqueness
fn derive_username(email: &str) -> String {
    let local: String = email
        .split('@')
        .next()
        .unwrap_or("user")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(20)
        .collect();

    let base = if local.is_empty() || !local.starts_with(|c: char| c.is_ascii_alphabetic()) {
        format!("user{local}")
    } else {
        local
    };

    // ObjectId hex tail is unique enough for a first attempt; signup
    // collisions fall back to the unique index.
    let suffix = &ObjectId::new().to_hex()[18..];
    format!("{base}_{suffix}")
}

pub async fn google_login(
    State(state): State<AppState>,
    Json(request): Json<GoogleLoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let info = verify_id_token(&request.id_token, state.config.google_client_id.as_deref()).await?;

    if let Some(user) = users::find_by_email(&state.db, &info.email).await? {
        tracing::info!("google login: {}", user.username);
        return session_response(&state, &user);
    }

    let username = derive_username(&info.email);
    let user = users::create_user(&state.db, username, info.email, None).await?;
    tracing::info!("google signup: {}", user.username);
    session_response(&state, &user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_username_is_valid() {
        for email in [
            "alice@example.com",
            "a.b+c@example.com",
            "99bottles@example.com",
            "@example.com",
            "Ærø@example.com",
        ] {
            let username = derive_username(email);
            assert!(
                is_valid_username(&username),
                "{email} -> {username} should be a valid username"
            );
        }
    }

    #[test]
    fn test_derived_usernames_differ_per_call() {
        assert_ne!(
            derive_username("alice@example.com"),
            derive_username("alice@example.com")
        );
    }
}
