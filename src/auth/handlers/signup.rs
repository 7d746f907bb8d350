/**
 * Signup Handler
 *
 * POST /api/auth/signup
 *
 * 1. Validate username format, email and password length
 * 2. Hash the password with bcrypt
 * 3. Insert the user (unique indexes reject duplicates)
 * 4. Return a session token and the user
 */

use axum::extract::State;
use axum::Json;
use bcrypt::{hash, DEFAULT_COST};

use crate::auth::handlers::types::{AuthResponse, SignupRequest, UserResponse};
use crate::auth::sessions::create_token;
use crate::auth::users::create_user;
use crate::error::{ApiError, ApiResult};
use crate::server::state::AppState;

/// Validate username format: 3-30 chars, letter first, then
/// alphanumerics and underscores.
pub fn is_valid_username(username: &str) -> bool {
    if username.len() < 3 || username.len() > 30 {
        return false;
    }

    let mut chars = username.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<Json<AuthResponse>> {
    tracing::info!("signup request for username {}", request.username);

    if !is_valid_username(&request.username) {
        return Err(ApiError::bad_request(
            "Username must be 3-30 chars, start with a letter, and contain only letters, numbers, and underscores",
        ));
    }
    if !request.email.contains('@') {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    if request.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let password_hash = hash(&request.password, DEFAULT_COST)?;

    let user = create_user(
        &state.db,
        request.username,
        request.email,
        Some(password_hash),
    )
    .await?;

    let token = create_token(&state.config.jwt_secret, &user.username)
        .map_err(|e| ApiError::internal(format!("create token: {e}")))?;

    tracing::info!("user created: {}", user.username);

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(&user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("alice_bob_99"));
        assert!(is_valid_username("Abc"));
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(!is_valid_username("ab")); // too short
        assert!(!is_valid_username(&"a".repeat(31))); // too long
        assert!(!is_valid_username("1alice")); // digit first
        assert!(!is_valid_username("_alice")); // underscore first
        assert!(!is_valid_username("alice!")); // punctuation
        assert!(!is_valid_username("")); // empty
    }
}
