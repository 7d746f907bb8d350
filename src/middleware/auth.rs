/**
 * Authentication Extractors
 *
 * Bearer-token extractors used as handler parameters:
 *
 * - `AuthUser` - requires a valid session token, loads the user document
 * - `MaybeAuthUser` - optional authentication for public routes that
 *   personalize when a token is present (feeds, post detail)
 *
 * The extractors verify the JWT and then load the user from the database,
 * so a token for a deleted user never authenticates.
 */

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::sessions::{verify_token, TokenPurpose};
use crate::auth::users::{self, UserDoc};
use crate::error::ApiError;
use crate::server::state::AppState;

/// Authenticated user, loaded from the database
pub struct AuthUser(pub UserDoc);

/// Optional authentication; `None` when no (valid) token was sent
pub struct MaybeAuthUser(pub Option<UserDoc>);

/// Extract the bearer token from the Authorization header
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

async fn load_user(parts: &Parts, state: &AppState) -> Result<UserDoc, ApiError> {
    let token = bearer_token(parts).ok_or_else(|| {
        tracing::debug!("missing or malformed Authorization header");
        ApiError::unauthorized("Missing bearer token")
    })?;

    let claims = verify_token(&state.config.jwt_secret, token, TokenPurpose::Auth)
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    users::find_by_username(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| {
            tracing::warn!("token for unknown user {}", claims.sub);
            ApiError::unauthorized("Invalid or expired token")
        })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(AuthUser(load_user(parts, state).await?))
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if bearer_token(parts).is_none() {
            return Ok(MaybeAuthUser(None));
        }
        // A token was sent; an invalid one is still a 401, not anonymous
        Ok(MaybeAuthUser(Some(load_user(parts, state).await?)))
    }
}
