/**
 * JWT Sessions
 *
 * HMAC-signed bearer tokens. Session tokens expire after 24 hours;
 * password-reset tokens are a distinct purpose with a one hour expiry, so
 * a reset token can never be replayed as a session.
 */

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Session token lifetime: 24 hours
const SESSION_TTL_SECS: u64 = 24 * 60 * 60;
/// Password-reset token lifetime: 1 hour
const RESET_TTL_SECS: u64 = 60 * 60;

/// What a token is allowed to be used for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Auth,
    PasswordReset,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    /// Token purpose
    pub purpose: TokenPurpose,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn create(secret: &str, username: &str, purpose: TokenPurpose, ttl: u64) -> Result<String, jsonwebtoken::errors::Error> {
    let now = now_secs();
    let claims = Claims {
        sub: username.to_string(),
        purpose,
        exp: now + ttl,
        iat: now,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key)
}

/// Create a 24h session token for a user
pub fn create_token(secret: &str, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
    create(secret, username, TokenPurpose::Auth, SESSION_TTL_SECS)
}

/// Create a short-lived password-reset token
pub fn create_reset_token(secret: &str, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
    create(secret, username, TokenPurpose::PasswordReset, RESET_TTL_SECS)
}

/// Verify a token and check it was issued for the expected purpose
///
/// Returns the decoded claims, or `None` when the token is invalid,
/// expired or issued for a different purpose.
pub fn verify_token(secret: &str, token: &str, purpose: TokenPurpose) -> Option<Claims> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let claims = decode::<Claims>(token, &key, &validation).ok()?.claims;
    if claims.purpose != purpose {
        tracing::warn!("token purpose mismatch: {:?}", claims.purpose);
        return None;
    }

    Some(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_create_and_verify_session_token() {
        let token = create_token(SECRET, "alice").unwrap();
        let claims = verify_token(SECRET, &token, TokenPurpose::Auth).unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_session_token_expires_in_24_hours() {
        let token = create_token(SECRET, "alice").unwrap();
        let claims = verify_token(SECRET, &token, TokenPurpose::Auth).unwrap();
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_reset_token_cannot_authenticate() {
        let token = create_reset_token(SECRET, "alice").unwrap();
        assert!(verify_token(SECRET, &token, TokenPurpose::Auth).is_none());
        assert!(verify_token(SECRET, &token, TokenPurpose::PasswordReset).is_some());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(SECRET, "alice").unwrap();
        assert!(verify_token("other-secret", &token, TokenPurpose::Auth).is_none());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify_token(SECRET, "not.a.token", TokenPurpose::Auth).is_none());
    }
}
