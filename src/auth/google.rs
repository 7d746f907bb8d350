/**
 * Google Sign-in
 *
 * Verifies Google ID tokens against Google's `tokeninfo` endpoint instead
 * of validating the signature locally; the endpoint rejects expired or
 * tampered tokens and returns the claims. When `GOOGLE_CLIENT_ID` is
 * configured the token audience is checked against it.
 */

use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Claims returned by Google's tokeninfo endpoint (subset)
#[derive(Debug, Deserialize)]
pub struct GoogleTokenInfo {
    pub email: String,
    #[serde(default)]
    pub email_verified: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Verify a Google ID token and return its claims
pub async fn verify_id_token(token: &str, expected_aud: Option<&str>) -> ApiResult<GoogleTokenInfo> {
    let response = reqwest::Client::new()
        .get(TOKENINFO_URL)
        .query(&[("id_token", token)])
        .send()
        .await
        .map_err(|e| ApiError::internal(format!("tokeninfo request: {e}")))?;

    if !response.status().is_success() {
        tracing::warn!("Google rejected id token: {}", response.status());
        return Err(ApiError::unauthorized("Invalid Google token"));
    }

    let info: GoogleTokenInfo = response
        .json()
        .await
        .map_err(|e| ApiError::internal(format!("tokeninfo decode: {e}")))?;

    if info.email_verified.as_deref() == Some("false") {
        return Err(ApiError::unauthorized("Google email not verified"));
    }

    if let Some(expected) = expected_aud {
        if info.aud.as_deref() != Some(expected) {
            tracing::warn!("Google token audience mismatch");
            return Err(ApiError::unauthorized("Invalid Google token"));
        }
    }

    Ok(info)
}
