/**
 * Password Recovery Handlers
 *
 * POST /api/auth/forgot-password - email a reset token
 * POST /api/auth/reset-password  - redeem a reset token
 * POST /api/auth/forgot-username - email the username
 *
 * The forgot-* endpoints always answer 200 with the same body, so they
 * cannot be used to probe which addresses are registered.
 */

use axum::extract::State;
use axum::Json;
use bcrypt::{hash, DEFAULT_COST};
use serde_json::{json, Value};

use crate::auth::handlers::types::{ForgotPasswordRequest, ResetPasswordRequest};
use crate::auth::sessions::{create_reset_token, verify_token, TokenPurpose};
use crate::auth::users;
use crate::error::{ApiError, ApiResult};
use crate::server::state::AppState;

fn accepted() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "If that email is registered, a message has been sent",
    }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let user = match users::find_by_email(&state.db, &request.email).await? {
        Some(user) => user,
        None => return Ok(accepted()),
    };

    let Some(mailer) = &state.mailer else {
        tracing::warn!("password reset requested but mailer is disabled");
        return Ok(accepted());
    };

    let token = create_reset_token(&state.config.jwt_secret, &user.username)
        .map_err(|e| ApiError::internal(format!("create reset token: {e}")))?;

    // Delivery failures are logged, not surfaced, to keep the response uniform
    if let Err(e) = mailer
        .send_password_reset(&user.email, &user.username, &token)
        .await
    {
        tracing::error!("failed to send reset email: {:?}", e);
    }

    Ok(accepted())
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    if request.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let claims = verify_token(
        &state.config.jwt_secret,
        &request.token,
        TokenPurpose::PasswordReset,
    )
    .ok_or_else(|| ApiError::unauthorized("Invalid or expired reset token"))?;

    let password_hash = hash(&request.password, DEFAULT_COST)?;
    users::set_password(&state.db, &claims.sub, &password_hash).await?;

    tracing::info!("password reset for {}", claims.sub);
    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}

pub async fn forgot_username(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<Value>> {
    if let (Some(user), Some(mailer)) = (
        users::find_by_email(&state.db, &request.email).await?,
        &state.mailer,
    ) {
        if let Err(e) = mailer.send_username_reminder(&user.email, &user.username).await {
            tracing::error!("failed to send username reminder: {:?}", e);
        }
    }
    Ok(accepted())
}
