//! GET /api/auth/me - the authenticated user's own record

use axum::Json;

use crate::auth::handlers::types::UserResponse;
use crate::error::ApiResult;
use crate::middleware::AuthUser;

pub async fn get_me(AuthUser(user): AuthUser) -> ApiResult<Json<UserResponse>> {
    Ok(Json(UserResponse::from(&user)))
}
