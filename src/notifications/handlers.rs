/**
 * Notification HTTP Handlers
 *
 * GET    /api/notifications            - list (newest first)
 * PATCH  /api/notifications/{id}/read  - mark read
 * POST   /api/notifications/read-all   - mark everything read
 * PATCH  /api/notifications/{id}/hide  - hide from listings
 * POST   /api/notifications/settings   - per-item suppression toggles
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::users::{self, NotificationScope};
use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::posts::handlers::parse_object_id;
use crate::server::state::AppState;

use super::db::{self, NotificationDoc};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub title: String,
    pub body: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationDoc> for NotificationResponse {
    fn from(n: NotificationDoc) -> Self {
        Self {
            id: n.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: n.title,
            body: n.body,
            kind: n.kind,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let skip = params.offset.unwrap_or(0);

    let notifications = db::list_for_user(&state.db, &user.username, limit, skip).await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    db::mark_read(&state.db, &user.username, parse_object_id(&id)?).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let updated = db::mark_all_read(&state.db, &user.username).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

pub async fn hide_notification(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    db::disable(&state.db, &user.username, parse_object_id(&id)?).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub scope: NotificationScope,
    /// Subreddit name, or post/comment id hex
    pub id: String,
    pub enabled: bool,
}

pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SettingsRequest>,
) -> ApiResult<Json<Value>> {
    let value = match request.scope {
        NotificationScope::Subreddit => Bson::String(request.id),
        NotificationScope::Post | NotificationScope::Comment => {
            Bson::ObjectId(parse_object_id(&request.id)?)
        }
    };

    users::set_notification_scope(
        &state.db,
        &user.username,
        request.scope,
        value,
        request.enabled,
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}
