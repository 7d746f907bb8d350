/**
 * Profile HTTP Handlers
 *
 * Public profile pages, profile edits, the follow and block graphs, and
 * the viewer's personal lists (saved/hidden/upvoted/downvoted) resolved
 * back to full documents.
 */

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::users::{self, ItemKind, ItemRef, UserDoc};
use crate::comments::db as comments_db;
use crate::comments::CommentResponse;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::notifications::{notify, NotificationContext};
use crate::posts::db as posts_db;
use crate::posts::PostResponse;
use crate::server::state::AppState;

const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub username: String,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub avatar_url: Option<String>,
    pub post_karma: i64,
    pub comment_karma: i64,
    pub follower_count: usize,
    pub created_at: DateTime<Utc>,
    pub recent_posts: Vec<PostResponse>,
    pub recent_comments: Vec<CommentResponse>,
    /// Whether the viewer follows this user
    pub followed: bool,
}

pub async fn get_profile(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(username): Path<String>,
) -> ApiResult<Json<PublicProfile>> {
    let user = users::require_by_username(&state.db, &username).await?;

    let posts = posts_db::find_by_author(&state.db, &user.username, RECENT_LIMIT).await?;
    let comments = comments_db::list_by_author(&state.db, &user.username, RECENT_LIMIT).await?;

    Ok(Json(PublicProfile {
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        about: user.about.clone(),
        avatar_url: user.avatar_url.clone(),
        post_karma: user.post_karma,
        comment_karma: user.comment_karma,
        follower_count: user.followers.len(),
        created_at: user.created_at,
        recent_posts: posts
            .iter()
            .map(|p| PostResponse::build(p, viewer.as_ref()))
            .collect(),
        recent_comments: comments
            .iter()
            .map(|c| CommentResponse::build(c, viewer.as_ref()))
            .collect(),
        followed: viewer
            .as_ref()
            .map(|v| v.follows(&user.username))
            .unwrap_or(false),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Value>> {
    let mut set = Document::new();
    if let Some(display_name) = request.display_name {
        set.insert("display_name", display_name);
    }
    if let Some(about) = request.about {
        set.insert("about", about);
    }
    if let Some(avatar_url) = request.avatar_url {
        set.insert("avatar_url", avatar_url);
    }
    if set.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    users::update_profile(&state.db, &user.username, set).await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Follow / block graphs
// ---------------------------------------------------------------------------

pub async fn follow_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> ApiResult<Json<Value>> {
    if username == user.username {
        return Err(ApiError::bad_request("Cannot follow yourself"));
    }

    let target = users::require_by_username(&state.db, &username).await?;
    if target.has_blocked(&user.username) {
        return Err(ApiError::forbidden("Cannot follow this user"));
    }

    // One atomic update per document; idempotent via $addToSet
    users::add_to_set(
        &state.db,
        &user.username,
        "followings",
        Bson::String(target.username.clone()),
    )
    .await?;
    users::add_to_set(
        &state.db,
        &target.username,
        "followers",
        Bson::String(user.username.clone()),
    )
    .await?;

    notify(
        &state.db,
        &state.realtime,
        &target.username,
        "follow",
        "New follower".to_string(),
        format!("{} started following you", user.username),
        &NotificationContext {
            actor: &user.username,
            subreddit: None,
            post_id: None,
            comment_id: None,
        },
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> ApiResult<Json<Value>> {
    let target = users::require_by_username(&state.db, &username).await?;

    users::pull_from_set(
        &state.db,
        &user.username,
        "followings",
        Bson::String(target.username.clone()),
    )
    .await?;
    users::pull_from_set(
        &state.db,
        &target.username,
        "followers",
        Bson::String(user.username.clone()),
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn block_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> ApiResult<Json<Value>> {
    if username == user.username {
        return Err(ApiError::bad_request("Cannot block yourself"));
    }

    let target = users::require_by_username(&state.db, &username).await?;

    users::add_to_set(
        &state.db,
        &user.username,
        "blocked_users",
        Bson::String(target.username.clone()),
    )
    .await?;
    // Blocking severs the follow relationship both ways
    users::pull_from_set(
        &state.db,
        &user.username,
        "followings",
        Bson::String(target.username.clone()),
    )
    .await?;
    users::pull_from_set(
        &state.db,
        &target.username,
        "followers",
        Bson::String(user.username.clone()),
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn unblock_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> ApiResult<Json<Value>> {
    users::pull_from_set(
        &state.db,
        &user.username,
        "blocked_users",
        Bson::String(username),
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Personal lists
// ---------------------------------------------------------------------------

/// Splits an item list and resolves both halves to documents.
async fn resolve_items(
    state: &AppState,
    viewer: &UserDoc,
    items: &[ItemRef],
) -> ApiResult<Value> {
    let post_ids: Vec<_> = items
        .iter()
        .filter(|r| r.item_type == ItemKind::Post)
        .map(|r| r.item_id)
        .collect();
    let comment_ids: Vec<_> = items
        .iter()
        .filter(|r| r.item_type == ItemKind::Comment)
        .map(|r| r.item_id)
        .collect();

    let posts = posts_db::find_by_ids(&state.db, &post_ids).await?;
    let comments = comments_db::find_by_ids(&state.db, &comment_ids).await?;

    Ok(json!({
        "posts": posts
            .iter()
            .map(|p| PostResponse::build(p, Some(viewer)))
            .collect::<Vec<_>>(),
        "comments": comments
            .iter()
            .map(|c| CommentResponse::build(c, Some(viewer)))
            .collect::<Vec<_>>(),
    }))
}

pub async fn saved_items(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let resolved = resolve_items(&state, &user, &user.saved_items).await?;
    Ok(Json(resolved))
}

pub async fn upvoted_items(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let resolved = resolve_items(&state, &user, &user.upvotes).await?;
    Ok(Json(resolved))
}

pub async fn downvoted_items(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let resolved = resolve_items(&state, &user, &user.downvotes).await?;
    Ok(Json(resolved))
}

pub async fn hidden_posts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let posts = posts_db::find_by_ids(&state.db, &user.hidden_posts).await?;
    Ok(Json(
        posts
            .iter()
            .map(|p| PostResponse::build(p, Some(&user)))
            .collect(),
    ))
}
