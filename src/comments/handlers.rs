/**
 * Comment HTTP Handlers
 *
 * Commenting refuses locked posts and bumps the post's comment_count in the
 * same request. The post author is notified of new comments unless their
 * settings or blocks suppress it.
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::users::{self, ItemKind, ItemRef, UserDoc};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::notifications::{notify, NotificationContext};
use crate::posts::db as posts_db;
use crate::posts::handlers::{parse_object_id, VoteRequest, VoteResponse};
use crate::posts::voting::{apply_vote, VoteDirection};
use crate::server::state::AppState;
use crate::subreddits::db as subreddits_db;

use super::db::{self, CommentDoc};

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub content: String,
    pub author_name: String,
    pub post_id: String,
    pub subreddit: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub my_vote: Option<VoteDirection>,
}

impl CommentResponse {
    pub fn build(comment: &CommentDoc, viewer: Option<&UserDoc>) -> Self {
        let my_vote = match (viewer, comment.id) {
            (Some(user), Some(id)) => user.vote_state(&id, ItemKind::Comment),
            _ => None,
        };
        Self {
            id: comment.id.map(|id| id.to_hex()).unwrap_or_default(),
            content: comment.content.clone(),
            author_name: comment.author_name.clone(),
            post_id: comment.post_id.to_hex(),
            subreddit: comment.subreddit.clone(),
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
            score: comment.score(),
            created_at: comment.created_at,
            edited_at: comment.edited_at.map(|d| d.to_chrono()),
            my_vote,
        }
    }
}

pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
    Json(request): Json<CreateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request("Comment cannot be empty"));
    }

    let post_id = parse_object_id(&post_id)?;
    let post = posts_db::require_by_id(&state.db, post_id).await?;
    if post.locked {
        return Err(ApiError::forbidden("This post is locked"));
    }

    let subreddit = subreddits_db::require_by_name(&state.db, &post.subreddit).await?;
    if subreddit.is_banned(&user.username) {
        return Err(ApiError::forbidden("You are banned from this subreddit"));
    }
    if subreddit.is_muted(&user.username) {
        return Err(ApiError::forbidden("You are muted in this subreddit"));
    }

    let comment = db::insert(
        &state.db,
        CommentDoc {
            id: None,
            content: request.content,
            author_name: user.username.clone(),
            post_id,
            subreddit: post.subreddit.clone(),
            upvotes: 0,
            downvotes: 0,
            created_at: Utc::now(),
            edited_at: None,
        },
    )
    .await?;
    posts_db::inc_comment_count(&state.db, post_id, 1).await?;

    notify(
        &state.db,
        &state.realtime,
        &post.author_name,
        "comment",
        "New comment on your post".to_string(),
        format!("{} commented on \"{}\"", user.username, post.title),
        &NotificationContext {
            actor: &user.username,
            subreddit: Some(&post.subreddit),
            post_id: Some(post_id),
            comment_id: comment.id,
        },
    )
    .await?;

    Ok(Json(CommentResponse::build(&comment, Some(&user))))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(post_id): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let post_id = parse_object_id(&post_id)?;
    posts_db::require_by_id(&state.db, post_id).await?;

    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let comments = db::list_for_post(&state.db, post_id, limit, params.offset.unwrap_or(0)).await?;
    Ok(Json(
        comments
            .iter()
            .map(|c| CommentResponse::build(c, viewer.as_ref()))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    pub content: String,
}

pub async fn edit_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<EditCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let id = parse_object_id(&id)?;
    let comment = db::require_by_id(&state.db, id).await?;

    if comment.author_name != user.username {
        return Err(ApiError::forbidden("Only the author can edit a comment"));
    }
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request("Comment cannot be empty"));
    }

    db::update_content(&state.db, id, &request.content).await?;
    let comment = db::require_by_id(&state.db, id).await?;
    Ok(Json(CommentResponse::build(&comment, Some(&user))))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    let comment = db::require_by_id(&state.db, id).await?;
    let subreddit = subreddits_db::require_by_name(&state.db, &comment.subreddit).await?;

    let allowed = comment.author_name == user.username
        || user.is_admin()
        || subreddit.is_moderator(&user.username);
    if !allowed {
        return Err(ApiError::forbidden("Not allowed to delete this comment"));
    }

    db::delete(&state.db, id).await?;
    posts_db::inc_comment_count(&state.db, comment.post_id, -1).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn vote_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<Json<VoteResponse>> {
    let id = parse_object_id(&id)?;
    let comment = db::require_by_id(&state.db, id).await?;

    let item = ItemRef {
        item_id: id,
        item_type: ItemKind::Comment,
    };
    let current = user.vote_state(&id, ItemKind::Comment);
    let outcome = apply_vote(current, request.direction);

    let applied =
        users::apply_vote_transition(&state.db, &user.username, &item, current, outcome.new_state)
            .await?;
    if !applied {
        // A concurrent identical request already moved the arrays; the
        // counters and karma were adjusted exactly once by that request.
        return Ok(Json(VoteResponse {
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
            my_vote: outcome.new_state,
        }));
    }
    db::apply_vote_counters(&state.db, id, outcome.up_delta, outcome.down_delta).await?;
    users::adjust_karma(
        &state.db,
        &comment.author_name,
        ItemKind::Comment,
        outcome.karma_delta(),
    )
    .await?;

    if outcome.is_first_upvote() {
        notify(
            &state.db,
            &state.realtime,
            &comment.author_name,
            "vote",
            "Your comment was upvoted".to_string(),
            format!("{} upvoted your comment", user.username),
            &NotificationContext {
                actor: &user.username,
                subreddit: Some(&comment.subreddit),
                post_id: Some(comment.post_id),
                comment_id: Some(id),
            },
        )
        .await?;
    }

    Ok(Json(VoteResponse {
        upvotes: comment.upvotes + outcome.up_delta,
        downvotes: comment.downvotes + outcome.down_delta,
        my_vote: outcome.new_state,
    }))
}
