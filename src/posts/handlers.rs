/**
 * Post HTTP Handlers
 *
 * CRUD, feeds, voting, polls and the per-viewer lists (hide/save). Writes
 * touch up to three documents - the post, the voter and the author - each
 * with a single atomic update; see `voting` for the toggle rules.
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::users::{self, ItemKind, ItemRef, UserDoc};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::notifications::{notify, NotificationContext};
use crate::server::state::AppState;
use crate::subreddits::db::{self as subreddits_db, Privacy, SubredditDoc};

use super::db::{self, FeedSort, PollOption, PostDoc, PostKind};
use super::voting::{apply_vote, VoteDirection};

pub fn parse_object_id(id: &str) -> ApiResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid id"))
}

/// Moderator of the subreddit, or site admin
fn can_moderate(user: &UserDoc, subreddit: &SubredditDoc) -> bool {
    user.is_admin() || subreddit.is_moderator(&user.username)
}

// ---------------------------------------------------------------------------
// Request/response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub subreddit: String,
    pub kind: PostKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    /// Poll voting window in days (optional)
    #[serde(default)]
    pub poll_duration_days: Option<i64>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub spoiler: bool,
}

#[derive(Debug, Serialize)]
pub struct PollOptionResponse {
    pub text: String,
    pub votes: usize,
    /// Whether the viewer voted for this option
    pub voted: bool,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub kind: PostKind,
    pub author_name: String,
    pub subreddit: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    pub comment_count: i64,
    pub options: Vec<PollOptionResponse>,
    pub poll_closes_at: Option<DateTime<Utc>>,
    pub link_url: Option<String>,
    pub media_url: Option<String>,
    pub nsfw: bool,
    pub spoiler: bool,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    /// The viewer's vote, when authenticated
    pub my_vote: Option<VoteDirection>,
}

impl PostResponse {
    pub fn build(post: &PostDoc, viewer: Option<&UserDoc>) -> Self {
        let my_vote = match (viewer, post.id) {
            (Some(user), Some(id)) => user.vote_state(&id, ItemKind::Post),
            _ => None,
        };
        let viewer_name = viewer.map(|u| u.username.as_str());

        Self {
            id: post.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: post.title.clone(),
            content: post.content.clone(),
            kind: post.kind,
            author_name: post.author_name.clone(),
            subreddit: post.subreddit.clone(),
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            score: post.score(),
            comment_count: post.comment_count,
            options: post
                .options
                .iter()
                .map(|o| PollOptionResponse {
                    text: o.text.clone(),
                    votes: o.voters.len(),
                    voted: viewer_name
                        .map(|name| o.voters.iter().any(|v| v == name))
                        .unwrap_or(false),
                })
                .collect(),
            poll_closes_at: post.poll_closes_at.map(|d| d.to_chrono()),
            link_url: post.link_url.clone(),
            media_url: post.media_url.clone(),
            nsfw: post.nsfw,
            spoiler: post.spoiler,
            locked: post.locked,
            created_at: post.created_at,
            edited_at: post.edited_at.map(|d| d.to_chrono()),
            my_vote,
        }
    }
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }

    let subreddit = subreddits_db::require_by_name(&state.db, &request.subreddit).await?;

    if subreddit.is_banned(&user.username) {
        return Err(ApiError::forbidden("You are banned from this subreddit"));
    }
    if subreddit.is_muted(&user.username) {
        return Err(ApiError::forbidden("You are muted in this subreddit"));
    }
    // Public subreddits accept posts from anyone; otherwise members only
    if subreddit.privacy != Privacy::Public && !subreddit.is_member(&user.username) {
        return Err(ApiError::forbidden("Only members can post here"));
    }

    let mut options = Vec::new();
    let mut poll_closes_at = None;
    match request.kind {
        PostKind::Poll => {
            if request.options.len() < 2 {
                return Err(ApiError::bad_request("A poll needs at least two options"));
            }
            options = request
                .options
                .into_iter()
                .map(|text| PollOption {
                    text,
                    voters: Vec::new(),
                })
                .collect();
            if let Some(days) = request.poll_duration_days {
                if !(1..=31).contains(&days) {
                    return Err(ApiError::bad_request("Poll duration must be 1-31 days"));
                }
                poll_closes_at = Some(mongodb::bson::DateTime::from_chrono(
                    Utc::now() + Duration::days(days),
                ));
            }
        }
        PostKind::Link => {
            if request.link_url.as_deref().map(str::is_empty).unwrap_or(true) {
                return Err(ApiError::bad_request("A link post needs a URL"));
            }
        }
        PostKind::Media => {
            if request.media_url.as_deref().map(str::is_empty).unwrap_or(true) {
                return Err(ApiError::bad_request("A media post needs an uploaded file"));
            }
        }
        PostKind::Post => {}
    }

    let post = db::insert(
        &state.db,
        PostDoc {
            id: None,
            title: request.title,
            content: request.content,
            kind: request.kind,
            author_name: user.username.clone(),
            subreddit: subreddit.name,
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            options,
            poll_closes_at,
            link_url: request.link_url,
            media_url: request.media_url,
            nsfw: request.nsfw,
            spoiler: request.spoiler,
            locked: false,
            created_at: Utc::now(),
            edited_at: None,
        },
    )
    .await?;

    tracing::info!("post created in r/{} by {}", post.subreddit, post.author_name);
    Ok(Json(PostResponse::build(&post, Some(&user))))
}

pub async fn get_post(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<PostResponse>> {
    let id = parse_object_id(&id)?;
    let post = db::require_by_id(&state.db, id).await?;

    if let Some(user) = &viewer {
        users::record_recent_post(&state.db, &user.username, id).await?;
    }

    Ok(Json(PostResponse::build(&post, viewer.as_ref())))
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub subreddit: Option<String>,
    #[serde(default)]
    pub sort: FeedSort,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

pub async fn get_feed(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(params): Query<FeedParams>,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let limit = params.limit.unwrap_or(25).clamp(1, 100);
    let skip = params.offset.unwrap_or(0);
    let hidden = viewer
        .as_ref()
        .map(|u| u.hidden_posts.clone())
        .unwrap_or_default();

    let posts = db::feed(
        &state.db,
        params.subreddit.as_deref(),
        params.sort,
        limit,
        skip,
        &hidden,
    )
    .await?;

    Ok(Json(
        posts
            .iter()
            .map(|p| PostResponse::build(p, viewer.as_ref()))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct EditPostRequest {
    pub content: String,
}

pub async fn edit_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<EditPostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let id = parse_object_id(&id)?;
    let post = db::require_by_id(&state.db, id).await?;

    if post.author_name != user.username {
        return Err(ApiError::forbidden("Only the author can edit a post"));
    }
    if post.locked {
        return Err(ApiError::forbidden("This post is locked"));
    }

    db::update_content(&state.db, id, &request.content).await?;
    let post = db::require_by_id(&state.db, id).await?;
    Ok(Json(PostResponse::build(&post, Some(&user))))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    let post = db::require_by_id(&state.db, id).await?;
    let subreddit = subreddits_db::require_by_name(&state.db, &post.subreddit).await?;

    if post.author_name != user.username && !can_moderate(&user, &subreddit) {
        return Err(ApiError::forbidden("Not allowed to delete this post"));
    }

    db::delete(&state.db, id).await?;
    let removed = crate::comments::db::delete_by_post(&state.db, id).await?;
    tracing::info!(
        "post {} deleted by {} ({} comments removed)",
        id.to_hex(),
        user.username,
        removed
    );
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Voting
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub upvotes: i64,
    pub downvotes: i64,
    pub my_vote: Option<VoteDirection>,
}

pub async fn vote_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<Json<VoteResponse>> {
    let id = parse_object_id(&id)?;
    let post = db::require_by_id(&state.db, id).await?;

    let item = ItemRef {
        item_id: id,
        item_type: ItemKind::Post,
    };
    let current = user.vote_state(&id, ItemKind::Post);
    let outcome = apply_vote(current, request.direction);

    let applied =
        users::apply_vote_transition(&state.db, &user.username, &item, current, outcome.new_state)
            .await?;
    if !applied {
        // A concurrent identical request already moved the arrays; the
        // counters and karma were adjusted exactly once by that request.
        return Ok(Json(VoteResponse {
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            my_vote: outcome.new_state,
        }));
    }
    db::apply_vote_counters(&state.db, id, outcome.up_delta, outcome.down_delta).await?;
    users::adjust_karma(
        &state.db,
        &post.author_name,
        ItemKind::Post,
        outcome.karma_delta(),
    )
    .await?;

    // Only a fresh upvote notifies, and never the voter themselves
    if outcome.is_first_upvote() {
        notify(
            &state.db,
            &state.realtime,
            &post.author_name,
            "vote",
            "Your post was upvoted".to_string(),
            format!("{} upvoted \"{}\"", user.username, post.title),
            &NotificationContext {
                actor: &user.username,
                subreddit: Some(&post.subreddit),
                post_id: Some(id),
                comment_id: None,
            },
        )
        .await?;
    }

    Ok(Json(VoteResponse {
        upvotes: post.upvotes + outcome.up_delta,
        downvotes: post.downvotes + outcome.down_delta,
        my_vote: outcome.new_state,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PollVoteRequest {
    /// Index into the poll's options
    pub option: usize,
}

pub async fn vote_poll(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<PollVoteRequest>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    let post = db::require_by_id(&state.db, id).await?;

    if post.kind != PostKind::Poll {
        return Err(ApiError::bad_request("Not a poll"));
    }
    if post.locked {
        return Err(ApiError::forbidden("This post is locked"));
    }
    if post.poll_closed() {
        return Err(ApiError::bad_request("This poll has closed"));
    }
    if request.option >= post.options.len() {
        return Err(ApiError::bad_request("No such poll option"));
    }

    db::cast_poll_vote(&state.db, id, request.option, &user.username).await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Viewer lists and flags
// ---------------------------------------------------------------------------

pub async fn hide_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    db::require_by_id(&state.db, id).await?;
    users::add_to_set(&state.db, &user.username, "hidden_posts", Bson::ObjectId(id)).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn unhide_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    users::pull_from_set(&state.db, &user.username, "hidden_posts", Bson::ObjectId(id)).await?;
    Ok(Json(json!({ "success": true })))
}

async fn save_item(state: &AppState, username: &str, item: ItemRef, save: bool) -> ApiResult<()> {
    let value = to_bson(&item).map_err(ApiError::from)?;
    if save {
        users::add_to_set(&state.db, username, "saved_items", value).await
    } else {
        users::pull_from_set(&state.db, username, "saved_items", value).await
    }
}

pub async fn save_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    db::require_by_id(&state.db, id).await?;
    save_item(
        &state,
        &user.username,
        ItemRef {
            item_id: id,
            item_type: ItemKind::Post,
        },
        true,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn unsave_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    save_item(
        &state,
        &user.username,
        ItemRef {
            item_id: id,
            item_type: ItemKind::Post,
        },
        false,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

/// Lock/unlock: moderators and admins only
async fn set_locked(state: &AppState, user: &UserDoc, id: &str, locked: bool) -> ApiResult<Json<Value>> {
    let id = parse_object_id(id)?;
    let post = db::require_by_id(&state.db, id).await?;
    let subreddit = subreddits_db::require_by_name(&state.db, &post.subreddit).await?;

    if !can_moderate(user, &subreddit) {
        return Err(ApiError::forbidden("Only moderators can lock posts"));
    }

    db::set_flag(&state.db, id, "locked", locked).await?;
    Ok(Json(json!({ "success": true, "locked": locked })))
}

pub async fn lock_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    set_locked(&state, &user, &id, true).await
}

pub async fn unlock_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    set_locked(&state, &user, &id, false).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostFlag {
    Spoiler,
    Nsfw,
}

impl PostFlag {
    fn field(self) -> &'static str {
        match self {
            PostFlag::Spoiler => "spoiler",
            PostFlag::Nsfw => "nsfw",
        }
    }

    fn current(self, post: &PostDoc) -> bool {
        match self {
            PostFlag::Spoiler => post.spoiler,
            PostFlag::Nsfw => post.nsfw,
        }
    }
}

/// Flips a post flag; author or moderator only.
async fn toggle_flag(state: &AppState, user: &UserDoc, id: &str, flag: PostFlag) -> ApiResult<Json<Value>> {
    let id = parse_object_id(id)?;
    let post = db::require_by_id(&state.db, id).await?;
    let subreddit = subreddits_db::require_by_name(&state.db, &post.subreddit).await?;

    if post.author_name != user.username && !can_moderate(user, &subreddit) {
        return Err(ApiError::forbidden("Not allowed to change this post"));
    }

    let enabled = !flag.current(&post);
    db::set_flag(&state.db, id, flag.field(), enabled).await?;

    let mut body = json!({ "success": true });
    body[flag.field()] = json!(enabled);
    Ok(Json(body))
}

pub async fn toggle_spoiler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    toggle_flag(&state, &user, &id, PostFlag::Spoiler).await
}

pub async fn toggle_nsfw(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    toggle_flag(&state, &user, &id, PostFlag::Nsfw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_post() -> PostDoc {
        PostDoc {
            id: Some(ObjectId::new()),
            title: "hello".to_string(),
            content: None,
            kind: PostKind::Post,
            author_name: "alice".to_string(),
            subreddit: "rust".to_string(),
            upvotes: 3,
            downvotes: 1,
            comment_count: 0,
            options: Vec::new(),
            poll_closes_at: None,
            link_url: None,
            media_url: None,
            nsfw: false,
            spoiler: true,
            locked: false,
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    #[test]
    fn test_post_flag_reads_its_own_field() {
        let post = text_post();
        assert!(PostFlag::Spoiler.current(&post));
        assert!(!PostFlag::Nsfw.current(&post));
        assert_eq!(PostFlag::Spoiler.field(), "spoiler");
        assert_eq!(PostFlag::Nsfw.field(), "nsfw");
    }

    #[test]
    fn test_vote_response_shape() {
        let voted = VoteResponse {
            upvotes: 4,
            downvotes: 1,
            my_vote: Some(VoteDirection::Up),
        };
        assert_eq!(
            serde_json::to_value(&voted).unwrap(),
            json!({ "upvotes": 4, "downvotes": 1, "my_vote": "up" })
        );

        let retracted = VoteResponse {
            upvotes: 3,
            downvotes: 1,
            my_vote: None,
        };
        assert_eq!(
            serde_json::to_value(&retracted).unwrap(),
            json!({ "upvotes": 3, "downvotes": 1, "my_vote": null })
        );
    }
}
