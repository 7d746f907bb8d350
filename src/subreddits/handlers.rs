/**
 * Subreddit HTTP Handlers
 *
 * Creation, membership and rules. Join/leave are idempotent; membership
 * lives both on the subreddit document (members array plus member_count)
 * and as a role entry on the user document.
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, to_bson, Bson};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::users::{self, SubredditRole, UserDoc};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::posts::db as posts_db;
use crate::posts::handlers::{FeedParams, PostResponse};
use crate::server::state::AppState;

use super::db::{self, Privacy, Rule, SubredditDoc};

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 21;

/// Subreddit names: 3-21 chars, letters/digits/underscores, letter first.
pub fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Deserialize)]
pub struct CreateSubredditRequest {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default)]
    pub nsfw: bool,
}

#[derive(Debug, Serialize)]
pub struct SubredditResponse {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator: String,
    pub privacy: Privacy,
    pub nsfw: bool,
    pub member_count: i64,
    pub rules: Vec<Rule>,
    pub moderators: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Caller-specific flags, false for anonymous viewers
    pub is_member: bool,
    pub is_moderator: bool,
}

impl SubredditResponse {
    pub fn build(subreddit: &SubredditDoc, viewer: Option<&UserDoc>) -> Self {
        let name = viewer.map(|u| u.username.as_str());
        Self {
            name: subreddit.name.clone(),
            title: subreddit.title.clone(),
            description: subreddit.description.clone(),
            creator: subreddit.creator.clone(),
            privacy: subreddit.privacy,
            nsfw: subreddit.nsfw,
            member_count: subreddit.member_count,
            rules: subreddit.rules.clone(),
            moderators: subreddit
                .moderators
                .iter()
                .map(|m| m.username.clone())
                .collect(),
            created_at: subreddit.created_at,
            is_member: name.map(|n| subreddit.is_member(n)).unwrap_or(false),
            is_moderator: name.map(|n| subreddit.is_moderator(n)).unwrap_or(false),
        }
    }
}

pub async fn create_subreddit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateSubredditRequest>,
) -> ApiResult<Json<SubredditResponse>> {
    if !is_valid_name(&request.name) {
        return Err(ApiError::bad_request(
            "Subreddit names are 3-21 letters, digits or underscores and start with a letter",
        ));
    }

    let subreddit = db::create(
        &state.db,
        request.name,
        request.title,
        request.description,
        request.privacy,
        request.nsfw,
        &user.username,
    )
    .await?;

    let role = to_bson(&SubredditRole {
        subreddit: subreddit.name.clone(),
        role: "moderator".to_string(),
    })
    .map_err(ApiError::from)?;
    users::add_to_set(&state.db, &user.username, "subreddits", role).await?;

    tracing::info!("subreddit r/{} created by {}", subreddit.name, user.username);
    Ok(Json(SubredditResponse::build(&subreddit, Some(&user))))
}

pub async fn get_subreddit(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(name): Path<String>,
) -> ApiResult<Json<SubredditResponse>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;
    Ok(Json(SubredditResponse::build(&subreddit, viewer.as_ref())))
}

pub async fn join_subreddit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;

    if subreddit.privacy == Privacy::Private {
        return Err(ApiError::forbidden("This subreddit is private"));
    }
    if subreddit.is_banned(&user.username) {
        return Err(ApiError::forbidden("You are banned from this subreddit"));
    }

    let joined = db::add_member(&state.db, &subreddit.name, &user.username).await?;
    if joined {
        let role = to_bson(&SubredditRole {
            subreddit: subreddit.name.clone(),
            role: "member".to_string(),
        })
        .map_err(ApiError::from)?;
        users::add_to_set(&state.db, &user.username, "subreddits", role).await?;
    }

    Ok(Json(json!({ "success": true, "joined": joined })))
}

pub async fn leave_subreddit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;

    let left = db::remove_member(&state.db, &subreddit.name, &user.username).await?;
    if left {
        users::pull_from_set(
            &state.db,
            &user.username,
            "subreddits",
            Bson::Document(doc! { "subreddit": &subreddit.name }),
        )
        .await?;
    }

    Ok(Json(json!({ "success": true, "left": left })))
}

pub async fn subreddit_posts(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(name): Path<String>,
    Query(params): Query<FeedParams>,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;

    let limit = params.limit.unwrap_or(25).clamp(1, 100);
    let skip = params.offset.unwrap_or(0);
    let hidden = viewer
        .as_ref()
        .map(|u| u.hidden_posts.clone())
        .unwrap_or_default();

    let posts = posts_db::feed(
        &state.db,
        Some(&subreddit.name),
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
pub struct AddRuleRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn add_rule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
    Json(request): Json<AddRuleRequest>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;
    if !user.is_admin() && !subreddit.is_moderator(&user.username) {
        return Err(ApiError::forbidden("Only moderators can edit rules"));
    }
    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("A rule needs a title"));
    }

    db::add_rule(
        &state.db,
        &subreddit.name,
        Rule {
            title: request.title,
            description: request.description,
        },
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn remove_rule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((name, index)): Path<(String, usize)>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;
    if !user.is_admin() && !subreddit.is_moderator(&user.username) {
        return Err(ApiError::forbidden("Only moderators can edit rules"));
    }

    db::remove_rule(&state.db, &subreddit.name, index).await?;
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn name_validation() {
        assert!(is_valid_name("rustlang"));
        assert!(is_valid_name("ask_anything21"));
        assert!(!is_valid_name("ab"));
        assert!(!is_valid_name("1rust"));
        assert!(!is_valid_name("_rust"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("way_too_long_for_a_subreddit_name"));
    }

    #[test]
    fn response_flags_follow_the_viewer() {
        use super::super::db::{MemberEntry, ModeratorEntry};
        use crate::auth::users::{NotificationSettings, ACCESS_USER};
        use mongodb::bson::oid::ObjectId;

        let now = Utc::now();
        let subreddit = SubredditDoc {
            id: Some(ObjectId::new()),
            name: "rust".to_string(),
            title: None,
            description: None,
            creator: "alice".to_string(),
            members: vec![MemberEntry {
                username: "alice".to_string(),
                joined_at: now,
            }],
            moderators: vec![ModeratorEntry {
                username: "alice".to_string(),
                invited_by: None,
                joined_at: now,
            }],
            muted_users: Vec::new(),
            banned_users: Vec::new(),
            rules: Vec::new(),
            privacy: Privacy::Public,
            nsfw: false,
            member_count: 1,
            created_at: now,
        };
        let viewer = UserDoc {
            id: Some(ObjectId::new()),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: None,
            access: ACCESS_USER.to_string(),
            display_name: None,
            about: None,
            avatar_url: None,
            post_karma: 0,
            comment_karma: 0,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            subreddits: Vec::new(),
            followers: Vec::new(),
            followings: Vec::new(),
            blocked_users: Vec::new(),
            hidden_posts: Vec::new(),
            saved_items: Vec::new(),
            recent_posts: Vec::new(),
            notification_settings: NotificationSettings::default(),
            created_at: now,
        };

        let response = SubredditResponse::build(&subreddit, Some(&viewer));
        assert_eq!(response.is_member, true);
        assert_eq!(response.is_moderator, true);

        let anonymous = SubredditResponse::build(&subreddit, None);
        assert_eq!(anonymous.is_member, false);
    }
}
