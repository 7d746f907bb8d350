/**
 * Moderation: invitations, bans and mutes
 *
 * Moderator invitations are their own collection so a pending invite
 * survives restarts and can be declined. Bans remove the user from the
 * member list in the same request; moderators cannot be banned.
 */

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::doc;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::users::{self, SubredditRole, UserDoc};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::notifications::{notify, NotificationContext};
use crate::posts::handlers::parse_object_id;
use crate::server::state::AppState;

use super::db::{self, SubredditDoc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvitationDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub subreddit: String,
    pub inviter: String,
    pub invitee: String,
    pub status: InvitationStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

pub fn invitations(db: &Database) -> Collection<InvitationDoc> {
    db.collection("invitations")
}

fn require_moderator(user: &UserDoc, subreddit: &SubredditDoc) -> ApiResult<()> {
    if user.is_admin() || subreddit.is_moderator(&user.username) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only moderators can do that"))
    }
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub username: String,
}

pub async fn invite_moderator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
    Json(request): Json<InviteRequest>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;
    require_moderator(&user, &subreddit)?;

    let invitee = users::require_by_username(&state.db, &request.username).await?;
    if subreddit.is_moderator(&invitee.username) {
        return Err(ApiError::conflict("Already a moderator"));
    }

    let pending = invitations(&state.db)
        .find_one(
            doc! {
                "subreddit": &subreddit.name,
                "invitee": &invitee.username,
                "status": "pending",
            },
            None,
        )
        .await?;
    if pending.is_some() {
        return Err(ApiError::conflict("An invitation is already pending"));
    }

    let invitation = InvitationDoc {
        id: None,
        subreddit: subreddit.name.clone(),
        inviter: user.username.clone(),
        invitee: invitee.username.clone(),
        status: InvitationStatus::Pending,
        created_at: Utc::now(),
    };
    let result = invitations(&state.db).insert_one(&invitation, None).await?;
    let invitation_id = result.inserted_id.as_object_id();

    notify(
        &state.db,
        &state.realtime,
        &invitee.username,
        "mod_invite",
        format!("Moderator invitation for r/{}", subreddit.name),
        format!(
            "{} invited you to moderate r/{}",
            user.username, subreddit.name
        ),
        &NotificationContext {
            actor: &user.username,
            subreddit: Some(&subreddit.name),
            post_id: None,
            comment_id: None,
        },
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "invitation_id": invitation_id.map(|id| id.to_hex()),
    })))
}

async fn resolve_invitation(
    state: &AppState,
    user: &UserDoc,
    id: &str,
    accept: bool,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(id)?;
    let invitation = invitations(&state.db)
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Invitation not found"))?;

    if invitation.invitee != user.username {
        return Err(ApiError::forbidden("This invitation is not for you"));
    }
    if invitation.status != InvitationStatus::Pending {
        return Err(ApiError::conflict("Invitation already resolved"));
    }

    let status = if accept { "accepted" } else { "declined" };
    invitations(&state.db)
        .update_one(
            doc! { "_id": id, "status": "pending" },
            doc! { "$set": { "status": status } },
            None,
        )
        .await?;

    if accept {
        db::add_member(&state.db, &invitation.subreddit, &user.username).await?;
        db::add_moderator(
            &state.db,
            &invitation.subreddit,
            &user.username,
            Some(&invitation.inviter),
        )
        .await?;
        // Replace any member-role entry on the user document
        users::pull_from_set(
            &state.db,
            &user.username,
            "subreddits",
            mongodb::bson::Bson::Document(doc! { "subreddit": &invitation.subreddit }),
        )
        .await?;
        let role = mongodb::bson::to_bson(&SubredditRole {
            subreddit: invitation.subreddit.clone(),
            role: "moderator".to_string(),
        })
        .map_err(ApiError::from)?;
        users::add_to_set(&state.db, &user.username, "subreddits", role).await?;
        tracing::info!(
            "{} accepted a moderator invitation for r/{}",
            user.username,
            invitation.subreddit
        );
    }

    Ok(Json(json!({ "success": true, "status": status })))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    resolve_invitation(&state, &user, &id, true).await
}

pub async fn decline_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    resolve_invitation(&state, &user, &id, false).await
}

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub id: String,
    pub subreddit: String,
    pub inviter: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&InvitationDoc> for InvitationResponse {
    fn from(invitation: &InvitationDoc) -> Self {
        Self {
            id: invitation.id.map(|id| id.to_hex()).unwrap_or_default(),
            subreddit: invitation.subreddit.clone(),
            inviter: invitation.inviter.clone(),
            status: invitation.status,
            created_at: invitation.created_at,
        }
    }
}

/// The caller's pending invitations.
pub async fn list_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<InvitationResponse>>> {
    let cursor = invitations(&state.db)
        .find(
            doc! { "invitee": &user.username, "status": "pending" },
            None,
        )
        .await?;
    let pending: Vec<InvitationDoc> = cursor.try_collect().await?;
    Ok(Json(pending.iter().map(InvitationResponse::from).collect()))
}

// ---------------------------------------------------------------------------
// Bans and mutes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub username: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn ban_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
    Json(request): Json<BanRequest>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;
    require_moderator(&user, &subreddit)?;

    if subreddit.is_moderator(&request.username) {
        return Err(ApiError::forbidden("Moderators cannot be banned"));
    }

    db::ban_user(&state.db, &subreddit.name, &request.username, request.reason).await?;
    users::pull_from_set(
        &state.db,
        &request.username,
        "subreddits",
        mongodb::bson::Bson::Document(doc! { "subreddit": &subreddit.name }),
    )
    .await?;
    tracing::info!(
        "{} banned from r/{} by {}",
        request.username,
        subreddit.name,
        user.username
    );
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub username: String,
}

pub async fn unban_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
    Json(request): Json<TargetRequest>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;
    require_moderator(&user, &subreddit)?;

    db::unban_user(&state.db, &subreddit.name, &request.username).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn mute_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
    Json(request): Json<TargetRequest>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;
    require_moderator(&user, &subreddit)?;

    if subreddit.is_moderator(&request.username) {
        return Err(ApiError::forbidden("Moderators cannot be muted"));
    }

    db::set_muted(&state.db, &subreddit.name, &request.username, true).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn unmute_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
    Json(request): Json<TargetRequest>,
) -> ApiResult<Json<Value>> {
    let subreddit = db::require_by_name(&state.db, &name).await?;
    require_moderator(&user, &subreddit)?;

    db::set_muted(&state.db, &subreddit.name, &request.username, false).await?;
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invitation_status_serializes_snake_case() {
        let doc = mongodb::bson::to_bson(&InvitationStatus::Pending).unwrap();
        assert_eq!(doc, mongodb::bson::Bson::String("pending".to_string()));
    }
}
