/**
 * Report HTTP Handlers
 *
 * Anyone authed can file a report. Listing and triage are restricted to
 * admins, or to moderators of the subreddit the report belongs to.
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::users::UserDoc;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::posts::handlers::parse_object_id;
use crate::server::state::AppState;
use crate::subreddits::db as subreddits_db;

use super::db::{self, ReportDoc, ReportStatus, ReportTarget, ReportTargetKind};

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub reporter: String,
    pub target: ReportTarget,
    pub subreddit: Option<String>,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&ReportDoc> for ReportResponse {
    fn from(report: &ReportDoc) -> Self {
        Self {
            id: report.id.map(|id| id.to_hex()).unwrap_or_default(),
            reporter: report.reporter.clone(),
            target: report.target.clone(),
            subreddit: report.subreddit.clone(),
            reason: report.reason.clone(),
            status: report.status,
            created_at: report.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub item_id: String,
    pub item_type: ReportTargetKind,
    #[serde(default)]
    pub subreddit: Option<String>,
    pub reason: String,
}

pub async fn create_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::bad_request("A reason is required"));
    }

    // Validate the target exists and pin down the subreddit from the item
    let (item_id, subreddit) = match request.item_type {
        ReportTargetKind::Post => {
            let id = parse_object_id(&request.item_id)?;
            let post = crate::posts::db::require_by_id(&state.db, id).await?;
            (id.to_hex(), Some(post.subreddit))
        }
        ReportTargetKind::Comment => {
            let id = parse_object_id(&request.item_id)?;
            let comment = crate::comments::db::require_by_id(&state.db, id).await?;
            (id.to_hex(), Some(comment.subreddit))
        }
        ReportTargetKind::User => {
            let target = crate::auth::users::require_by_username(&state.db, &request.item_id).await?;
            (target.username, request.subreddit)
        }
    };

    let report = db::insert(
        &state.db,
        ReportDoc {
            id: None,
            reporter: user.username.clone(),
            target: ReportTarget {
                item_id,
                item_type: request.item_type,
            },
            subreddit,
            reason: request.reason,
            status: ReportStatus::Open,
            created_at: Utc::now(),
        },
    )
    .await?;

    tracing::info!("report filed by {} on a {:?}", user.username, request.item_type);
    Ok(Json(ReportResponse::from(&report)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub subreddit: Option<String>,
}

async fn check_triage_access(
    state: &AppState,
    user: &UserDoc,
    subreddit: Option<&str>,
) -> ApiResult<()> {
    if user.is_admin() {
        return Ok(());
    }
    match subreddit {
        Some(name) => {
            let subreddit = subreddits_db::require_by_name(&state.db, name).await?;
            if subreddit.is_moderator(&user.username) {
                Ok(())
            } else {
                Err(ApiError::forbidden("Moderators only"))
            }
        }
        None => Err(ApiError::forbidden("Admins only")),
    }
}

pub async fn list_reports(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<ReportResponse>>> {
    check_triage_access(&state, &user, params.subreddit.as_deref()).await?;
    let reports = db::list(&state.db, params.subreddit.as_deref()).await?;
    Ok(Json(reports.iter().map(ReportResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateReportRequest {
    pub status: ReportStatus,
}

pub async fn update_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateReportRequest>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    let report = db::require_by_id(&state.db, id).await?;

    check_triage_access(&state, &user, report.subreddit.as_deref()).await?;

    db::set_status(&state.db, id, request.status).await?;
    Ok(Json(json!({ "success": true })))
}
