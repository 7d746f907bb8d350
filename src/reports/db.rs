/**
 * Report Collection
 *
 * Reports reference their target by id and type rather than embedding it,
 * so a deleted post leaves its report trail intact. The subreddit field is
 * denormalized for moderator-scoped listings.
 */

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTargetKind {
    Post,
    Comment,
    User,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Open,
    Resolved,
    Dismissed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportTarget {
    pub item_id: String,
    pub item_type: ReportTargetKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub reporter: String,
    pub target: ReportTarget,
    #[serde(default)]
    pub subreddit: Option<String>,
    pub reason: String,
    pub status: ReportStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

pub fn collection(db: &Database) -> Collection<ReportDoc> {
    db.collection("reports")
}

pub async fn insert(db: &Database, mut report: ReportDoc) -> ApiResult<ReportDoc> {
    let result = collection(db).insert_one(&report, None).await?;
    report.id = result.inserted_id.as_object_id();
    Ok(report)
}

pub async fn require_by_id(db: &Database, id: ObjectId) -> ApiResult<ReportDoc> {
    collection(db)
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))
}

/// Newest first; optionally scoped to one subreddit.
pub async fn list(db: &Database, subreddit: Option<&str>) -> ApiResult<Vec<ReportDoc>> {
    let mut filter = doc! {};
    if let Some(name) = subreddit {
        filter.insert("subreddit", name);
    }
    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let cursor = collection(db).find(filter, options).await?;
    Ok(cursor.try_collect().await?)
}

pub async fn set_status(db: &Database, id: ObjectId, status: ReportStatus) -> ApiResult<()> {
    let status = mongodb::bson::to_bson(&status)?;
    collection(db)
        .update_one(doc! { "_id": id }, doc! { "$set": { "status": status } }, None)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_serializes_snake_case() {
        let bson = mongodb::bson::to_bson(&ReportStatus::Dismissed).unwrap();
        assert_eq!(bson, mongodb::bson::Bson::String("dismissed".to_string()));
    }

    #[test]
    fn target_round_trips_through_bson() {
        let target = ReportTarget {
            item_id: ObjectId::new().to_hex(),
            item_type: ReportTargetKind::Comment,
        };
        let doc = mongodb::bson::to_document(&target).unwrap();
        let back: ReportTarget = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(back.item_type, ReportTargetKind::Comment);
        assert_eq!(back.item_id, target.item_id);
    }
}
