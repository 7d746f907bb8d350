/**
 * Notification Documents and Fan-out
 *
 * Notifications are flat records addressed to a username. `notify` is the
 * single entry point the rest of the crate uses: it loads the recipient,
 * applies the suppression rules, persists the notification and pushes a
 * realtime event to the recipient's SSE stream.
 */

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::auth::users;
use crate::error::{ApiError, ApiResult};
use crate::notifications::suppression::{is_suppressed, NotificationContext};
use crate::realtime::{RealtimeEvent, UserEventBroadcast};

/// A notification document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub recipient: String,
    pub title: String,
    pub body: String,
    /// "vote" | "comment" | "message" | "invite" | "follow" | "chat"
    pub kind: String,
    pub is_read: bool,
    pub is_disabled: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

pub fn collection(db: &Database) -> Collection<NotificationDoc> {
    db.collection("notifications")
}

/// Create a notification unless the recipient's settings suppress it
///
/// Returns the stored notification, or `None` when it was suppressed or
/// the recipient does not exist (deleted between lookup and fan-out).
pub async fn notify(
    db: &Database,
    realtime: &UserEventBroadcast,
    recipient: &str,
    kind: &str,
    title: String,
    body: String,
    ctx: &NotificationContext<'_>,
) -> ApiResult<Option<NotificationDoc>> {
    let Some(recipient_doc) = users::find_by_username(db, recipient).await? else {
        tracing::debug!("notification target {} not found", recipient);
        return Ok(None);
    };

    if is_suppressed(&recipient_doc, ctx) {
        tracing::debug!("notification to {} suppressed ({})", recipient, kind);
        return Ok(None);
    }

    let mut notification = NotificationDoc {
        id: Some(ObjectId::new()),
        recipient: recipient.to_string(),
        title,
        body,
        kind: kind.to_string(),
        is_read: false,
        is_disabled: false,
        created_at: Utc::now(),
    };

    let result = collection(db).insert_one(&notification, None).await?;
    notification.id = result.inserted_id.as_object_id();

    realtime.send_to(
        recipient,
        RealtimeEvent::Notification {
            id: notification.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            kind: notification.kind.clone(),
        },
    );

    Ok(Some(notification))
}

/// Newest-first notifications for a user, hidden ones excluded
pub async fn list_for_user(
    db: &Database,
    username: &str,
    limit: i64,
    skip: u64,
) -> ApiResult<Vec<NotificationDoc>> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .limit(limit)
        .skip(skip)
        .build();

    let notifications = collection(db)
        .find(doc! { "recipient": username, "is_disabled": false }, options)
        .await?
        .try_collect()
        .await?;

    Ok(notifications)
}

/// Mark one notification read; only the recipient may do so
pub async fn mark_read(db: &Database, username: &str, id: ObjectId) -> ApiResult<()> {
    let result = collection(db)
        .update_one(
            doc! { "_id": id, "recipient": username },
            doc! { "$set": { "is_read": true } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(())
}

pub async fn mark_all_read(db: &Database, username: &str) -> ApiResult<u64> {
    let result = collection(db)
        .update_many(
            doc! { "recipient": username, "is_read": false },
            doc! { "$set": { "is_read": true } },
            None,
        )
        .await?;
    Ok(result.modified_count)
}

/// Hide a notification from future listings
pub async fn disable(db: &Database, username: &str, id: ObjectId) -> ApiResult<()> {
    let result = collection(db)
        .update_one(
            doc! { "_id": id, "recipient": username },
            doc! { "$set": { "is_disabled": true } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(())
}
