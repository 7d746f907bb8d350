/**
 * Comment Collection
 *
 * Flat comments under a post. The subreddit name is denormalized onto each
 * comment so moderation and search never need the post document.
 */

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub content: String,
    pub author_name: String,
    pub post_id: ObjectId,
    pub subreddit: String,
    pub upvotes: i64,
    pub downvotes: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<mongodb::bson::DateTime>,
}

impl CommentDoc {
    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }
}

pub fn collection(db: &Database) -> Collection<CommentDoc> {
    db.collection("comments")
}

pub async fn insert(db: &Database, mut comment: CommentDoc) -> ApiResult<CommentDoc> {
    let result = collection(db).insert_one(&comment, None).await?;
    comment.id = result.inserted_id.as_object_id();
    Ok(comment)
}

pub async fn find_by_id(db: &Database, id: ObjectId) -> ApiResult<Option<CommentDoc>> {
    Ok(collection(db).find_one(doc! { "_id": id }, None).await?)
}

pub async fn require_by_id(db: &Database, id: ObjectId) -> ApiResult<CommentDoc> {
    find_by_id(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))
}

/// Newest first.
pub async fn list_for_post(
    db: &Database,
    post_id: ObjectId,
    limit: i64,
    skip: u64,
) -> ApiResult<Vec<CommentDoc>> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .skip(skip)
        .limit(limit)
        .build();
    let cursor = collection(db)
        .find(doc! { "post_id": post_id }, options)
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn list_by_author(db: &Database, author: &str, limit: i64) -> ApiResult<Vec<CommentDoc>> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .limit(limit)
        .build();
    let cursor = collection(db)
        .find(doc! { "author_name": author }, options)
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn find_by_ids(db: &Database, ids: &[ObjectId]) -> ApiResult<Vec<CommentDoc>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let id_list: Vec<Bson> = ids.iter().map(|id| Bson::ObjectId(*id)).collect();
    let cursor = collection(db)
        .find(doc! { "_id": { "$in": id_list } }, None)
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn update_content(db: &Database, id: ObjectId, content: &str) -> ApiResult<()> {
    collection(db)
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "content": content,
                "edited_at": mongodb::bson::DateTime::now(),
            }},
            None,
        )
        .await?;
    Ok(())
}

pub async fn delete(db: &Database, id: ObjectId) -> ApiResult<()> {
    collection(db).delete_one(doc! { "_id": id }, None).await?;
    Ok(())
}

/// Removes every comment under a post; returns how many went.
pub async fn delete_by_post(db: &Database, post_id: ObjectId) -> ApiResult<u64> {
    let result = collection(db)
        .delete_many(doc! { "post_id": post_id }, None)
        .await?;
    Ok(result.deleted_count)
}

pub async fn apply_vote_counters(
    db: &Database,
    id: ObjectId,
    up_delta: i64,
    down_delta: i64,
) -> ApiResult<()> {
    collection(db)
        .update_one(
            doc! { "_id": id },
            doc! { "$inc": { "upvotes": up_delta, "downvotes": down_delta } },
            None,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn comment(up: i64, down: i64) -> CommentDoc {
        CommentDoc {
            id: None,
            content: "hello".into(),
            author_name: "alice".into(),
            post_id: ObjectId::new(),
            subreddit: "rust".into(),
            upvotes: up,
            downvotes: down,
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    #[test]
    fn score_subtracts_downvotes() {
        assert_eq!(comment(7, 3).score(), 4);
        assert_eq!(comment(0, 2).score(), -2);
    }

    #[test]
    fn new_comment_omits_id_and_edited_at_in_bson() {
        let doc = mongodb::bson::to_document(&comment(0, 0)).unwrap();
        assert!(!doc.contains_key("_id"));
        assert!(!doc.contains_key("edited_at"));
    }
}
