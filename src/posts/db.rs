/**
 * Post Documents and Database Operations
 *
 * Posts carry denormalised vote counters (`upvotes`/`downvotes`); the
 * per-user vote state lives on the user document. Counter changes and
 * poll votes are expressed as atomic update operators so concurrent votes
 * cannot lose increments.
 *
 * Feed sorting:
 * - `new` - creation time, newest first
 * - `top` - score (upvotes - downvotes), all time
 * - `hot` - score over the last seven days, recency breaking ties
 */

use chrono::{DateTime, Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{doc, from_document, Document};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Post,
    Poll,
    Media,
    Link,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    #[serde(default)]
    pub voters: Vec<String>,
}

/// Feed sort order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSort {
    #[default]
    New,
    Top,
    Hot,
}

/// A post document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    pub kind: PostKind,
    pub author_name: String,
    pub subreddit: String,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub comment_count: i64,
    /// Poll options (empty for non-poll posts)
    #[serde(default)]
    pub options: Vec<PollOption>,
    /// Poll voting deadline
    #[serde(default)]
    pub poll_closes_at: Option<mongodb::bson::DateTime>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub spoiler: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<mongodb::bson::DateTime>,
}

impl PostDoc {
    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }

    pub fn poll_closed(&self) -> bool {
        self.poll_closes_at
            .map(|deadline| deadline < mongodb::bson::DateTime::now())
            .unwrap_or(false)
    }
}

pub fn collection(db: &Database) -> Collection<PostDoc> {
    db.collection("posts")
}

pub async fn insert(db: &Database, mut post: PostDoc) -> ApiResult<PostDoc> {
    post.id = Some(ObjectId::new());
    let result = collection(db).insert_one(&post, None).await?;
    post.id = result.inserted_id.as_object_id();
    Ok(post)
}

pub async fn find_by_id(db: &Database, id: ObjectId) -> ApiResult<Option<PostDoc>> {
    Ok(collection(db).find_one(doc! { "_id": id }, None).await?)
}

pub async fn require_by_id(db: &Database, id: ObjectId) -> ApiResult<PostDoc> {
    find_by_id(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

/// Fetch a feed page
///
/// `hidden` is the viewer's hidden-post list; those ids are excluded
/// server-side so hiding works across pagination.
pub async fn feed(
    db: &Database,
    subreddit: Option<&str>,
    sort: FeedSort,
    limit: i64,
    skip: u64,
    hidden: &[ObjectId],
) -> ApiResult<Vec<PostDoc>> {
    let mut filter = Document::new();
    if let Some(name) = subreddit {
        filter.insert("subreddit", name);
    }
    if !hidden.is_empty() {
        filter.insert("_id", doc! { "$nin": hidden.to_vec() });
    }

    match sort {
        FeedSort::New => {
            let options = FindOptions::builder()
                .sort(doc! { "created_at": -1 })
                .skip(skip)
                .limit(limit)
                .build();
            Ok(collection(db).find(filter, options).await?.try_collect().await?)
        }
        FeedSort::Top | FeedSort::Hot => {
            if sort == FeedSort::Hot {
                // Hot only considers the last week
                let cutoff = Utc::now() - Duration::days(7);
                filter.insert(
                    "created_at",
                    doc! { "$gt": mongodb::bson::DateTime::from_chrono(cutoff) },
                );
            }
            let pipeline = vec![
                doc! { "$match": filter },
                doc! { "$addFields": { "score": { "$subtract": ["$upvotes", "$downvotes"] } } },
                doc! { "$sort": { "score": -1, "created_at": -1 } },
                doc! { "$skip": skip as i64 },
                doc! { "$limit": limit },
            ];
            let documents: Vec<Document> = db
                .collection::<Document>("posts")
                .aggregate(pipeline, None)
                .await?
                .try_collect()
                .await?;
            documents
                .into_iter()
                .map(|d| from_document(d).map_err(Into::into))
                .collect()
        }
    }
}

/// Posts by an author, newest first (profile pages)
pub async fn find_by_author(db: &Database, author: &str, limit: i64) -> ApiResult<Vec<PostDoc>> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .limit(limit)
        .build();
    Ok(collection(db)
        .find(doc! { "author_name": author }, options)
        .await?
        .try_collect()
        .await?)
}

/// Resolve a list of ids to documents (saved/upvoted listings)
pub async fn find_by_ids(db: &Database, ids: &[ObjectId]) -> ApiResult<Vec<PostDoc>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(collection(db)
        .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
        .await?
        .try_collect()
        .await?)
}

/// Replace a post's content and stamp the edit time
pub async fn update_content(db: &Database, id: ObjectId, content: &str) -> ApiResult<()> {
    collection(db)
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "content": content, "edited_at": mongodb::bson::DateTime::now() } },
            None,
        )
        .await?;
    Ok(())
}

pub async fn delete(db: &Database, id: ObjectId) -> ApiResult<()> {
    collection(db).delete_one(doc! { "_id": id }, None).await?;
    Ok(())
}

/// Apply vote counter deltas atomically
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

pub async fn inc_comment_count(db: &Database, id: ObjectId, delta: i64) -> ApiResult<()> {
    collection(db)
        .update_one(
            doc! { "_id": id },
            doc! { "$inc": { "comment_count": delta } },
            None,
        )
        .await?;
    Ok(())
}

/// Set a boolean flag (nsfw / spoiler / locked)
pub async fn set_flag(db: &Database, id: ObjectId, field: &str, value: bool) -> ApiResult<()> {
    collection(db)
        .update_one(doc! { "_id": id }, doc! { "$set": { field: value } }, None)
        .await?;
    Ok(())
}

/// Move a user's poll vote to the option at `index`
///
/// The voter is removed from every option first, so switching options
/// moves the vote rather than adding a second one.
pub async fn cast_poll_vote(
    db: &Database,
    id: ObjectId,
    index: usize,
    username: &str,
) -> ApiResult<()> {
    let coll = collection(db);
    coll.update_one(
        doc! { "_id": id },
        doc! { "$pull": { "options.$[].voters": username } },
        None,
    )
    .await?;
    coll.update_one(
        doc! { "_id": id },
        doc! { "$addToSet": { format!("options.{index}.voters"): username } },
        None,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_score() {
        let post = PostDoc {
            id: None,
            title: "t".to_string(),
            content: None,
            kind: PostKind::Post,
            author_name: "alice".to_string(),
            subreddit: "rust".to_string(),
            upvotes: 10,
            downvotes: 3,
            comment_count: 0,
            options: Vec::new(),
            poll_closes_at: None,
            link_url: None,
            media_url: None,
            nsfw: false,
            spoiler: false,
            locked: false,
            created_at: Utc::now(),
            edited_at: None,
        };
        assert_eq!(post.score(), 7);
    }

    #[test]
    fn test_poll_deadline() {
        let mut post = PostDoc {
            id: None,
            title: "poll".to_string(),
            content: None,
            kind: PostKind::Poll,
            author_name: "alice".to_string(),
            subreddit: "rust".to_string(),
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            options: Vec::new(),
            poll_closes_at: None,
            link_url: None,
            media_url: None,
            nsfw: false,
            spoiler: false,
            locked: false,
            created_at: Utc::now(),
            edited_at: None,
        };
        assert!(!post.poll_closed());

        post.poll_closes_at = Some(mongodb::bson::DateTime::from_chrono(
            Utc::now() - Duration::hours(1),
        ));
        assert!(post.poll_closed());

        post.poll_closes_at = Some(mongodb::bson::DateTime::from_chrono(
            Utc::now() + Duration::hours(1),
        ));
        assert!(!post.poll_closed());
    }

    #[test]
    fn test_feed_sort_parses_from_query() {
        let sort: FeedSort = serde_json::from_str("\"hot\"").unwrap();
        assert_eq!(sort, FeedSort::Hot);
        assert_eq!(FeedSort::default(), FeedSort::New);
    }
}
