/**
 * User Documents and Database Operations
 *
 * The `users` collection is the widest document in the system: besides
 * credentials it carries the denormalised state the original data model
 * keeps on the user - vote arrays, subreddit memberships, follower lists,
 * saved/hidden items and notification suppression lists.
 *
 * Usernames are the join key throughout the system (posts, comments and
 * memberships reference users by name, not by ObjectId). Renaming users is
 * not an exposed operation, so the strings cannot drift.
 *
 * All mutations here are single `update_one` calls using atomic operators
 * (`$inc`, `$addToSet`, `$pull`, `$set`), so concurrent requests cannot
 * interleave a read-modify-write on a document.
 */

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::posts::voting::VoteDirection;

pub const ACCESS_USER: &str = "user";
pub const ACCESS_ADMIN: &str = "admin";

/// What kind of item a vote or saved-item reference points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Post,
    Comment,
}

/// A reference to a post or comment stored in a user array
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_id: ObjectId,
    pub item_type: ItemKind,
}

/// A subreddit membership entry on the user document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubredditRole {
    pub subreddit: String,
    pub role: String, // "member" | "moderator"
}

/// Per-user notification suppression lists
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub disabled_subreddits: Vec<String>,
    #[serde(default)]
    pub disabled_posts: Vec<ObjectId>,
    #[serde(default)]
    pub disabled_comments: Vec<ObjectId>,
}

/// A user document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    /// Absent for Google-only accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// "user" or "admin"
    pub access: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub post_karma: i64,
    #[serde(default)]
    pub comment_karma: i64,
    #[serde(default)]
    pub upvotes: Vec<ItemRef>,
    #[serde(default)]
    pub downvotes: Vec<ItemRef>,
    #[serde(default)]
    pub subreddits: Vec<SubredditRole>,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub followings: Vec<String>,
    #[serde(default)]
    pub blocked_users: Vec<String>,
    #[serde(default)]
    pub hidden_posts: Vec<ObjectId>,
    #[serde(default)]
    pub saved_items: Vec<ItemRef>,
    #[serde(default)]
    pub recent_posts: Vec<ObjectId>,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserDoc {
    pub fn is_admin(&self) -> bool {
        self.access == ACCESS_ADMIN
    }

    pub fn has_blocked(&self, username: &str) -> bool {
        self.blocked_users.iter().any(|u| u == username)
    }

    pub fn follows(&self, username: &str) -> bool {
        self.followings.iter().any(|u| u == username)
    }

    /// The user's current vote on an item, if any
    pub fn vote_state(&self, item_id: &ObjectId, kind: ItemKind) -> Option<VoteDirection> {
        let matches = |r: &ItemRef| r.item_id == *item_id && r.item_type == kind;
        if self.upvotes.iter().any(matches) {
            Some(VoteDirection::Up)
        } else if self.downvotes.iter().any(matches) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }
}

pub fn collection(db: &Database) -> Collection<UserDoc> {
    db.collection("users")
}

/// True when a driver error is a unique-index violation (code 11000)
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(e))
            if e.code == 11000
    )
}

/// Insert a new user with default lists and settings
///
/// Returns `Conflict` when the username or email unique index is hit.
pub async fn create_user(
    db: &Database,
    username: String,
    email: String,
    password_hash: Option<String>,
) -> ApiResult<UserDoc> {
    let mut user = UserDoc {
        id: Some(ObjectId::new()),
        username,
        email,
        password_hash,
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
        created_at: Utc::now(),
    };

    match collection(db).insert_one(&user, None).await {
        Ok(result) => {
            user.id = result.inserted_id.as_object_id();
            Ok(user)
        }
        Err(e) if is_duplicate_key(&e) => {
            Err(ApiError::conflict("Username or email already registered"))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn find_by_username(db: &Database, username: &str) -> ApiResult<Option<UserDoc>> {
    Ok(collection(db)
        .find_one(doc! { "username": username }, None)
        .await?)
}

pub async fn find_by_email(db: &Database, email: &str) -> ApiResult<Option<UserDoc>> {
    Ok(collection(db).find_one(doc! { "email": email }, None).await?)
}

/// Find a user or fail with 404
pub async fn require_by_username(db: &Database, username: &str) -> ApiResult<UserDoc> {
    find_by_username(db, username)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn set_password(db: &Database, username: &str, password_hash: &str) -> ApiResult<()> {
    collection(db)
        .update_one(
            doc! { "username": username },
            doc! { "$set": { "password_hash": password_hash } },
            None,
        )
        .await?;
    Ok(())
}

/// Apply a `$set` document to a user's profile fields
pub async fn update_profile(db: &Database, username: &str, set: Document) -> ApiResult<()> {
    let result = collection(db)
        .update_one(doc! { "username": username }, doc! { "$set": set }, None)
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(())
}

/// Move a user's vote arrays between states in one atomic update
///
/// `old` and `new` are the before/after vote state for the item. The filter
/// pins the prior state (old entry present, new entry absent), so of two
/// racing identical requests only one matches; returns false for the loser,
/// whose counter and karma adjustments must be skipped.
pub async fn apply_vote_transition(
    db: &Database,
    username: &str,
    item: &ItemRef,
    old: Option<VoteDirection>,
    new: Option<VoteDirection>,
) -> ApiResult<bool> {
    let item_bson = to_bson(item)?;
    let update = vote_transition_update(&item_bson, old, new);
    if update.is_empty() {
        return Ok(true);
    }

    let result = collection(db)
        .update_one(vote_transition_filter(username, &item_bson, old, new), update, None)
        .await?;
    Ok(result.modified_count == 1)
}

fn vote_transition_filter(
    username: &str,
    item: &Bson,
    old: Option<VoteDirection>,
    new: Option<VoteDirection>,
) -> Document {
    let mut filter = doc! { "username": username };
    if let Some(dir) = old {
        filter.insert(array_field(dir), item.clone());
    }
    if let Some(dir) = new {
        filter.insert(array_field(dir), doc! { "$ne": item.clone() });
    }
    filter
}

fn vote_transition_update(
    item: &Bson,
    old: Option<VoteDirection>,
    new: Option<VoteDirection>,
) -> Document {
    let mut update = Document::new();
    if let Some(dir) = old {
        update.insert("$pull", doc! { array_field(dir): item.clone() });
    }
    if let Some(dir) = new {
        update.insert("$addToSet", doc! { array_field(dir): item.clone() });
    }
    update
}

fn array_field(dir: VoteDirection) -> &'static str {
    match dir {
        VoteDirection::Up => "upvotes",
        VoteDirection::Down => "downvotes",
    }
}

/// Adjust a user's karma counter for the given item kind
pub async fn adjust_karma(db: &Database, username: &str, kind: ItemKind, delta: i64) -> ApiResult<()> {
    if delta == 0 {
        return Ok(());
    }
    let field = match kind {
        ItemKind::Post => "post_karma",
        ItemKind::Comment => "comment_karma",
    };
    collection(db)
        .update_one(
            doc! { "username": username },
            doc! { "$inc": { field: delta } },
            None,
        )
        .await?;
    Ok(())
}

/// Record a post on the user's recently-viewed list (kept to the last 20)
pub async fn record_recent_post(db: &Database, username: &str, post_id: ObjectId) -> ApiResult<()> {
    let coll = collection(db);
    // Re-viewing moves the post to the end; two updates because $pull and
    // $push cannot target the same field in one.
    coll.update_one(
        doc! { "username": username },
        doc! { "$pull": { "recent_posts": post_id } },
        None,
    )
    .await?;
    coll.update_one(
        doc! { "username": username },
        doc! { "$push": { "recent_posts": { "$each": [post_id], "$slice": -20 } } },
        None,
    )
    .await?;
    Ok(())
}

pub async fn add_to_set(db: &Database, username: &str, field: &str, value: Bson) -> ApiResult<()> {
    collection(db)
        .update_one(
            doc! { "username": username },
            doc! { "$addToSet": { field: value } },
            None,
        )
        .await?;
    Ok(())
}

pub async fn pull_from_set(db: &Database, username: &str, field: &str, value: Bson) -> ApiResult<()> {
    collection(db)
        .update_one(
            doc! { "username": username },
            doc! { "$pull": { field: value } },
            None,
        )
        .await?;
    Ok(())
}

/// Scope of a notification suppression toggle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScope {
    Subreddit,
    Post,
    Comment,
}

/// Enable or disable notifications for a subreddit, post or comment
pub async fn set_notification_scope(
    db: &Database,
    username: &str,
    scope: NotificationScope,
    value: Bson,
    enabled: bool,
) -> ApiResult<()> {
    let field = match scope {
        NotificationScope::Subreddit => "notification_settings.disabled_subreddits",
        NotificationScope::Post => "notification_settings.disabled_posts",
        NotificationScope::Comment => "notification_settings.disabled_comments",
    };
    // enabled=true removes the id from the disabled list
    let update = if enabled {
        doc! { "$pull": { field: value } }
    } else {
        doc! { "$addToSet": { field: value } }
    };
    collection(db)
        .update_one(doc! { "username": username }, update, None)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user_with_votes() -> UserDoc {
        let mut user = blank_user("alice");
        user.upvotes.push(ItemRef {
            item_id: ObjectId::parse_str("aaaaaaaaaaaaaaaaaaaaaaaa").unwrap(),
            item_type: ItemKind::Post,
        });
        user.downvotes.push(ItemRef {
            item_id: ObjectId::parse_str("bbbbbbbbbbbbbbbbbbbbbbbb").unwrap(),
            item_type: ItemKind::Comment,
        });
        user
    }

    fn blank_user(name: &str) -> UserDoc {
        UserDoc {
            id: Some(ObjectId::new()),
            username: name.to_string(),
            email: format!("{name}@example.com"),
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
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_vote_state_lookup() {
        let user = user_with_votes();
        let post_id = ObjectId::parse_str("aaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let comment_id = ObjectId::parse_str("bbbbbbbbbbbbbbbbbbbbbbbb").unwrap();

        assert_eq!(
            user.vote_state(&post_id, ItemKind::Post),
            Some(VoteDirection::Up)
        );
        assert_eq!(
            user.vote_state(&comment_id, ItemKind::Comment),
            Some(VoteDirection::Down)
        );
        // Same id, different kind: no vote
        assert_eq!(user.vote_state(&post_id, ItemKind::Comment), None);
    }

    #[test]
    fn test_access_flags() {
        let mut user = blank_user("alice");
        assert!(!user.is_admin());
        user.access = ACCESS_ADMIN.to_string();
        assert!(user.is_admin());
    }

    #[test]
    fn test_item_ref_serializes_kind_as_string() {
        let item = ItemRef {
            item_id: ObjectId::new(),
            item_type: ItemKind::Post,
        };
        let bson = to_bson(&item).unwrap();
        let doc = bson.as_document().unwrap();
        assert_eq!(doc.get_str("item_type").unwrap(), "post");
    }

    fn item_bson() -> Bson {
        to_bson(&ItemRef {
            item_id: ObjectId::parse_str("cccccccccccccccccccccccc").unwrap(),
            item_type: ItemKind::Post,
        })
        .unwrap()
    }

    #[test]
    fn test_vote_transition_filter_pins_prior_state() {
        let item = item_bson();

        // Fresh vote: the target array must not already hold the entry
        let filter = vote_transition_filter("alice", &item, None, Some(VoteDirection::Up));
        assert_eq!(filter.get_str("username").unwrap(), "alice");
        assert_eq!(filter.get_document("upvotes").unwrap().get("$ne"), Some(&item));

        // Retraction: the entry must still be there to pull
        let filter = vote_transition_filter("alice", &item, Some(VoteDirection::Up), None);
        assert_eq!(filter.get("upvotes"), Some(&item));
        assert!(!filter.contains_key("downvotes"));

        // Switch: old entry present and new entry absent, both pinned
        let filter = vote_transition_filter(
            "alice",
            &item,
            Some(VoteDirection::Up),
            Some(VoteDirection::Down),
        );
        assert_eq!(filter.get("upvotes"), Some(&item));
        assert_eq!(
            filter.get_document("downvotes").unwrap().get("$ne"),
            Some(&item)
        );
    }

    #[test]
    fn test_vote_transition_update_moves_between_arrays() {
        let item = item_bson();

        let update = vote_transition_update(&item, Some(VoteDirection::Up), Some(VoteDirection::Down));
        assert_eq!(update.get_document("$pull").unwrap().get("upvotes"), Some(&item));
        assert_eq!(
            update.get_document("$addToSet").unwrap().get("downvotes"),
            Some(&item)
        );

        let update = vote_transition_update(&item, Some(VoteDirection::Down), None);
        assert_eq!(update.get_document("$pull").unwrap().get("downvotes"), Some(&item));
        assert!(!update.contains_key("$addToSet"));

        assert!(vote_transition_update(&item, None, None).is_empty());
    }
}
