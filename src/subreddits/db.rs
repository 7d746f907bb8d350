/**
 * Subreddit Documents and Database Operations
 *
 * Members, moderators, bans and mutes are embedded sub-documents keyed by
 * username. Membership changes use guarded updates (filter excludes the
 * username, update pushes it and bumps `member_count` in the same call),
 * so joining twice concurrently cannot double-count.
 */

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{doc, to_bson};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::auth::users::is_duplicate_key;
use crate::error::{ApiError, ApiResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    #[default]
    Public,
    Restricted,
    Private,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberEntry {
    pub username: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModeratorEntry {
    pub username: String,
    pub invited_by: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BanEntry {
    pub username: String,
    pub reason: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub banned_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub title: String,
    pub description: Option<String>,
}

/// A subreddit document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubredditDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator: String,
    #[serde(default)]
    pub members: Vec<MemberEntry>,
    #[serde(default)]
    pub moderators: Vec<ModeratorEntry>,
    #[serde(default)]
    pub muted_users: Vec<String>,
    #[serde(default)]
    pub banned_users: Vec<BanEntry>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub privacy: Privacy,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub member_count: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl SubredditDoc {
    pub fn is_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m.username == username)
    }

    pub fn is_moderator(&self, username: &str) -> bool {
        self.moderators.iter().any(|m| m.username == username)
    }

    pub fn is_banned(&self, username: &str) -> bool {
        self.banned_users.iter().any(|b| b.username == username)
    }

    pub fn is_muted(&self, username: &str) -> bool {
        self.muted_users.iter().any(|u| u == username)
    }
}

pub fn collection(db: &Database) -> Collection<SubredditDoc> {
    db.collection("subreddits")
}

/// Create a subreddit; the creator becomes first member and moderator
pub async fn create(
    db: &Database,
    name: String,
    title: Option<String>,
    description: Option<String>,
    privacy: Privacy,
    nsfw: bool,
    creator: &str,
) -> ApiResult<SubredditDoc> {
    let now = Utc::now();
    let mut subreddit = SubredditDoc {
        id: Some(ObjectId::new()),
        name,
        title,
        description,
        creator: creator.to_string(),
        members: vec![MemberEntry {
            username: creator.to_string(),
            joined_at: now,
        }],
        moderators: vec![ModeratorEntry {
            username: creator.to_string(),
            invited_by: None,
            joined_at: now,
        }],
        muted_users: Vec::new(),
        banned_users: Vec::new(),
        rules: Vec::new(),
        privacy,
        nsfw,
        member_count: 1,
        created_at: now,
    };

    match collection(db).insert_one(&subreddit, None).await {
        Ok(result) => {
            subreddit.id = result.inserted_id.as_object_id();
            Ok(subreddit)
        }
        Err(e) if is_duplicate_key(&e) => {
            Err(ApiError::conflict("A subreddit with that name already exists"))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn find_by_name(db: &Database, name: &str) -> ApiResult<Option<SubredditDoc>> {
    Ok(collection(db).find_one(doc! { "name": name }, None).await?)
}

pub async fn require_by_name(db: &Database, name: &str) -> ApiResult<SubredditDoc> {
    find_by_name(db, name)
        .await?
        .ok_or_else(|| ApiError::not_found("Subreddit not found"))
}

/// Add a member; returns false when already a member (idempotent)
pub async fn add_member(db: &Database, name: &str, username: &str) -> ApiResult<bool> {
    let entry = to_bson(&MemberEntry {
        username: username.to_string(),
        joined_at: Utc::now(),
    })?;

    let result = collection(db)
        .update_one(
            doc! { "name": name, "members.username": { "$ne": username } },
            doc! { "$push": { "members": entry }, "$inc": { "member_count": 1 } },
            None,
        )
        .await?;

    Ok(result.modified_count == 1)
}

/// Remove a member (and any moderator role); returns false when not a member
pub async fn remove_member(db: &Database, name: &str, username: &str) -> ApiResult<bool> {
    let result = collection(db)
        .update_one(
            doc! { "name": name, "members.username": username },
            doc! {
                "$pull": {
                    "members": { "username": username },
                    "moderators": { "username": username },
                },
                "$inc": { "member_count": -1 },
            },
            None,
        )
        .await?;

    Ok(result.modified_count == 1)
}

/// Grant the moderator role (idempotent)
pub async fn add_moderator(
    db: &Database,
    name: &str,
    username: &str,
    invited_by: Option<&str>,
) -> ApiResult<bool> {
    let entry = to_bson(&ModeratorEntry {
        username: username.to_string(),
        invited_by: invited_by.map(|s| s.to_string()),
        joined_at: Utc::now(),
    })?;

    let result = collection(db)
        .update_one(
            doc! { "name": name, "moderators.username": { "$ne": username } },
            doc! { "$push": { "moderators": entry } },
            None,
        )
        .await?;

    Ok(result.modified_count == 1)
}

/// Ban a user: record the ban and drop their membership
pub async fn ban_user(
    db: &Database,
    name: &str,
    username: &str,
    reason: Option<String>,
) -> ApiResult<()> {
    let entry = to_bson(&BanEntry {
        username: username.to_string(),
        reason,
        banned_at: Utc::now(),
    })?;

    collection(db)
        .update_one(
            doc! { "name": name, "banned_users.username": { "$ne": username } },
            doc! { "$push": { "banned_users": entry } },
            None,
        )
        .await?;

    // Membership removal is guarded separately so member_count stays exact
    remove_member(db, name, username).await?;
    Ok(())
}

pub async fn unban_user(db: &Database, name: &str, username: &str) -> ApiResult<()> {
    collection(db)
        .update_one(
            doc! { "name": name },
            doc! { "$pull": { "banned_users": { "username": username } } },
            None,
        )
        .await?;
    Ok(())
}

pub async fn set_muted(db: &Database, name: &str, username: &str, muted: bool) -> ApiResult<()> {
    let update = if muted {
        doc! { "$addToSet": { "muted_users": username } }
    } else {
        doc! { "$pull": { "muted_users": username } }
    };
    collection(db)
        .update_one(doc! { "name": name }, update, None)
        .await?;
    Ok(())
}

pub async fn add_rule(db: &Database, name: &str, rule: Rule) -> ApiResult<()> {
    let entry = to_bson(&rule)?;
    collection(db)
        .update_one(doc! { "name": name }, doc! { "$push": { "rules": entry } }, None)
        .await?;
    Ok(())
}

/// Remove a rule by index: null it out positionally, then pull nulls
pub async fn remove_rule(db: &Database, name: &str, index: usize) -> ApiResult<()> {
    let field = format!("rules.{index}");
    let result = collection(db)
        .update_one(
            doc! { "name": name, &field: { "$exists": true } },
            doc! { "$unset": { &field: 1 } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::not_found("Rule not found"));
    }
    collection(db)
        .update_one(
            doc! { "name": name },
            doc! { "$pull": { "rules": null } },
            None,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subreddit() -> SubredditDoc {
        let now = Utc::now();
        SubredditDoc {
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
            muted_users: vec!["mallory".to_string()],
            banned_users: vec![BanEntry {
                username: "eve".to_string(),
                reason: Some("spam".to_string()),
                banned_at: now,
            }],
            rules: Vec::new(),
            privacy: Privacy::Public,
            nsfw: false,
            member_count: 1,
            created_at: now,
        }
    }

    #[test]
    fn test_membership_checks() {
        let sub = subreddit();
        assert!(sub.is_member("alice"));
        assert!(sub.is_moderator("alice"));
        assert!(!sub.is_member("bob"));
        assert!(sub.is_banned("eve"));
        assert!(sub.is_muted("mallory"));
    }

    #[test]
    fn test_privacy_serializes_lowercase() {
        let bson = to_bson(&Privacy::Restricted).unwrap();
        assert_eq!(bson.as_str(), Some("restricted"));
    }
}
