/**
 * Message and Chat Collections
 *
 * Two shapes of private communication. `messages` are one-shot letters with
 * inbox/sent semantics. `chats` are two-party threads with the message list
 * embedded in the thread document; a thread between strangers starts as a
 * pending request until the other side accepts.
 */

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub sent_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub body: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub sent_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Exactly two usernames; the initiator first
    pub participants: Vec<String>,
    /// True until the non-initiating side accepts the thread
    pub pending: bool,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub last_message_at: DateTime<Utc>,
}

impl ChatDoc {
    pub fn initiator(&self) -> &str {
        self.participants.first().map(String::as_str).unwrap_or("")
    }

    pub fn has_participant(&self, username: &str) -> bool {
        self.participants.iter().any(|p| p == username)
    }

    /// The participant who is not `username`.
    pub fn other_participant(&self, username: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| *p != username)
            .map(String::as_str)
    }
}

pub fn messages(db: &Database) -> Collection<MessageDoc> {
    db.collection("messages")
}

pub fn chats(db: &Database) -> Collection<ChatDoc> {
    db.collection("chats")
}

pub async fn insert_message(db: &Database, mut message: MessageDoc) -> ApiResult<MessageDoc> {
    let result = messages(db).insert_one(&message, None).await?;
    message.id = result.inserted_id.as_object_id();
    Ok(message)
}

pub async fn inbox(db: &Database, username: &str) -> ApiResult<Vec<MessageDoc>> {
    let options = FindOptions::builder().sort(doc! { "sent_at": -1 }).build();
    let cursor = messages(db)
        .find(doc! { "recipient": username }, options)
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn sent(db: &Database, username: &str) -> ApiResult<Vec<MessageDoc>> {
    let options = FindOptions::builder().sort(doc! { "sent_at": -1 }).build();
    let cursor = messages(db).find(doc! { "sender": username }, options).await?;
    Ok(cursor.try_collect().await?)
}

/// Recipient-only read receipt; 404 covers both unknown id and wrong user.
pub async fn mark_message_read(db: &Database, id: ObjectId, recipient: &str) -> ApiResult<()> {
    let result = messages(db)
        .update_one(
            doc! { "_id": id, "recipient": recipient },
            doc! { "$set": { "is_read": true } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::not_found("Message not found"));
    }
    Ok(())
}

/// The thread between two users regardless of who initiated it.
pub async fn find_chat_between(db: &Database, a: &str, b: &str) -> ApiResult<Option<ChatDoc>> {
    Ok(chats(db)
        .find_one(doc! { "participants": { "$all": [a, b] } }, None)
        .await?)
}

pub async fn insert_chat(db: &Database, mut chat: ChatDoc) -> ApiResult<ChatDoc> {
    let result = chats(db).insert_one(&chat, None).await?;
    chat.id = result.inserted_id.as_object_id();
    Ok(chat)
}

pub async fn find_chat(db: &Database, id: ObjectId) -> ApiResult<Option<ChatDoc>> {
    Ok(chats(db).find_one(doc! { "_id": id }, None).await?)
}

pub async fn require_chat(db: &Database, id: ObjectId) -> ApiResult<ChatDoc> {
    find_chat(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Chat not found"))
}

pub async fn accept_chat(db: &Database, id: ObjectId) -> ApiResult<()> {
    chats(db)
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "pending": false } },
            None,
        )
        .await?;
    Ok(())
}

pub async fn push_chat_message(db: &Database, id: ObjectId, message: &ChatMessage) -> ApiResult<()> {
    let entry = to_bson(message)?;
    chats(db)
        .update_one(
            doc! { "_id": id },
            doc! {
                "$push": { "messages": entry },
                "$set": { "last_message_at": mongodb::bson::DateTime::now() },
            },
            None,
        )
        .await?;
    Ok(())
}

/// All of a user's threads, most recently active first.
pub async fn list_chats(db: &Database, username: &str) -> ApiResult<Vec<ChatDoc>> {
    let options = FindOptions::builder()
        .sort(doc! { "last_message_at": -1 })
        .build();
    let cursor = chats(db)
        .find(doc! { "participants": username }, options)
        .await?;
    Ok(cursor.try_collect().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chat(participants: &[&str]) -> ChatDoc {
        let now = Utc::now();
        ChatDoc {
            id: Some(ObjectId::new()),
            participants: participants.iter().map(|s| s.to_string()).collect(),
            pending: true,
            messages: Vec::new(),
            created_at: now,
            last_message_at: now,
        }
    }

    #[test]
    fn initiator_is_first_participant() {
        let chat = chat(&["alice", "bob"]);
        assert_eq!(chat.initiator(), "alice");
        assert_eq!(chat.other_participant("alice"), Some("bob"));
        assert_eq!(chat.other_participant("bob"), Some("alice"));
        assert!(chat.has_participant("bob"));
        assert!(!chat.has_participant("eve"));
    }
}
