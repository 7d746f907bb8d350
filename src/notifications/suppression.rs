/**
 * Notification Suppression
 *
 * Decides whether a would-be notification is dropped before it is ever
 * written. A notification is suppressed when:
 *
 * - the recipient is the actor (no self-notifications),
 * - the recipient has blocked the actor,
 * - the recipient disabled notifications for the subreddit, the post, or
 *   the specific comment involved.
 *
 * Pure over the recipient document so the rules are unit-testable.
 */

use mongodb::bson::oid::ObjectId;

use crate::auth::users::UserDoc;

/// Where a notification came from, for suppression checks
#[derive(Clone, Debug, Default)]
pub struct NotificationContext<'a> {
    /// Username of the user whose action triggered the notification
    pub actor: &'a str,
    /// Subreddit the action happened in, if any
    pub subreddit: Option<&'a str>,
    /// Post involved (the item itself or the comment's parent)
    pub post_id: Option<ObjectId>,
    /// Comment involved, if the action targeted a comment
    pub comment_id: Option<ObjectId>,
}

/// True when the recipient should not receive this notification
pub fn is_suppressed(recipient: &UserDoc, ctx: &NotificationContext) -> bool {
    if recipient.username == ctx.actor {
        return true;
    }
    if recipient.has_blocked(ctx.actor) {
        return true;
    }

    let settings = &recipient.notification_settings;

    if let Some(subreddit) = ctx.subreddit {
        if settings.disabled_subreddits.iter().any(|s| s == subreddit) {
            return true;
        }
    }
    if let Some(post_id) = ctx.post_id {
        if settings.disabled_posts.contains(&post_id) {
            return true;
        }
    }
    if let Some(comment_id) = ctx.comment_id {
        if settings.disabled_comments.contains(&comment_id) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::{NotificationSettings, UserDoc, ACCESS_USER};
    use chrono::Utc;

    fn recipient() -> UserDoc {
        UserDoc {
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
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_delivered_by_default() {
        let user = recipient();
        let ctx = NotificationContext {
            actor: "bob",
            subreddit: Some("rust"),
            post_id: Some(ObjectId::new()),
            comment_id: None,
        };
        assert!(!is_suppressed(&user, &ctx));
    }

    #[test]
    fn test_self_action_suppressed() {
        let user = recipient();
        let ctx = NotificationContext {
            actor: "alice",
            ..Default::default()
        };
        assert!(is_suppressed(&user, &ctx));
    }

    #[test]
    fn test_blocked_actor_suppressed() {
        let mut user = recipient();
        user.blocked_users.push("bob".to_string());
        let ctx = NotificationContext {
            actor: "bob",
            ..Default::default()
        };
        assert!(is_suppressed(&user, &ctx));
    }

    #[test]
    fn test_disabled_subreddit_suppressed() {
        let mut user = recipient();
        user.notification_settings
            .disabled_subreddits
            .push("rust".to_string());
        let ctx = NotificationContext {
            actor: "bob",
            subreddit: Some("rust"),
            ..Default::default()
        };
        assert!(is_suppressed(&user, &ctx));

        // Other subreddits unaffected
        let ctx = NotificationContext {
            actor: "bob",
            subreddit: Some("golang"),
            ..Default::default()
        };
        assert!(!is_suppressed(&user, &ctx));
    }

    #[test]
    fn test_disabled_post_suppresses_its_comments_too() {
        let post_id = ObjectId::new();
        let mut user = recipient();
        user.notification_settings.disabled_posts.push(post_id);

        // A comment event carries its parent post id in the context
        let ctx = NotificationContext {
            actor: "bob",
            subreddit: Some("rust"),
            post_id: Some(post_id),
            comment_id: Some(ObjectId::new()),
        };
        assert!(is_suppressed(&user, &ctx));
    }

    #[test]
    fn test_disabled_comment_suppressed() {
        let comment_id = ObjectId::new();
        let mut user = recipient();
        user.notification_settings.disabled_comments.push(comment_id);

        let ctx = NotificationContext {
            actor: "bob",
            comment_id: Some(comment_id),
            ..Default::default()
        };
        assert!(is_suppressed(&user, &ctx));
    }
}
