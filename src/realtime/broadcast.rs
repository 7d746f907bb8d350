/**
 * Real-time Event Broadcasting
 *
 * This module provides per-user broadcast channels for real-time delivery
 * of chat messages and notifications. Each username gets its own
 * `tokio::sync::broadcast` channel, created lazily on first use, so events
 * for one user are never fanned out to another user's stream.
 *
 * Channels with no remaining subscribers are dropped by a periodic cleanup
 * task started in `server::init`.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events pushed to a user's realtime stream
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A chat message addressed to the user
    ChatMessage {
        chat_id: String,
        from: String,
        body: String,
        sent_at: i64,
    },
    /// A notification created for the user
    Notification {
        id: String,
        title: String,
        body: String,
        kind: String,
    },
}

impl RealtimeEvent {
    /// SSE event name for this event
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ChatMessage { .. } => "chat_message",
            Self::Notification { .. } => "notification",
        }
    }
}

/// Per-user broadcast channels for real-time event delivery
///
/// The map is keyed by username. Senders are created lazily when a user
/// first subscribes or first receives an event.
#[derive(Clone)]
pub struct UserEventBroadcast {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<RealtimeEvent>>>>,
}

impl UserEventBroadcast {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get or create the broadcast sender for a user
    pub fn sender_for(&self, username: &str) -> broadcast::Sender<RealtimeEvent> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(username.to_string())
            .or_insert_with(|| broadcast::channel(100).0)
            .clone()
    }

    /// Push an event to a user's stream
    ///
    /// A user with no open stream simply misses the event; everything
    /// pushed here is also persisted, so reconnecting clients re-fetch.
    pub fn send_to(&self, username: &str, event: RealtimeEvent) {
        if let Some(sender) = self.channels.lock().unwrap().get(username) {
            let _ = sender.send(event); // ignore if nobody is listening
        }
    }

    /// Drop channels with no remaining subscribers
    pub fn cleanup_inactive_channels(&self) {
        self.channels
            .lock()
            .unwrap()
            .retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Subscriber count for a user (used in tests and debug logs)
    pub fn subscriber_count(&self, username: &str) -> usize {
        self.channels
            .lock()
            .unwrap()
            .get(username)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for UserEventBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_reaches_subscriber() {
        let broadcast = UserEventBroadcast::new();
        let mut rx = broadcast.sender_for("alice").subscribe();

        broadcast.send_to(
            "alice",
            RealtimeEvent::Notification {
                id: "n1".to_string(),
                title: "New comment".to_string(),
                body: "bob commented on your post".to_string(),
                kind: "comment".to_string(),
            },
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_name(), "notification");
    }

    #[tokio::test]
    async fn test_events_are_scoped_per_user() {
        let broadcast = UserEventBroadcast::new();
        let mut alice_rx = broadcast.sender_for("alice").subscribe();
        let _bob_tx = broadcast.sender_for("bob");

        broadcast.send_to(
            "bob",
            RealtimeEvent::ChatMessage {
                chat_id: "c1".to_string(),
                from: "carol".to_string(),
                body: "hi".to_string(),
                sent_at: 0,
            },
        );

        // Alice's channel stays empty
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_without_channel_is_noop() {
        let broadcast = UserEventBroadcast::new();
        broadcast.send_to(
            "nobody",
            RealtimeEvent::ChatMessage {
                chat_id: "c1".to_string(),
                from: "alice".to_string(),
                body: "hello?".to_string(),
                sent_at: 0,
            },
        );
        assert_eq!(broadcast.subscriber_count("nobody"), 0);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_channels() {
        let broadcast = UserEventBroadcast::new();
        {
            let _rx = broadcast.sender_for("alice").subscribe();
            broadcast.cleanup_inactive_channels();
            assert_eq!(broadcast.subscriber_count("alice"), 1);
        }
        // receiver dropped
        broadcast.cleanup_inactive_channels();
        assert_eq!(broadcast.subscriber_count("alice"), 0);
    }
}
