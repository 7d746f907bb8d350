/**
 * Real-time Event Delivery
 *
 * Per-user broadcast channels exposed over Server-Sent Events. Chat
 * messages and notifications are pushed to the recipient's channel as they
 * are created; connected clients hold an SSE stream on `/api/realtime`.
 */

pub mod broadcast;
pub mod subscription;

pub use broadcast::{RealtimeEvent, UserEventBroadcast};
