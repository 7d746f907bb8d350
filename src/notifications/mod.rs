/**
 * Notifications
 *
 * Persistent per-user notifications with realtime push and per-item
 * suppression. Other modules call `db::notify` to fan out; the rules for
 * dropping a notification live in `suppression`.
 */

pub mod db;
pub mod handlers;
pub mod suppression;

pub use db::notify;
pub use suppression::NotificationContext;
