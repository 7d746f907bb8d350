pub mod db;
pub mod handlers;
pub mod moderation;

pub use handlers::SubredditResponse;
