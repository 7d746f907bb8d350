pub mod db;
pub mod handlers;

pub use handlers::CommentResponse;
