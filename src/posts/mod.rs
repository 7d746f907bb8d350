pub mod db;
pub mod handlers;
pub mod voting;

pub use handlers::{PostResponse, VoteRequest, VoteResponse};
