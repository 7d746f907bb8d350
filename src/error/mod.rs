/**
 * API Error Types
 *
 * Every handler in the crate returns `Result<_, ApiError>`. The error type
 * carries the HTTP status and a client-safe message; internal failures
 * (database, serialization) are logged with their details and rendered to
 * the client as a generic message.
 */

mod types;

pub use types::{ApiError, ApiResult};
