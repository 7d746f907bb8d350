/**
 * Media Uploads
 *
 * Raw-bytes uploads written under `MEDIA_DIR` and served back statically
 * from `/media`. The content type picks the file extension; anything we
 * do not recognize is refused. Uploads above 10 MiB get 413.
 */

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::server::state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Maps an upload's content type to the stored file extension.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        _ => None,
    }
}

pub async fn upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Empty upload"));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::PayloadTooLarge);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let extension = extension_for(content_type)
        .ok_or_else(|| ApiError::bad_request("Unsupported media type"))?;

    let filename = format!("{}.{}", ObjectId::new().to_hex(), extension);
    let dir = std::path::Path::new(&state.config.media_dir);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::internal(format!("media dir: {e}")))?;
    tokio::fs::write(dir.join(&filename), &body)
        .await
        .map_err(|e| ApiError::internal(format!("media write: {e}")))?;

    tracing::debug!(
        "{} uploaded {} ({} bytes)",
        user.username,
        filename,
        body.len()
    );
    Ok(Json(json!({ "url": format!("/media/{filename}") })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_content_types_map_to_extensions() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("video/mp4"), Some("mp4"));
    }

    #[test]
    fn unknown_content_types_are_refused() {
        assert_eq!(extension_for("application/pdf"), None);
        assert_eq!(extension_for(""), None);
        assert_eq!(extension_for("text/html"), None);
    }
}
