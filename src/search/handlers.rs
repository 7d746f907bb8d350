/**
 * Search HTTP Handlers
 *
 * Case-insensitive substring search, implemented as an escaped regex so
 * user input can never change the match semantics. Each kind maps to one
 * collection and its text-bearing fields.
 */

use axum::extract::{Query, State};
use axum::Json;
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::comments::db as comments_db;
use crate::error::{ApiError, ApiResult};
use crate::middleware::MaybeAuthUser;
use crate::posts::db as posts_db;
use crate::server::state::AppState;
use crate::subreddits::db as subreddits_db;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Posts,
    Comments,
    Subreddits,
    Users,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub kind: Option<SearchKind>,
    pub limit: Option<i64>,
}

/// Escapes regex metacharacters so the query matches literally.
pub fn escape_regex(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn substring_filter(fields: &[&str], pattern: &str) -> mongodb::bson::Document {
    let clauses: Vec<mongodb::bson::Bson> = fields
        .iter()
        .map(|field| {
            mongodb::bson::Bson::Document(doc! {
                *field: { "$regex": pattern, "$options": "i" }
            })
        })
        .collect();
    doc! { "$or": clauses }
}

#[derive(Debug, Serialize)]
pub struct UserHit {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub post_karma: i64,
    pub comment_karma: i64,
}

pub async fn search(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Value>> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("Search query is required"));
    }

    let pattern = escape_regex(query);
    let limit = params.limit.unwrap_or(25).clamp(1, 100);
    let options = FindOptions::builder().limit(limit).build();

    let mut result = json!({});

    if matches!(params.kind, None | Some(SearchKind::Posts)) {
        let cursor = posts_db::collection(&state.db)
            .find(substring_filter(&["title", "content"], &pattern), options.clone())
            .await?;
        let posts: Vec<posts_db::PostDoc> = cursor.try_collect().await?;
        result["posts"] = serde_json::to_value(
            posts
                .iter()
                .map(|p| crate::posts::PostResponse::build(p, viewer.as_ref()))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    if matches!(params.kind, None | Some(SearchKind::Comments)) {
        let cursor = comments_db::collection(&state.db)
            .find(substring_filter(&["content"], &pattern), options.clone())
            .await?;
        let comments: Vec<comments_db::CommentDoc> = cursor.try_collect().await?;
        result["comments"] = serde_json::to_value(
            comments
                .iter()
                .map(|c| crate::comments::CommentResponse::build(c, viewer.as_ref()))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    if matches!(params.kind, None | Some(SearchKind::Subreddits)) {
        let cursor = subreddits_db::collection(&state.db)
            .find(
                substring_filter(&["name", "title", "description"], &pattern),
                options.clone(),
            )
            .await?;
        let subreddits: Vec<subreddits_db::SubredditDoc> = cursor.try_collect().await?;
        result["subreddits"] = serde_json::to_value(
            subreddits
                .iter()
                .map(|s| crate::subreddits::SubredditResponse::build(s, viewer.as_ref()))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    if matches!(params.kind, None | Some(SearchKind::Users)) {
        let cursor = crate::auth::users::collection(&state.db)
            .find(substring_filter(&["username"], &pattern), options)
            .await?;
        let users: Vec<crate::auth::users::UserDoc> = cursor.try_collect().await?;
        result["users"] = serde_json::to_value(
            users
                .iter()
                .map(|u| UserHit {
                    username: u.username.clone(),
                    display_name: u.display_name.clone(),
                    avatar_url: u.avatar_url.clone(),
                    post_karma: u.post_karma,
                    comment_karma: u.comment_karma,
                })
                .collect::<Vec<_>>(),
        )
        .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escape_leaves_plain_text_alone() {
        assert_eq!(escape_regex("hello world"), "hello world");
    }

    #[test]
    fn escape_neutralizes_metacharacters() {
        assert_eq!(escape_regex("a.b*c"), "a\\.b\\*c");
        assert_eq!(escape_regex("(x|y)"), "\\(x\\|y\\)");
        assert_eq!(escape_regex("^$[]{}"), "\\^\\$\\[\\]\\{\\}");
    }

    #[test]
    fn filter_ors_every_field() {
        let filter = substring_filter(&["title", "content"], "rust");
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 2);
    }
}
