/**
 * Router Configuration
 *
 * Combines the API routes, the static media service and the fallback into
 * the final Axum router. `/media` serves the upload directory configured
 * by `MEDIA_DIR`.
 */

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum::Router;
use mongodb::bson::doc;
use serde_json::{json, Value};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::ApiResult;
use crate::routes::api_routes::configure_api_routes;
use crate::server::state::AppState;

/// Liveness probe; pings the database so a dead connection fails loudly.
async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.db.run_command(doc! { "ping": 1 }, None).await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Not found" })),
    )
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new().route("/health", axum::routing::get(health));

    let router = configure_api_routes(router);

    let router = router.nest_service("/media", ServeDir::new(&app_state.config.media_dir));

    router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
