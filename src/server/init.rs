/**
 * Server Initialization
 *
 * Builds the Axum application: connects to MongoDB, creates the unique
 * indexes the data model relies on, wires up the shared state and starts
 * the periodic broadcast-channel cleanup task.
 *
 * A missing database is fatal. Missing mail credentials only disable
 * outbound email; the password-reset endpoints then answer 200 without
 * sending anything.
 */

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};

use crate::email::Mailer;
use crate::error::ApiResult;
use crate::realtime::UserEventBroadcast;
use crate::routes::create_router;
use crate::server::config::{connect_database, Config};
use crate::server::state::AppState;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Create and configure the Axum application
pub async fn create_app(config: Config) -> ApiResult<Router<()>> {
    tracing::info!("Initializing threddit backend server");

    let db = connect_database(&config).await?;
    ensure_indexes(&db).await?;

    let mailer = Mailer::from_config(&config);

    let app_state = AppState {
        db,
        realtime: UserEventBroadcast::new(),
        mailer,
        config: Arc::new(config),
    };

    let app = create_router(app_state.clone());

    // Drop broadcast channels whose subscribers have all disconnected
    let cleanup = app_state.realtime.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup.cleanup_inactive_channels();
            tracing::debug!("Cleaned up inactive realtime channels");
        }
    });

    tracing::info!("Router configured with periodic cleanup task");
    Ok(app)
}

/// Unique indexes backing the duplicate-key (409) paths.
async fn ensure_indexes(db: &Database) -> ApiResult<()> {
    let unique = IndexOptions::builder().unique(true).build();

    db.collection::<crate::auth::users::UserDoc>("users")
        .create_indexes(
            vec![
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique.clone())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
            ],
            None,
        )
        .await?;

    db.collection::<crate::subreddits::db::SubredditDoc>("subreddits")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "name": 1 })
                .options(unique)
                .build(),
            None,
        )
        .await?;

    tracing::info!("Unique indexes ensured");
    Ok(())
}
