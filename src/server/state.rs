/**
 * Application State
 *
 * `AppState` is the central state container shared by every handler:
 *
 * - the MongoDB `Database` handle (the driver pools connections internally)
 * - per-user realtime broadcast channels
 * - the optional SMTP mailer (absent when mail credentials are not set)
 * - the parsed configuration
 *
 * `FromRef` implementations let handlers extract just the piece they need
 * instead of the whole state, following Axum's substate pattern.
 */

use std::sync::Arc;

use axum::extract::FromRef;
use mongodb::Database;

use crate::email::Mailer;
use crate::realtime::UserEventBroadcast;
use crate::server::config::Config;

/// Shared application state, cloned per request
#[derive(Clone)]
pub struct AppState {
    /// MongoDB database handle
    pub db: Database,
    /// Per-user broadcast channels for SSE delivery
    pub realtime: UserEventBroadcast,
    /// Outbound mail transport, `None` when EMAIL/APP_PASSWORD are unset
    pub mailer: Option<Mailer>,
    /// Parsed environment configuration
    pub config: Arc<Config>,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for UserEventBroadcast {
    fn from_ref(state: &AppState) -> Self {
        state.realtime.clone()
    }
}

impl FromRef<AppState> for Option<Mailer> {
    fn from_ref(state: &AppState) -> Self {
        state.mailer.clone()
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
