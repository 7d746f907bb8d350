/**
 * Server Configuration
 *
 * This module loads server configuration from environment variables and
 * establishes the MongoDB connection.
 *
 * # Configuration Sources
 *
 * All external configuration comes from the environment (optionally via a
 * `.env` file loaded in `main`):
 *
 * - `PORT` - HTTP listen port (default 3000)
 * - `MONGODB_URI` - MongoDB connection string
 * - `MONGODB_DB` - database name (default "threddit")
 * - `JWT_SECRET` - HMAC secret for bearer tokens
 * - `GOOGLE_CLIENT_ID` - expected audience for Google sign-in tokens
 * - `SMTP_RELAY`, `EMAIL`, `APP_PASSWORD` - outbound mail credentials
 * - `MEDIA_DIR` - directory for uploaded media (default "media")
 *
 * Missing mail credentials disable outbound email; a missing database is
 * fatal, because every route reads or writes documents.
 */

use std::path::PathBuf;

use mongodb::bson::doc;
use mongodb::{Client, Database};

use crate::error::ApiResult;

/// Parsed environment configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub jwt_secret: String,
    pub google_client_id: Option<String>,
    pub smtp_relay: Option<String>,
    pub email: Option<String>,
    pub app_password: Option<String>,
    pub media_dir: PathBuf,
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let mongodb_uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());

        let mongodb_db = std::env::var("MONGODB_DB").unwrap_or_else(|_| "threddit".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using development fallback");
            "dev-secret-change-in-production".to_string()
        });

        let media_dir = std::env::var("MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("media"));

        Self {
            port,
            mongodb_uri,
            mongodb_db,
            jwt_secret,
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
            smtp_relay: std::env::var("SMTP_RELAY").ok(),
            email: std::env::var("EMAIL").ok(),
            app_password: std::env::var("APP_PASSWORD").ok(),
            media_dir,
        }
    }
}

/// Connect to MongoDB and verify the connection with a ping
pub async fn connect_database(config: &Config) -> ApiResult<Database> {
    tracing::info!("Connecting to MongoDB...");

    let client = Client::with_uri_str(&config.mongodb_uri).await?;
    let db = client.database(&config.mongodb_db);

    db.run_command(doc! { "ping": 1 }, None).await?;
    tracing::info!("Connected to database '{}'", config.mongodb_db);

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        // from_env with a clean environment falls back to defaults
        std::env::remove_var("PORT");
        std::env::remove_var("MONGODB_DB");
        std::env::remove_var("MEDIA_DIR");

        let config = Config::from_env();
        assert_eq!(config.port, 3000);
        assert_eq!(config.mongodb_db, "threddit");
        assert_eq!(config.media_dir, PathBuf::from("media"));
    }
}
