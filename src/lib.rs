//! Threddit - Reddit-style community backend
//!
//! Threddit is the REST backend of a Reddit-style social platform: users,
//! subreddits, posts, comments, voting, private messaging, chat threads,
//! notifications, moderation and search, backed by MongoDB and served with
//! Axum.
//!
//! # Module Structure
//!
//! - **`server`** - Configuration, application state, app assembly
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`error`** - The `ApiError` type shared by every handler
//! - **`auth`** - Signup/login, JWT sessions, Google sign-in, user documents
//! - **`middleware`** - Bearer-token extractors (`AuthUser`, `MaybeAuthUser`)
//! - **`posts`** / **`comments`** - Content CRUD, voting, polls
//! - **`subreddits`** - Communities, membership, moderation
//! - **`messages`** - Private messages and chat threads
//! - **`notifications`** - Notification fan-out and per-item suppression
//! - **`profile`** - Public profiles, follows, blocks, saved/hidden lists
//! - **`search`** - Cross-collection substring search
//! - **`reports`** - User reports and moderator review
//! - **`media`** - Local media uploads served as static files
//! - **`realtime`** - Per-user SSE event streams
//! - **`email`** - Outbound transactional mail (lettre)
//!
//! # State Management
//!
//! All handlers share an `AppState` holding the MongoDB database handle,
//! the per-user realtime broadcast map, the optional SMTP mailer and the
//! parsed configuration. State is cloned per request; everything inside it
//! is `Arc`-backed or otherwise cheaply cloneable.

pub mod auth;
pub mod comments;
pub mod email;
pub mod error;
pub mod media;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod profile;
pub mod realtime;
pub mod reports;
pub mod routes;
pub mod search;
pub mod server;
pub mod subreddits;
