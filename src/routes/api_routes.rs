/**
 * API Route Handlers
 *
 * Every `/api` endpoint, grouped the way the modules are. Auth is enforced
 * per handler through the `AuthUser` / `MaybeAuthUser` extractors, so the
 * route table stays a flat listing.
 */

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::server::state::AppState;

pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        // Authentication
        .route("/api/auth/signup", post(crate::auth::signup))
        .route("/api/auth/login", post(crate::auth::login))
        .route("/api/auth/google", post(crate::auth::google_login))
        .route("/api/auth/me", get(crate::auth::get_me))
        .route("/api/auth/forgot-password", post(crate::auth::forgot_password))
        .route("/api/auth/reset-password", post(crate::auth::reset_password))
        .route("/api/auth/forgot-username", post(crate::auth::forgot_username))
        // Posts and feeds
        .route(
            "/api/posts",
            post(crate::posts::handlers::create_post).get(crate::posts::handlers::get_feed),
        )
        .route(
            "/api/posts/{id}",
            get(crate::posts::handlers::get_post)
                .patch(crate::posts::handlers::edit_post)
                .delete(crate::posts::handlers::delete_post),
        )
        .route("/api/posts/{id}/vote", post(crate::posts::handlers::vote_post))
        .route("/api/posts/{id}/poll-vote", post(crate::posts::handlers::vote_poll))
        .route("/api/posts/{id}/hide", post(crate::posts::handlers::hide_post))
        .route("/api/posts/{id}/unhide", post(crate::posts::handlers::unhide_post))
        .route("/api/posts/{id}/save", post(crate::posts::handlers::save_post))
        .route("/api/posts/{id}/unsave", post(crate::posts::handlers::unsave_post))
        .route("/api/posts/{id}/lock", post(crate::posts::handlers::lock_post))
        .route("/api/posts/{id}/unlock", post(crate::posts::handlers::unlock_post))
        .route("/api/posts/{id}/spoiler", post(crate::posts::handlers::toggle_spoiler))
        .route("/api/posts/{id}/nsfw", post(crate::posts::handlers::toggle_nsfw))
        // Comments
        .route(
            "/api/posts/{id}/comments",
            post(crate::comments::handlers::create_comment)
                .get(crate::comments::handlers::list_comments),
        )
        .route(
            "/api/comments/{id}",
            patch(crate::comments::handlers::edit_comment)
                .delete(crate::comments::handlers::delete_comment),
        )
        .route(
            "/api/comments/{id}/vote",
            post(crate::comments::handlers::vote_comment),
        )
        // Subreddits
        .route(
            "/api/subreddits",
            post(crate::subreddits::handlers::create_subreddit),
        )
        .route(
            "/api/subreddits/{name}",
            get(crate::subreddits::handlers::get_subreddit),
        )
        .route(
            "/api/subreddits/{name}/join",
            post(crate::subreddits::handlers::join_subreddit),
        )
        .route(
            "/api/subreddits/{name}/leave",
            post(crate::subreddits::handlers::leave_subreddit),
        )
        .route(
            "/api/subreddits/{name}/posts",
            get(crate::subreddits::handlers::subreddit_posts),
        )
        .route(
            "/api/subreddits/{name}/rules",
            post(crate::subreddits::handlers::add_rule),
        )
        .route(
            "/api/subreddits/{name}/rules/{index}",
            delete(crate::subreddits::handlers::remove_rule),
        )
        // Moderation
        .route(
            "/api/subreddits/{name}/moderators/invite",
            post(crate::subreddits::moderation::invite_moderator),
        )
        .route(
            "/api/invitations",
            get(crate::subreddits::moderation::list_invitations),
        )
        .route(
            "/api/invitations/{id}/accept",
            post(crate::subreddits::moderation::accept_invitation),
        )
        .route(
            "/api/invitations/{id}/decline",
            post(crate::subreddits::moderation::decline_invitation),
        )
        .route(
            "/api/subreddits/{name}/ban",
            post(crate::subreddits::moderation::ban_user),
        )
        .route(
            "/api/subreddits/{name}/unban",
            post(crate::subreddits::moderation::unban_user),
        )
        .route(
            "/api/subreddits/{name}/mute",
            post(crate::subreddits::moderation::mute_user),
        )
        .route(
            "/api/subreddits/{name}/unmute",
            post(crate::subreddits::moderation::unmute_user),
        )
        // Messages
        .route("/api/messages", post(crate::messages::handlers::send_message))
        .route("/api/messages/inbox", get(crate::messages::handlers::inbox))
        .route("/api/messages/sent", get(crate::messages::handlers::sent))
        .route(
            "/api/messages/{id}/read",
            patch(crate::messages::handlers::mark_read),
        )
        // Chats
        .route(
            "/api/chats",
            post(crate::messages::handlers::open_chat).get(crate::messages::handlers::list_chats),
        )
        .route(
            "/api/chats/{id}/accept",
            post(crate::messages::handlers::accept_chat),
        )
        .route(
            "/api/chats/{id}/messages",
            post(crate::messages::handlers::send_chat_message)
                .get(crate::messages::handlers::chat_messages),
        )
        // Notifications
        .route(
            "/api/notifications",
            get(crate::notifications::handlers::list_notifications),
        )
        .route(
            "/api/notifications/{id}/read",
            patch(crate::notifications::handlers::mark_read),
        )
        .route(
            "/api/notifications/read-all",
            post(crate::notifications::handlers::mark_all_read),
        )
        .route(
            "/api/notifications/{id}/hide",
            patch(crate::notifications::handlers::hide_notification),
        )
        .route(
            "/api/notifications/settings",
            post(crate::notifications::handlers::update_settings),
        )
        // Realtime stream
        .route("/api/realtime", get(crate::realtime::subscription::subscribe))
        // Search
        .route("/api/search", get(crate::search::handlers::search))
        // Profiles
        .route(
            "/api/users/{username}",
            get(crate::profile::handlers::get_profile),
        )
        .route("/api/profile", patch(crate::profile::handlers::update_profile))
        .route(
            "/api/users/{username}/follow",
            post(crate::profile::handlers::follow_user),
        )
        .route(
            "/api/users/{username}/unfollow",
            post(crate::profile::handlers::unfollow_user),
        )
        .route(
            "/api/users/{username}/block",
            post(crate::profile::handlers::block_user),
        )
        .route(
            "/api/users/{username}/unblock",
            post(crate::profile::handlers::unblock_user),
        )
        .route("/api/profile/saved", get(crate::profile::handlers::saved_items))
        .route("/api/profile/hidden", get(crate::profile::handlers::hidden_posts))
        .route(
            "/api/profile/upvoted",
            get(crate::profile::handlers::upvoted_items),
        )
        .route(
            "/api/profile/downvoted",
            get(crate::profile::handlers::downvoted_items),
        )
        // Reports
        .route(
            "/api/reports",
            post(crate::reports::handlers::create_report).get(crate::reports::handlers::list_reports),
        )
        .route(
            "/api/reports/{id}",
            patch(crate::reports::handlers::update_report),
        )
        // Media uploads; the body limit leaves headroom so the handler
        // can answer 413 itself instead of axum's bare rejection
        .route(
            "/api/media",
            post(crate::media::upload)
                .layer(DefaultBodyLimit::max(crate::media::MAX_UPLOAD_BYTES + 1024)),
        )
}
