use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::services::ServeDir;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{
    admin, auth, comments, events, feedback, kids, notifications, playlists, prayers, recipes, reflections, settings,
    users,
};

/// Largest request body accepted anywhere; per-upload limits are tighter.
pub const MAX_BODY_SIZE: usize = 12 * 1024 * 1024;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Builds the full application: `/health`, the JSON API under `/api` and
/// stored files under `/files`. CORS and tracing layers are left to the
/// binary.
pub fn build(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users/me", patch(users::update_profile))
        .route("/users/me/password", put(users::change_password))
        .route("/users/me/avatar", put(users::upload_avatar).delete(users::delete_avatar))
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/{id}",
            get(events::get_event).patch(events::update_event).delete(events::delete_event),
        )
        .route("/events/{id}/rsvp", put(events::upsert_rsvp).delete(events::delete_rsvp))
        // Prayers
        .route("/prayers", get(prayers::list_prayers).post(prayers::create_prayer))
        .route(
            "/prayers/{id}",
            get(prayers::get_prayer).patch(prayers::update_prayer).delete(prayers::delete_prayer),
        )
        .route("/prayers/{id}/reactions", post(prayers::add_reaction))
        .route("/prayers/{id}/reactions/{kind}", delete(prayers::remove_reaction))
        .route("/prayers/{id}/comments", get(prayers::list_comments).post(prayers::add_comment))
        // Reflections
        .route("/reflections", get(reflections::list_reflections).post(reflections::create_reflection))
        .route(
            "/reflections/{id}",
            get(reflections::get_reflection)
                .patch(reflections::update_reflection)
                .delete(reflections::delete_reflection),
        )
        .route("/reflections/{id}/reactions", post(reflections::add_reaction))
        .route("/reflections/{id}/reactions/{kind}", delete(reflections::remove_reaction))
        .route("/reflections/{id}/comments", get(reflections::list_comments).post(reflections::add_comment))
        // Comments
        .route("/comments/{id}", patch(comments::update_comment).delete(comments::delete_comment))
        // Recipes
        .route("/recipes", get(recipes::list_recipes).post(recipes::create_recipe))
        .route(
            "/recipes/{id}",
            get(recipes::get_recipe).patch(recipes::update_recipe).delete(recipes::delete_recipe),
        )
        .route("/recipes/{id}/rating", put(recipes::rate_recipe).delete(recipes::remove_rating))
        // Kids
        .route("/kids/assets", get(kids::list_assets).post(kids::create_asset))
        .route(
            "/kids/assets/{id}",
            get(kids::get_asset).patch(kids::update_asset).delete(kids::delete_asset),
        )
        .route("/kids/assets/{id}/file", put(kids::upload_file))
        .route("/kids/assets/{id}/download", get(kids::download))
        .route("/kids/verse-game", get(kids::verse_game))
        .route("/kids/verse-game/check", post(kids::check_verse_game))
        // Playlists
        .route("/playlists", get(playlists::list_playlists).post(playlists::create_playlist))
        .route("/playlists/reorder", post(playlists::reorder_playlists))
        .route("/playlists/{id}", patch(playlists::update_playlist).delete(playlists::delete_playlist))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route(
            "/notifications/preferences",
            get(notifications::get_preferences).put(notifications::update_preferences),
        )
        .route("/notifications/{id}", delete(notifications::delete_notification))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/devices", post(notifications::register_device))
        .route("/devices/{token}", delete(notifications::remove_device))
        // Feedback and settings
        .route("/feedback", post(feedback::submit_feedback))
        .route("/settings", get(settings::get_settings))
        // Admin
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", patch(admin::update_user).delete(admin::delete_user))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/prayers/pending", get(admin::pending_prayers))
        .route("/admin/prayers/{id}/approve", post(admin::approve_prayer))
        .route("/admin/notifications", post(admin::send_announcement))
        .route("/admin/feedback", get(admin::list_feedback))
        .route("/admin/feedback/{id}", delete(admin::delete_feedback))
        .route("/admin/feedback/{id}/read", post(admin::mark_feedback_read))
        .route("/admin/settings", patch(admin::update_settings))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let files = ServeDir::new(state.storage.dir());

    Router::new()
        .route("/health", get(health))
        .nest("/api", public_routes.merge(protected_routes))
        .nest_service("/files", files)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}
