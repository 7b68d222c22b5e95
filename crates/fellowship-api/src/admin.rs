//! Admin-only endpoints. Every handler checks the role first.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use fellowship_db::models::NewNotification;
use fellowship_types::api::{
    AdminUpdateUserRequest, AnnouncementRequest, AnnouncementResponse, UpdateSettingsRequest,
};
use fellowship_types::models::{
    AdminStats, Feedback, NotificationKind, Prayer, Role, SiteSettings, User, UserStatus,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::ValidJson;
use crate::middleware::CurrentUser;
use crate::notify;
use crate::prayers;
use crate::state::{AppState, blocking};
use crate::views;

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<User>>> {
    me.require_admin()?;
    let rows = blocking(&state, |db| db.list_users()).await?;
    Ok(Json(rows.into_iter().map(|r| views::user(&state.storage, r)).collect()))
}

/// PATCH /api/admin/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<AdminUpdateUserRequest>,
) -> ApiResult<Json<User>> {
    me.require_admin()?;
    if id == me.id {
        if req.role.is_some_and(|r| r != Role::Admin) {
            return Err(ApiError::bad_request("You cannot remove your own admin role"));
        }
        if req.status == Some(UserStatus::Suspended) {
            return Err(ApiError::bad_request("You cannot suspend yourself"));
        }
    }

    let row = blocking(&state, move |db| db.update_role_status(id, req.role, req.status))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    info!("Admin {} updated user {} (role {}, status {})", me.id, id, row.role.as_str(), row.status.as_str());
    Ok(Json(views::user(&state.storage, row)))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    me.require_admin()?;
    if id == me.id {
        return Err(ApiError::bad_request("You cannot delete your own account here"));
    }

    let deleted = blocking(&state, move |db| db.delete_user(id))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    if let Some(key) = deleted.profile_image_key {
        state.storage.delete_quietly(&key).await;
    }
    info!("Admin {} deleted user {} ({})", me.id, id, deleted.email);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<AppState>, Extension(me): Extension<CurrentUser>) -> ApiResult<Json<AdminStats>> {
    me.require_admin()?;
    Ok(Json(blocking(&state, |db| db.admin_stats()).await?))
}

/// GET /api/admin/prayers/pending
pub async fn pending_prayers(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Prayer>>> {
    me.require_admin()?;
    let rows = blocking(&state, |db| db.list_pending_prayers()).await?;
    Ok(Json(rows.into_iter().map(|r| views::prayer(r, &me, Vec::new())).collect()))
}

/// POST /api/admin/prayers/{id}/approve
pub async fn approve_prayer(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Prayer>> {
    me.require_admin()?;
    let row = blocking(&state, move |db| db.approve_prayer(id))
        .await?
        .ok_or(ApiError::NotFound("Prayer not found"))?;
    prayers::announce(&state, &row);
    Ok(Json(views::prayer(row, &me, Vec::new())))
}

/// POST /api/admin/notifications
pub async fn send_announcement(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<AnnouncementRequest>,
) -> ApiResult<Json<AnnouncementResponse>> {
    me.require_admin()?;
    let recipients = blocking(&state, |db| db.active_user_ids(None)).await?;
    let count = recipients.len();

    notify::fan_out(
        &state,
        recipients,
        NewNotification {
            kind: NotificationKind::Announcement,
            title: req.title.trim().to_string(),
            body: req.body.trim().to_string(),
            link: req.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
        },
    );
    info!("Admin {} sent an announcement to {} users", me.id, count);
    Ok(Json(AnnouncementResponse { recipients: count }))
}

/// GET /api/admin/feedback
pub async fn list_feedback(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Feedback>>> {
    me.require_admin()?;
    let rows = blocking(&state, |db| db.list_feedback()).await?;
    Ok(Json(rows.into_iter().map(views::feedback).collect()))
}

/// POST /api/admin/feedback/{id}/read
pub async fn mark_feedback_read(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    me.require_admin()?;
    if !blocking(&state, move |db| db.mark_feedback_read(id)).await? {
        return Err(ApiError::NotFound("Feedback not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/admin/feedback/{id}
pub async fn delete_feedback(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    me.require_admin()?;
    if !blocking(&state, move |db| db.delete_feedback(id)).await? {
        return Err(ApiError::NotFound("Feedback not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/admin/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<UpdateSettingsRequest>,
) -> ApiResult<Json<SiteSettings>> {
    me.require_admin()?;
    let settings = blocking(&state, move |db| {
        let mut settings = db.site_settings()?;
        if let Some(moderation) = req.prayer_moderation {
            settings.prayer_moderation = moderation;
        }
        db.save_site_settings(&settings)?;
        Ok(settings)
    })
    .await?;
    Ok(Json(settings))
}
