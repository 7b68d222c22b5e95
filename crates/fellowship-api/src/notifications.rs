use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use fellowship_types::api::{NotificationQuery, RegisterDeviceRequest, UnreadCountResponse};
use fellowship_types::models::{Notification, NotificationPreferences};

use crate::error::{ApiError, ApiResult};
use crate::extract::{QueryParams, ValidJson};
use crate::middleware::CurrentUser;
use crate::notify;
use crate::state::{AppState, blocking};
use crate::views;

const MAX_PAGE: u32 = 100;

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    QueryParams(query): QueryParams<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let user_id = me.id;
    let limit = query.limit.clamp(1, MAX_PAGE);
    let rows = blocking(&state, move |db| db.list_notifications(user_id, query.unread_only, limit)).await?;
    Ok(Json(rows.into_iter().map(views::notification).collect()))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<UnreadCountResponse>> {
    let user_id = me.id;
    let count = blocking(&state, move |db| db.unread_count(user_id)).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let user_id = me.id;
    if !blocking(&state, move |db| db.mark_notification_read(user_id, id)).await? {
        return Err(ApiError::NotFound("Notification not found"));
    }
    notify::refresh_badge(&state, user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = me.id;
    let updated = blocking(&state, move |db| db.mark_all_notifications_read(user_id)).await?;
    if updated > 0 {
        notify::refresh_badge(&state, user_id);
    }
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// DELETE /api/notifications/{id}
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let user_id = me.id;
    if !blocking(&state, move |db| db.delete_notification(user_id, id)).await? {
        return Err(ApiError::NotFound("Notification not found"));
    }
    notify::refresh_badge(&state, user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/notifications/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<NotificationPreferences>> {
    let user_id = me.id;
    let prefs = blocking(&state, move |db| db.notification_preferences(user_id)).await?;
    Ok(Json(prefs))
}

/// PUT /api/notifications/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(prefs): ValidJson<NotificationPreferences>,
) -> ApiResult<Json<NotificationPreferences>> {
    let user_id = me.id;
    blocking(&state, move |db| db.save_notification_preferences(user_id, &prefs)).await?;
    Ok(Json(prefs))
}

/// POST /api/devices
pub async fn register_device(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<RegisterDeviceRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = me.id;
    let token = req.token.trim().to_string();
    let row = blocking(&state, move |db| db.upsert_device_token(user_id, &token, req.platform)).await?;
    Ok((StatusCode::CREATED, Json(views::device_token(row))))
}

/// DELETE /api/devices/{token}
pub async fn remove_device(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(token): Path<String>,
) -> ApiResult<StatusCode> {
    let user_id = me.id;
    if !blocking(&state, move |db| db.delete_device_token(user_id, &token)).await? {
        return Err(ApiError::NotFound("Device not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
