use axum::{Extension, Json, extract::State};
use axum_extra::{TypedHeader, headers::ContentType};
use bytes::Bytes;

use fellowship_types::api::{ChangePasswordRequest, UpdateProfileRequest};
use fellowship_types::models::User;

use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::extract::ValidJson;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};
use crate::storage::{AVATAR_TYPES, MAX_AVATAR_SIZE, Storage, extension_for};
use crate::views;

async fn load_user(state: &AppState, id: uuid::Uuid) -> ApiResult<User> {
    let row = blocking(state, move |db| db.get_user(id))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(views::user(&state.storage, row))
}

/// PATCH /api/users/me
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    if let Some(name) = req.name {
        let id = me.id;
        let name = name.trim().to_string();
        blocking(&state, move |db| db.update_user_name(id, &name)).await?;
    }
    Ok(Json(load_user(&state, me.id).await?))
}

/// PUT /api/users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = me.id;
    let user = blocking(&state, move |db| db.get_user(id))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&req.current_password, &user.password)? {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let hash = hash_password(&req.new_password)?;
    blocking(&state, move |db| db.update_password(id, &hash)).await?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// PUT /api/users/me/avatar, raw image body.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    content_type: Option<TypedHeader<ContentType>>,
    body: Bytes,
) -> ApiResult<Json<User>> {
    let ext = content_type
        .and_then(|TypedHeader(ct)| extension_for(&ct.to_string(), AVATAR_TYPES))
        .ok_or_else(|| ApiError::bad_request("Avatar must be a PNG, JPEG, WebP or GIF image"))?;
    if body.is_empty() {
        return Err(ApiError::bad_request("Image is empty"));
    }
    if body.len() > MAX_AVATAR_SIZE {
        return Err(ApiError::PayloadTooLarge("Avatar must be at most 5 MB"));
    }

    let key = Storage::new_key("avatars", ext);
    state.storage.put(&key, &body).await?;

    let id = me.id;
    let new_key = key.clone();
    let previous = blocking(&state, move |db| db.set_profile_image(id, Some(&new_key))).await?;
    if let Some(previous) = previous {
        state.storage.delete_quietly(&previous).await;
    }

    Ok(Json(load_user(&state, me.id).await?))
}

/// DELETE /api/users/me/avatar
pub async fn delete_avatar(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<User>> {
    let id = me.id;
    let previous = blocking(&state, move |db| db.set_profile_image(id, None)).await?;
    if let Some(previous) = previous {
        state.storage.delete_quietly(&previous).await;
    }
    Ok(Json(load_user(&state, me.id).await?))
}
