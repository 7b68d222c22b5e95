use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use fellowship_types::api::{CreatePlaylistRequest, ReorderPlaylistsRequest, UpdatePlaylistRequest};
use fellowship_types::models::Playlist;

use crate::error::{ApiError, ApiResult};
use crate::extract::ValidJson;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};
use crate::views;

/// GET /api/playlists
pub async fn list_playlists(State(state): State<AppState>) -> ApiResult<Json<Vec<Playlist>>> {
    let rows = blocking(&state, |db| db.list_playlists()).await?;
    Ok(Json(rows.into_iter().map(views::playlist).collect()))
}

/// POST /api/playlists (admin)
pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<CreatePlaylistRequest>,
) -> ApiResult<impl IntoResponse> {
    me.require_admin()?;
    let title = req.title.trim().to_string();
    let description = req.description.trim().to_string();
    let url = req.url.trim().to_string();

    let row = blocking(&state, move |db| db.insert_playlist(Uuid::new_v4(), &title, &description, &url)).await?;
    Ok((StatusCode::CREATED, Json(views::playlist(row))))
}

/// PATCH /api/playlists/{id} (admin)
pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdatePlaylistRequest>,
) -> ApiResult<Json<Playlist>> {
    me.require_admin()?;

    let row = blocking(&state, move |db| {
        let Some(existing) = db.get_playlist(id)? else {
            return Ok(None);
        };
        let title = req.title.map(|t| t.trim().to_string()).unwrap_or(existing.title);
        let description = req.description.map(|d| d.trim().to_string()).unwrap_or(existing.description);
        let url = req.url.map(|u| u.trim().to_string()).unwrap_or(existing.url);
        db.update_playlist(id, &title, &description, &url)
    })
    .await?
    .ok_or(ApiError::NotFound("Playlist not found"))?;
    Ok(Json(views::playlist(row)))
}

/// DELETE /api/playlists/{id} (admin)
pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    me.require_admin()?;
    if !blocking(&state, move |db| db.delete_playlist(id)).await? {
        return Err(ApiError::NotFound("Playlist not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/playlists/reorder (admin)
pub async fn reorder_playlists(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<ReorderPlaylistsRequest>,
) -> ApiResult<Json<Vec<Playlist>>> {
    me.require_admin()?;

    let rows = blocking(&state, move |db| {
        if !db.reorder_playlists(&req.ids)? {
            return Ok(None);
        }
        db.list_playlists().map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::bad_request("Reorder must list every playlist exactly once"))?;
    Ok(Json(rows.into_iter().map(views::playlist).collect()))
}
