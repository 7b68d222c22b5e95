use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use fellowship_db::models::CommentRow;
use fellowship_types::api::CommentRequest;
use fellowship_types::models::Comment;

use crate::error::{ApiError, ApiResult};
use crate::extract::ValidJson;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};
use crate::views;

async fn owned_comment(state: &AppState, me: &CurrentUser, id: Uuid) -> ApiResult<CommentRow> {
    let comment = blocking(state, move |db| db.get_comment(id))
        .await?
        .ok_or(ApiError::NotFound("Comment not found"))?;
    if !me.can_modify(comment.user_id) {
        return Err(ApiError::Forbidden("You can only change your own comments"));
    }
    Ok(comment)
}

/// PATCH /api/comments/{id}
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    owned_comment(&state, &me, id).await?;
    let content = req.content.trim().to_string();
    let row = blocking(&state, move |db| db.update_comment(id, &content))
        .await?
        .ok_or(ApiError::NotFound("Comment not found"))?;
    Ok(Json(views::comment(row)))
}

/// DELETE /api/comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_comment(&state, &me, id).await?;
    if !blocking(&state, move |db| db.delete_comment(id)).await? {
        return Err(ApiError::NotFound("Comment not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
