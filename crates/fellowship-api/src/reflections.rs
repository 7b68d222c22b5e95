use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use fellowship_db::models::{ReflectionFilter, ReflectionRow};
use fellowship_types::api::{
    CommentRequest, CreateReflectionRequest, ReactionRequest, ReactionResponse, ReflectionQuery,
    UpdateReflectionRequest, normalize_tags,
};
use fellowship_types::models::{Comment, ReactionKind, Reflection, TargetType};

use crate::error::{ApiError, ApiResult};
use crate::extract::{QueryParams, ValidJson};
use crate::middleware::CurrentUser;
use crate::social;
use crate::state::{AppState, blocking};
use crate::views;

async fn load(state: &AppState, id: Uuid) -> ApiResult<ReflectionRow> {
    blocking(state, move |db| db.get_reflection(id))
        .await?
        .ok_or(ApiError::NotFound("Reflection not found"))
}

async fn with_reactions(state: &AppState, me: &CurrentUser, row: ReflectionRow) -> ApiResult<Reflection> {
    let (user_id, id) = (me.id, row.id);
    let mut mine = blocking(state, move |db| db.reactions_by_user(user_id, TargetType::Reflection, &[id])).await?;
    Ok(views::reflection(row, mine.remove(&id).unwrap_or_default()))
}

/// GET /api/reflections
pub async fn list_reflections(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    QueryParams(query): QueryParams<ReflectionQuery>,
) -> ApiResult<Json<Vec<Reflection>>> {
    let tag = query.tag.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
    let user_id = me.id;
    let (rows, mut mine) = blocking(&state, move |db| {
        let rows = db.list_reflections(&ReflectionFilter {
            tag: tag.as_deref(),
            before: query.before,
            before_id: query.before_id,
            limit: query.limit,
        })?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mine = db.reactions_by_user(user_id, TargetType::Reflection, &ids)?;
        Ok((rows, mine))
    })
    .await?;

    let reflections = rows
        .into_iter()
        .map(|row| {
            let reactions = mine.remove(&row.id).unwrap_or_default();
            views::reflection(row, reactions)
        })
        .collect();
    Ok(Json(reflections))
}

/// POST /api/reflections
pub async fn create_reflection(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<CreateReflectionRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = me.id;
    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    let tags = normalize_tags(&req.tags);

    let row = blocking(&state, move |db| db.insert_reflection(Uuid::new_v4(), user_id, &title, &content, &tags)).await?;
    Ok((StatusCode::CREATED, Json(views::reflection(row, Vec::new()))))
}

/// GET /api/reflections/{id}
pub async fn get_reflection(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Reflection>> {
    let row = load(&state, id).await?;
    Ok(Json(with_reactions(&state, &me, row).await?))
}

/// PATCH /api/reflections/{id} (owner or admin)
pub async fn update_reflection(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateReflectionRequest>,
) -> ApiResult<Json<Reflection>> {
    let existing = load(&state, id).await?;
    if !me.can_modify(existing.user_id) {
        return Err(ApiError::Forbidden("You can only edit your own reflections"));
    }

    let title = req.title.map(|t| t.trim().to_string()).unwrap_or(existing.title);
    let content = req.content.map(|c| c.trim().to_string()).unwrap_or(existing.content);
    let tags = req.tags.map(|t| normalize_tags(&t)).unwrap_or(existing.tags);

    let row = blocking(&state, move |db| db.update_reflection(id, &title, &content, &tags))
        .await?
        .ok_or(ApiError::NotFound("Reflection not found"))?;
    Ok(Json(with_reactions(&state, &me, row).await?))
}

/// DELETE /api/reflections/{id} (owner or admin, soft delete)
pub async fn delete_reflection(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = load(&state, id).await?;
    if !me.can_modify(existing.user_id) {
        return Err(ApiError::Forbidden("You can only delete your own reflections"));
    }
    if !blocking(&state, move |db| db.soft_delete_reflection(id)).await? {
        return Err(ApiError::NotFound("Reflection not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/reflections/{id}/reactions
pub async fn add_reaction(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<ReactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let summary = social::add_reaction(&state, &me, TargetType::Reflection, id, req.kind).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// DELETE /api/reflections/{id}/reactions/{kind}
pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path((id, kind)): Path<(Uuid, ReactionKind)>,
) -> ApiResult<Json<ReactionResponse>> {
    Ok(Json(social::remove_reaction(&state, &me, TargetType::Reflection, id, kind).await?))
}

/// GET /api/reflections/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    Ok(Json(social::list_comments(&state, &me, TargetType::Reflection, id).await?))
}

/// POST /api/reflections/{id}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let comment = social::add_comment(&state, &me, TargetType::Reflection, id, req.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
