use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use fellowship_db::models::{NewNotification, NewPrayer, PrayerFilter, PrayerRow};
use fellowship_types::api::{
    CommentRequest, CreatePrayerRequest, PrayerQuery, ReactionRequest, ReactionResponse, UpdatePrayerRequest,
};
use fellowship_types::models::{Comment, NotificationKind, Prayer, PrayerKind, ReactionKind, TargetType};

use crate::error::{ApiError, ApiResult};
use crate::extract::{QueryParams, ValidJson};
use crate::middleware::CurrentUser;
use crate::notify;
use crate::social;
use crate::state::{AppState, blocking};
use crate::views;

/// Loads a live prayer. Unapproved prayers are hidden from everyone but
/// their author and admins.
async fn visible_prayer(state: &AppState, me: &CurrentUser, id: Uuid) -> ApiResult<PrayerRow> {
    let prayer = blocking(state, move |db| db.get_prayer(id)).await?;
    match prayer {
        Some(p) if p.is_approved || me.can_modify(p.user_id) => Ok(p),
        _ => Err(ApiError::NotFound("Prayer not found")),
    }
}

async fn with_reactions(state: &AppState, me: &CurrentUser, row: PrayerRow) -> ApiResult<Prayer> {
    let (user_id, id) = (me.id, row.id);
    let mut mine = blocking(state, move |db| db.reactions_by_user(user_id, TargetType::Prayer, &[id])).await?;
    Ok(views::prayer(row, me, mine.remove(&id).unwrap_or_default()))
}

/// Tells everyone else about a newly visible prayer.
pub fn announce(state: &AppState, prayer: &PrayerRow) {
    let title = match prayer.kind {
        PrayerKind::Request => "New prayer request",
        PrayerKind::Praise => "New praise report",
    };
    let who = if prayer.is_anonymous { "Someone" } else { prayer.author_name.as_str() };
    notify::notify_members(
        state,
        Some(prayer.user_id),
        NewNotification {
            kind: NotificationKind::Prayer,
            title: title.to_string(),
            body: format!("{}: {}", who, notify::excerpt(&prayer.content, 140)),
            link: Some(format!("/prayers/{}", prayer.id)),
        },
    );
}

/// GET /api/prayers
pub async fn list_prayers(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    QueryParams(query): QueryParams<PrayerQuery>,
) -> ApiResult<Json<Vec<Prayer>>> {
    let filter = PrayerFilter {
        viewer: me.id,
        kind: query.kind,
        before: query.before,
        before_id: query.before_id,
        limit: query.limit,
    };
    let user_id = me.id;
    let (rows, mut mine) = blocking(&state, move |db| {
        let rows = db.list_prayers(&filter)?;
        let ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();
        let mine = db.reactions_by_user(user_id, TargetType::Prayer, &ids)?;
        Ok((rows, mine))
    })
    .await?;

    let prayers = rows
        .into_iter()
        .map(|row| {
            let reactions = mine.remove(&row.id).unwrap_or_default();
            views::prayer(row, &me, reactions)
        })
        .collect();
    Ok(Json(prayers))
}

/// POST /api/prayers
pub async fn create_prayer(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<CreatePrayerRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = me.id;
    let is_admin = me.is_admin();
    let content = req.content.trim().to_string();

    let prayer = blocking(&state, move |db| {
        let settings = db.site_settings()?;
        db.insert_prayer(&NewPrayer {
            id: Uuid::new_v4(),
            user_id,
            kind: req.kind,
            content: &content,
            is_anonymous: req.is_anonymous,
            is_approved: !settings.prayer_moderation || is_admin,
        })
    })
    .await?;

    if prayer.is_approved {
        announce(&state, &prayer);
    }
    Ok((StatusCode::CREATED, Json(views::prayer(prayer, &me, Vec::new()))))
}

/// GET /api/prayers/{id}
pub async fn get_prayer(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Prayer>> {
    let prayer = visible_prayer(&state, &me, id).await?;
    Ok(Json(with_reactions(&state, &me, prayer).await?))
}

/// PATCH /api/prayers/{id} (owner or admin)
pub async fn update_prayer(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdatePrayerRequest>,
) -> ApiResult<Json<Prayer>> {
    let existing = visible_prayer(&state, &me, id).await?;
    if !me.can_modify(existing.user_id) {
        return Err(ApiError::Forbidden("You can only edit your own prayers"));
    }

    let kind = req.kind.unwrap_or(existing.kind);
    let content = req.content.map(|c| c.trim().to_string()).unwrap_or(existing.content);
    let is_anonymous = req.is_anonymous.unwrap_or(existing.is_anonymous);
    let is_answered = req.is_answered.unwrap_or(existing.is_answered);

    let prayer = blocking(&state, move |db| db.update_prayer(id, kind, &content, is_anonymous, is_answered))
        .await?
        .ok_or(ApiError::NotFound("Prayer not found"))?;
    Ok(Json(with_reactions(&state, &me, prayer).await?))
}

/// DELETE /api/prayers/{id} (owner or admin, soft delete)
pub async fn delete_prayer(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = visible_prayer(&state, &me, id).await?;
    if !me.can_modify(existing.user_id) {
        return Err(ApiError::Forbidden("You can only delete your own prayers"));
    }
    if !blocking(&state, move |db| db.soft_delete_prayer(id)).await? {
        return Err(ApiError::NotFound("Prayer not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/prayers/{id}/reactions
pub async fn add_reaction(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<ReactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let summary = social::add_reaction(&state, &me, TargetType::Prayer, id, req.kind).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// DELETE /api/prayers/{id}/reactions/{kind}
pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path((id, kind)): Path<(Uuid, ReactionKind)>,
) -> ApiResult<Json<ReactionResponse>> {
    Ok(Json(social::remove_reaction(&state, &me, TargetType::Prayer, id, kind).await?))
}

/// GET /api/prayers/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    Ok(Json(social::list_comments(&state, &me, TargetType::Prayer, id).await?))
}

/// POST /api/prayers/{id}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let comment = social::add_comment(&state, &me, TargetType::Prayer, id, req.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
