use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use axum_extra::{TypedHeader, headers::ContentType};
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use fellowship_db::models::{KidsAssetFields, KidsAssetRow};
use fellowship_types::api::{CreateKidsAssetRequest, KidsAssetQuery, UpdateKidsAssetRequest, VerseGameQuery};
use fellowship_types::game::{self, CheckVerseGameRequest, VerseGameResult, VerseGameRound};
use fellowship_types::models::{AssetKind, KidsAsset};
use fellowship_types::validate::Validate;

use crate::error::{ApiError, ApiResult};
use crate::extract::{QueryParams, ValidJson};
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};
use crate::storage::{KIDS_FILE_TYPES, MAX_KIDS_FILE_SIZE, Storage, extension_for};
use crate::views;

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<KidsAssetRow> {
    blocking(state, move |db| db.get_kids_asset(id))
        .await?
        .ok_or(ApiError::NotFound("Asset not found"))
}

/// GET /api/kids/assets
pub async fn list_assets(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<KidsAssetQuery>,
) -> ApiResult<Json<Vec<KidsAsset>>> {
    let rows = blocking(&state, move |db| db.list_kids_assets(query.kind)).await?;
    Ok(Json(rows.into_iter().map(|r| views::kids_asset(&state.storage, r)).collect()))
}

/// GET /api/kids/assets/{id}
pub async fn get_asset(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<KidsAsset>> {
    let row = load(&state, id).await?;
    Ok(Json(views::kids_asset(&state.storage, row)))
}

/// POST /api/kids/assets (admin)
pub async fn create_asset(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<CreateKidsAssetRequest>,
) -> ApiResult<impl IntoResponse> {
    me.require_admin()?;

    let fields = KidsAssetFields {
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        content: trimmed(req.content),
        reference: trimmed(req.reference),
    };
    let (kind, created_by) = (req.kind, me.id);
    let row = blocking(&state, move |db| db.insert_kids_asset(Uuid::new_v4(), kind, created_by, &fields)).await?;
    Ok((StatusCode::CREATED, Json(views::kids_asset(&state.storage, row))))
}

/// PATCH /api/kids/assets/{id} (admin)
pub async fn update_asset(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateKidsAssetRequest>,
) -> ApiResult<Json<KidsAsset>> {
    me.require_admin()?;
    let existing = load(&state, id).await?;

    let mut fields = KidsAssetFields {
        title: existing.title,
        description: existing.description,
        content: existing.content,
        reference: existing.reference,
    };
    if let Some(title) = req.title {
        fields.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        fields.description = description.trim().to_string();
    }
    if let Some(content) = req.content {
        fields.content = trimmed(content);
    }
    if let Some(reference) = req.reference {
        fields.reference = trimmed(reference);
    }
    if existing.kind == AssetKind::Verse && (fields.reference.is_none() || fields.content.is_none()) {
        return Err(ApiError::bad_request("Verses need both a reference and text"));
    }

    let row = blocking(&state, move |db| db.update_kids_asset(id, &fields))
        .await?
        .ok_or(ApiError::NotFound("Asset not found"))?;
    Ok(Json(views::kids_asset(&state.storage, row)))
}

/// DELETE /api/kids/assets/{id} (admin)
pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    me.require_admin()?;
    let row = blocking(&state, move |db| db.delete_kids_asset(id))
        .await?
        .ok_or(ApiError::NotFound("Asset not found"))?;
    if let Some(key) = row.file_key {
        state.storage.delete_quietly(&key).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/kids/assets/{id}/file (admin), raw image or PDF body.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    content_type: Option<TypedHeader<ContentType>>,
    body: Bytes,
) -> ApiResult<Json<KidsAsset>> {
    me.require_admin()?;
    let existing = load(&state, id).await?;
    if existing.kind == AssetKind::Verse {
        return Err(ApiError::bad_request("Files can only be attached to activities and coloring pages"));
    }

    let ext = content_type
        .and_then(|TypedHeader(ct)| extension_for(&ct.to_string(), KIDS_FILE_TYPES))
        .ok_or_else(|| ApiError::bad_request("File must be a PNG, JPEG, WebP image or a PDF"))?;
    if body.is_empty() {
        return Err(ApiError::bad_request("File is empty"));
    }
    if body.len() > MAX_KIDS_FILE_SIZE {
        return Err(ApiError::PayloadTooLarge("File must be at most 10 MB"));
    }

    let key = Storage::new_key("kids", ext);
    state.storage.put(&key, &body).await?;

    let new_key = key.clone();
    let updated = blocking(&state, move |db| db.set_kids_asset_file(id, &new_key)).await?;
    let Some((row, previous)) = updated else {
        state.storage.delete_quietly(&key).await;
        return Err(ApiError::NotFound("Asset not found"));
    };
    if let Some(previous) = previous {
        state.storage.delete_quietly(&previous).await;
    }
    Ok(Json(views::kids_asset(&state.storage, row)))
}

/// GET /api/kids/assets/{id}/download
pub async fn download(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Redirect> {
    let row = load(&state, id).await?;
    let key = row.file_key.ok_or(ApiError::NotFound("Asset has no file"))?;

    if let Err(e) = blocking(&state, move |db| db.increment_downloads(id)).await {
        warn!("Failed to count download of {}: {:#}", id, e);
    }
    Ok(Redirect::temporary(&state.storage.public_url(&key)))
}

/// GET /api/kids/verse-game
pub async fn verse_game(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<VerseGameQuery>,
) -> ApiResult<Json<VerseGameRound>> {
    query.validate().map_err(ApiError::BadRequest)?;

    let verses = blocking(&state, |db| db.list_verses()).await?;
    let round = {
        let mut rng = rand::rng();
        game::deal(&verses, query.pairs, &mut rng)
    };
    round
        .map(Json)
        .ok_or_else(|| ApiError::bad_request("At least two verses are needed to play"))
}

/// POST /api/kids/verse-game/check
pub async fn check_verse_game(ValidJson(req): ValidJson<CheckVerseGameRequest>) -> Json<VerseGameResult> {
    Json(game::check(&req.matches))
}
