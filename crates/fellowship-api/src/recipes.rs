use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use fellowship_db::models::{RecipeFields, RecipeRow};
use fellowship_types::api::{CreateRecipeRequest, RateRecipeRequest, RatingResponse, RecipeQuery, UpdateRecipeRequest};
use fellowship_types::models::Recipe;

use crate::error::{ApiError, ApiResult};
use crate::extract::{QueryParams, ValidJson};
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};
use crate::views;

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<RecipeRow> {
    blocking(state, move |db| db.get_recipe(id))
        .await?
        .ok_or(ApiError::NotFound("Recipe not found"))
}

async fn with_rating(state: &AppState, me: &CurrentUser, row: RecipeRow) -> ApiResult<Recipe> {
    let (user_id, id) = (me.id, row.id);
    let mut mine = blocking(state, move |db| db.ratings_by_user(user_id, &[id])).await?;
    Ok(views::recipe(row, mine.remove(&id)))
}

/// GET /api/recipes
pub async fn list_recipes(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    QueryParams(query): QueryParams<RecipeQuery>,
) -> ApiResult<Json<Vec<Recipe>>> {
    let user_id = me.id;
    let (rows, mut mine) = blocking(&state, move |db| {
        let rows = db.list_recipes(query.search.as_deref())?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mine = db.ratings_by_user(user_id, &ids)?;
        Ok((rows, mine))
    })
    .await?;

    let recipes = rows
        .into_iter()
        .map(|row| {
            let rating = mine.remove(&row.id);
            views::recipe(row, rating)
        })
        .collect();
    Ok(Json(recipes))
}

/// GET /api/recipes/{id}
pub async fn get_recipe(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Recipe>> {
    let row = load(&state, id).await?;
    Ok(Json(with_rating(&state, &me, row).await?))
}

/// POST /api/recipes
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<CreateRecipeRequest>,
) -> ApiResult<impl IntoResponse> {
    let fields = RecipeFields {
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        ingredients: clean_lines(req.ingredients),
        instructions: req.instructions.trim().to_string(),
        servings: req.servings,
        prep_minutes: req.prep_minutes,
        cook_minutes: req.cook_minutes,
        image_url: req.image_url.map(|u| u.trim().to_string()),
    };
    let user_id = me.id;
    let row = blocking(&state, move |db| db.insert_recipe(Uuid::new_v4(), user_id, &fields)).await?;
    Ok((StatusCode::CREATED, Json(views::recipe(row, None))))
}

/// PATCH /api/recipes/{id} (owner or admin)
pub async fn update_recipe(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateRecipeRequest>,
) -> ApiResult<Json<Recipe>> {
    let existing = load(&state, id).await?;
    if !me.can_modify(existing.user_id) {
        return Err(ApiError::Forbidden("You can only edit your own recipes"));
    }

    let mut fields = existing.fields;
    if let Some(title) = req.title {
        fields.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        fields.description = description.trim().to_string();
    }
    if let Some(ingredients) = req.ingredients {
        fields.ingredients = clean_lines(ingredients);
    }
    if let Some(instructions) = req.instructions {
        fields.instructions = instructions.trim().to_string();
    }
    if let Some(servings) = req.servings {
        fields.servings = servings;
    }
    if let Some(prep_minutes) = req.prep_minutes {
        fields.prep_minutes = prep_minutes;
    }
    if let Some(cook_minutes) = req.cook_minutes {
        fields.cook_minutes = cook_minutes;
    }
    if let Some(image_url) = req.image_url {
        fields.image_url = image_url.map(|u| u.trim().to_string());
    }

    let row = blocking(&state, move |db| db.update_recipe(id, &fields))
        .await?
        .ok_or(ApiError::NotFound("Recipe not found"))?;
    Ok(Json(with_rating(&state, &me, row).await?))
}

/// DELETE /api/recipes/{id} (owner or admin)
pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = load(&state, id).await?;
    if !me.can_modify(existing.user_id) {
        return Err(ApiError::Forbidden("You can only delete your own recipes"));
    }
    if !blocking(&state, move |db| db.delete_recipe(id)).await? {
        return Err(ApiError::NotFound("Recipe not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/recipes/{id}/rating
pub async fn rate_recipe(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<RateRecipeRequest>,
) -> ApiResult<Json<RatingResponse>> {
    let user_id = me.id;
    let score = req.score;
    let summary = blocking(&state, move |db| db.rate_recipe(id, user_id, score))
        .await?
        .ok_or(ApiError::NotFound("Recipe not found"))?;
    Ok(Json(RatingResponse {
        rating_average: summary.average,
        rating_count: summary.count,
        my_rating: Some(score),
    }))
}

/// DELETE /api/recipes/{id}/rating
pub async fn remove_rating(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RatingResponse>> {
    load(&state, id).await?;
    let user_id = me.id;
    let summary = blocking(&state, move |db| db.remove_rating(id, user_id))
        .await?
        .ok_or(ApiError::NotFound("Rating not found"))?;
    Ok(Json(RatingResponse {
        rating_average: summary.average,
        rating_count: summary.count,
        my_rating: None,
    }))
}
