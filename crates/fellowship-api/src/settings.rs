use axum::{Json, extract::State};

use fellowship_types::models::SiteSettings;

use crate::error::ApiResult;
use crate::state::{AppState, blocking};

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SiteSettings>> {
    Ok(Json(blocking(&state, |db| db.site_settings()).await?))
}
