use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use fellowship_types::api::CreateFeedbackRequest;

use crate::error::ApiResult;
use crate::extract::ValidJson;
use crate::middleware::CurrentUser;
use crate::notify;
use crate::state::{AppState, blocking};

/// POST /api/feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<CreateFeedbackRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = me.id;
    let category = req.category;
    let message = req.message.trim().to_string();
    let stored = message.clone();
    let id = blocking(&state, move |db| db.insert_feedback(user_id, category, &stored)).await?;

    notify::alert_admins(
        &state,
        format!("New {} feedback from {}", category.as_str(), me.name),
        format!("{} <{}> wrote:\n\n{}\n\n{}/admin/feedback", me.name, me.email, message, state.public_url),
    );
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}
