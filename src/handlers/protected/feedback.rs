// handlers/protected/feedback.rs - user feedback
//
// POST /api/feedback
// GET  /api/feedback

use axum::{extract::State, Extension};

use super::viewer;
use crate::app::AppState;
use crate::database::models::Feedback;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::feedback::{self, SubmitFeedback};

pub async fn feedback_submit(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(request): ApiJson<SubmitFeedback>,
) -> ApiResult<Feedback> {
    let viewer = viewer(&state, &user).await?;
    let created = feedback::submit(state.store.as_ref(), &viewer, request).await?;
    Ok(ApiResponse::created(created))
}

pub async fn feedback_mine(State(state): State<AppState>, Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<Vec<Feedback>> {
    Ok(ApiResponse::success(feedback::list_mine(state.store.as_ref(), user.id).await?))
}
