// handlers/elevated/admin/feedback.rs - feedback triage
//
// GET   /api/admin/feedback?status=open&priority=high&feedback_type=typo&limit=50&offset=0
// PATCH /api/admin/feedback/:id

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use chrono::Utc;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Feedback, FeedbackFilter};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::feedback::{self, FeedbackUpdate};

pub async fn feedback_list(State(state): State<AppState>, Query(filter): Query<FeedbackFilter>) -> ApiResult<Vec<Feedback>> {
    Ok(ApiResponse::success(feedback::admin_list(state.store.as_ref(), filter).await?))
}

pub async fn feedback_update(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(update): ApiJson<FeedbackUpdate>,
) -> ApiResult<Feedback> {
    let updated = feedback::admin_update(state.store.as_ref(), admin.id, id, update, Utc::now()).await?;
    Ok(ApiResponse::success(updated))
}
