// handlers/protected/progress.rs - confidence ratings, rollups and the study queue
//
// POST   /api/progress/cards/:id
// GET    /api/progress/decks/:id
// DELETE /api/progress/decks/:id
// GET    /api/progress/classes/:id
// GET    /api/study/decks/:id/queue
// GET    /api/stats

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::viewer;
use crate::app::AppState;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::progress::{self, ClassProgress, DeckProgress, QueueItem, QueueOptions, RatedCard, UserStats};

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub confidence_level: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueueQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub include_all: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub deck_id: Uuid,
    pub cleared: u64,
}

/// POST /api/progress/cards/:id - rate a flashcard 0..=5
pub async fn card_rate(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<RateRequest>,
) -> ApiResult<RatedCard> {
    let viewer = viewer(&state, &user).await?;
    let rated = progress::rate_card(state.store.as_ref(), &viewer, id, request.confidence_level, Utc::now()).await?;
    Ok(ApiResponse::success(rated))
}

pub async fn deck_progress_get(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeckProgress> {
    let viewer = viewer(&state, &user).await?;
    Ok(ApiResponse::success(progress::deck_progress(state.store.as_ref(), &viewer, id).await?))
}

pub async fn deck_progress_reset(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ResetResponse> {
    let viewer = viewer(&state, &user).await?;
    let cleared = progress::reset_deck_progress(state.store.as_ref(), &viewer, id).await?;
    Ok(ApiResponse::success(ResetResponse { deck_id: id, cleared }))
}

pub async fn class_progress_get(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClassProgress> {
    let viewer = viewer(&state, &user).await?;
    Ok(ApiResponse::success(progress::class_progress(state.store.as_ref(), &viewer, id).await?))
}

/// GET /api/study/decks/:id/queue?limit=20&include_all=false
pub async fn study_queue_get(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Vec<QueueItem>> {
    let viewer = viewer(&state, &user).await?;
    let options = QueueOptions {
        limit: query.limit,
        include_all: query.include_all,
    };
    let queue = progress::study_queue(state.store.as_ref(), &viewer, &state.config.study, id, options, Utc::now()).await?;
    Ok(ApiResponse::success(queue))
}

pub async fn stats_get(State(state): State<AppState>, Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<UserStats> {
    Ok(ApiResponse::success(progress::user_stats(state.store.as_ref(), user.id, Utc::now()).await?))
}
