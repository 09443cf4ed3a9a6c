// handlers/elevated/admin/ai.rs - AI quiz generation
//
// POST /api/admin/ai/flashcards/:id/generate
// POST /api/admin/ai/decks/:id/generate
// GET  /api/admin/ai/quota

use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::ai::{self, GenerateRequest, GenerationContext, GenerationResult, QuotaStatus};

fn context<'a>(state: &'a AppState, admin: &User) -> GenerationContext<'a> {
    GenerationContext {
        store: state.store.as_ref(),
        generator: state.generator.as_ref(),
        config: &state.config.ai,
        user_id: admin.id,
        now: Utc::now(),
    }
}

/**
 * POST /api/admin/ai/flashcards/:id/generate
 *
 * `{ "count": 5, "save": false }`. Consumes one unit of the caller's daily
 * quota (429 when exhausted). With `save` the valid questions are attached
 * to the flashcard.
 */
pub async fn flashcard_generate(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> ApiResult<GenerationResult> {
    let result = ai::generate_for_flashcard(&context(&state, &admin), id, request).await?;
    Ok(ApiResponse::success(result))
}

pub async fn deck_generate(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> ApiResult<GenerationResult> {
    let result = ai::generate_for_deck(&context(&state, &admin), id, request).await?;
    Ok(ApiResponse::success(result))
}

pub async fn quota_get(State(state): State<AppState>, Extension(AuthUser(admin)): Extension<AuthUser>) -> ApiResult<QuotaStatus> {
    let status = ai::quota_status(state.store.as_ref(), &state.config.ai, admin.id, Utc::now()).await?;
    Ok(ApiResponse::success(status))
}
