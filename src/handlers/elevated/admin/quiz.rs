// handlers/elevated/admin/quiz.rs - quiz question authoring and bulk import
//
// POST                  /api/admin/quiz-questions
// GET|PUT|PATCH|DELETE  /api/admin/quiz-questions/:id
// POST                  /api/admin/decks/:id/quiz/import
// POST                  /api/admin/flashcards/:id/quiz/import

use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{NewQuizQuestion, QuizParent, QuizQuestion, QuizQuestionPatch};
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::content::{self, QuizDraft};

/// Bulk import body; the whole batch is rejected if any question is invalid
#[derive(Debug, Deserialize)]
pub struct ImportBody {
    pub questions: Vec<QuizDraft>,
}

/// Body shape: `{ "parent": { "type": "deck", "id": "..." }, "question": ..., "options": [...], "correct_index": 0 }`
pub async fn question_create(State(state): State<AppState>, ApiJson(new): ApiJson<NewQuizQuestion>) -> ApiResult<QuizQuestion> {
    Ok(ApiResponse::created(content::create_quiz_question(state.store.as_ref(), new).await?))
}

pub async fn question_get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<QuizQuestion> {
    let question = state
        .store
        .get_quiz_question(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Quiz question {} not found", id)))?;
    Ok(ApiResponse::success(question))
}

pub async fn question_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<QuizQuestionPatch>,
) -> ApiResult<QuizQuestion> {
    Ok(ApiResponse::success(content::update_quiz_question(state.store.as_ref(), id, patch).await?))
}

pub async fn question_delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    content::delete_quiz_question(state.store.as_ref(), id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn deck_quiz_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<ImportBody>,
) -> ApiResult<Vec<QuizQuestion>> {
    let created = content::import_quiz(state.store.as_ref(), QuizParent::Deck(id), body.questions).await?;
    Ok(ApiResponse::created(created))
}

pub async fn flashcard_quiz_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<ImportBody>,
) -> ApiResult<Vec<QuizQuestion>> {
    let created = content::import_quiz(state.store.as_ref(), QuizParent::Flashcard(id), body.questions).await?;
    Ok(ApiResponse::created(created))
}
