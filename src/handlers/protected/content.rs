// handlers/protected/content.rs - read-only content endpoints
//
// GET /api/classes
// GET /api/classes/:id
// GET /api/classes/:id/decks
// GET /api/decks/:id
// GET /api/decks/:id/flashcards
// GET /api/decks/:id/quiz
// GET /api/flashcards/:id/quiz

use axum::{
    extract::{Path, State},
    Extension,
};
use uuid::Uuid;

use super::viewer;
use crate::app::AppState;
use crate::database::models::{Class, Flashcard, QuizParent, QuizQuestion};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::content::{self, ClassDetail, DeckDetail, DeckSummary};

pub async fn classes_list(State(state): State<AppState>, Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<Vec<Class>> {
    let viewer = viewer(&state, &user).await?;
    Ok(ApiResponse::success(content::list_classes(state.store.as_ref(), &viewer).await?))
}

pub async fn class_get(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClassDetail> {
    let viewer = viewer(&state, &user).await?;
    Ok(ApiResponse::success(content::get_class(state.store.as_ref(), &viewer, id).await?))
}

/// Premium decks are listed with `locked: true` for users without access
pub async fn class_decks(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<DeckSummary>> {
    let viewer = viewer(&state, &user).await?;
    Ok(ApiResponse::success(content::list_decks(state.store.as_ref(), &viewer, id).await?))
}

pub async fn deck_get(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeckDetail> {
    let viewer = viewer(&state, &user).await?;
    Ok(ApiResponse::success(content::get_deck(state.store.as_ref(), &viewer, id).await?))
}

pub async fn deck_flashcards(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Flashcard>> {
    let viewer = viewer(&state, &user).await?;
    Ok(ApiResponse::success(content::list_flashcards(state.store.as_ref(), &viewer, id).await?))
}

pub async fn deck_quiz(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<QuizQuestion>> {
    let viewer = viewer(&state, &user).await?;
    let questions = content::list_quiz(state.store.as_ref(), &viewer, QuizParent::Deck(id)).await?;
    Ok(ApiResponse::success(questions))
}

pub async fn flashcard_quiz(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<QuizQuestion>> {
    let viewer = viewer(&state, &user).await?;
    let questions = content::list_quiz(state.store.as_ref(), &viewer, QuizParent::Flashcard(id)).await?;
    Ok(ApiResponse::success(questions))
}
