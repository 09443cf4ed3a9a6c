// handlers/elevated/admin/content.rs - class, deck and flashcard authoring
//
// POST              /api/admin/classes
// PUT|PATCH|DELETE  /api/admin/classes/:id
// POST              /api/admin/decks
// PUT|PATCH|DELETE  /api/admin/decks/:id
// POST              /api/admin/flashcards
// PUT|PATCH|DELETE  /api/admin/flashcards/:id

use axum::extract::{Path, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{
    Class, ClassPatch, Deck, DeckPatch, Flashcard, FlashcardPatch, NewClass, NewDeck, NewFlashcard,
};
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::content;

pub async fn class_create(State(state): State<AppState>, ApiJson(new): ApiJson<NewClass>) -> ApiResult<Class> {
    Ok(ApiResponse::created(content::create_class(state.store.as_ref(), new).await?))
}

pub async fn class_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<ClassPatch>,
) -> ApiResult<Class> {
    Ok(ApiResponse::success(content::update_class(state.store.as_ref(), id, patch).await?))
}

/// Cascades to decks, flashcards, quizzes and progress
pub async fn class_delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    content::delete_class(state.store.as_ref(), id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn deck_create(State(state): State<AppState>, ApiJson(new): ApiJson<NewDeck>) -> ApiResult<Deck> {
    Ok(ApiResponse::created(content::create_deck(state.store.as_ref(), new).await?))
}

pub async fn deck_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<DeckPatch>,
) -> ApiResult<Deck> {
    Ok(ApiResponse::success(content::update_deck(state.store.as_ref(), id, patch).await?))
}

pub async fn deck_delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    content::delete_deck(state.store.as_ref(), id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn flashcard_create(State(state): State<AppState>, ApiJson(new): ApiJson<NewFlashcard>) -> ApiResult<Flashcard> {
    Ok(ApiResponse::created(content::create_flashcard(state.store.as_ref(), new).await?))
}

pub async fn flashcard_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<FlashcardPatch>,
) -> ApiResult<Flashcard> {
    Ok(ApiResponse::success(content::update_flashcard(state.store.as_ref(), id, patch).await?))
}

pub async fn flashcard_delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    content::delete_flashcard(state.store.as_ref(), id).await?;
    Ok(ApiResponse::no_content())
}
