// handlers/protected/sessions.rs - study sessions and quiz submission
//
// POST /api/sessions
// PUT  /api/sessions/:id/end
// GET  /api/sessions?limit=20
// POST /api/decks/:id/quiz/submit
// POST /api/flashcards/:id/quiz/submit

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::viewer;
use crate::app::AppState;
use crate::database::models::{QuizParent, StudySession, User};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::sessions::{self, EndSession, QuizResult, QuizSubmission, StartSession};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn session_start(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(request): ApiJson<StartSession>,
) -> ApiResult<StudySession> {
    let viewer = viewer(&state, &user).await?;
    let session = sessions::start_session(state.store.as_ref(), &viewer, request, Utc::now()).await?;
    Ok(ApiResponse::created(session))
}

pub async fn session_end(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<EndSession>,
) -> ApiResult<StudySession> {
    let session = sessions::end_session(state.store.as_ref(), user.id, id, request, Utc::now()).await?;
    Ok(ApiResponse::success(session))
}

pub async fn sessions_list(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<StudySession>> {
    Ok(ApiResponse::success(sessions::list_sessions(state.store.as_ref(), user.id, query.limit).await?))
}

async fn submit(state: AppState, user: User, parent: QuizParent, submission: QuizSubmission) -> ApiResult<QuizResult> {
    let viewer = viewer(&state, &user).await?;
    let result = sessions::submit_quiz(state.store.as_ref(), &viewer, parent, submission, Utc::now()).await?;
    Ok(ApiResponse::success(result))
}

pub async fn deck_quiz_submit(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(submission): ApiJson<QuizSubmission>,
) -> ApiResult<QuizResult> {
    submit(state, user, QuizParent::Deck(id), submission).await
}

pub async fn flashcard_quiz_submit(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(submission): ApiJson<QuizSubmission>,
) -> ApiResult<QuizResult> {
    submit(state, user, QuizParent::Flashcard(id), submission).await
}
