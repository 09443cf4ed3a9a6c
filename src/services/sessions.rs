//! Study sessions and graded quizzes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use crate::database::models::{QuizParent, QuizQuestion, StudySession};
use crate::database::Store;
use crate::error::ApiError;
use crate::services::content::{self, Viewer};
use crate::types::StudyMode;

pub const DEFAULT_SESSION_LIST: i64 = 20;
pub const MAX_SESSION_LIST: i64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct StartSession {
    pub deck_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub mode: StudyMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndSession {
    #[serde(default)]
    pub cards_studied: i32,
    pub correct_count: Option<i32>,
    pub total_questions: Option<i32>,
}

pub async fn start_session(
    store: &dyn Store,
    viewer: &Viewer,
    request: StartSession,
    now: DateTime<Utc>,
) -> Result<StudySession, ApiError> {
    match (request.deck_id, request.class_id) {
        (Some(deck_id), None) => {
            content::visible_deck(store, viewer, deck_id).await?;
        }
        (None, Some(class_id)) => {
            content::visible_class(store, viewer, class_id).await?;
        }
        _ => {
            return Err(ApiError::bad_request(
                "Exactly one of deck_id or class_id is required",
            ))
        }
    }

    let session = StudySession {
        id: Uuid::new_v4(),
        user_id: viewer.user_id,
        deck_id: request.deck_id,
        class_id: request.class_id,
        mode: request.mode,
        started_at: now,
        ended_at: None,
        cards_studied: 0,
        correct_count: 0,
        total_questions: 0,
        duration_seconds: 0,
    };
    Ok(store.insert_session(&session).await?)
}

pub async fn end_session(
    store: &dyn Store,
    user_id: Uuid,
    session_id: Uuid,
    request: EndSession,
    now: DateTime<Utc>,
) -> Result<StudySession, ApiError> {
    let mut session = match store.get_session(session_id).await? {
        Some(s) if s.user_id == user_id => s,
        _ => return Err(ApiError::not_found(format!("Session {} not found", session_id))),
    };
    if session.is_completed() {
        return Err(ApiError::conflict("Session has already ended"));
    }

    let correct = request.correct_count.unwrap_or(0);
    let total = request.total_questions.unwrap_or(0);
    if request.cards_studied < 0 || correct < 0 || total < 0 {
        return Err(ApiError::bad_request("Session counts must not be negative"));
    }
    if correct > total {
        return Err(ApiError::field(
            "correct_count",
            "correct_count must not exceed total_questions",
        ));
    }

    session.ended_at = Some(now);
    session.duration_seconds = (now - session.started_at).num_seconds().max(0);
    session.cards_studied = request.cards_studied;
    session.correct_count = correct;
    session.total_questions = total;
    let session = store.update_session(&session).await?;
    info!(
        "User {} ended session {} after {}s",
        user_id, session.id, session.duration_seconds
    );
    Ok(session)
}

pub async fn list_sessions(store: &dyn Store, user_id: Uuid, limit: Option<i64>) -> Result<Vec<StudySession>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_SESSION_LIST).clamp(1, MAX_SESSION_LIST);
    Ok(store.list_sessions(user_id, limit).await?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizAnswer {
    pub question_id: Uuid,
    pub selected_index: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizSubmission {
    pub answers: Vec<QuizAnswer>,
    /// When the quiz was opened; defaults to submission time
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question_id: Uuid,
    pub selected_index: i32,
    pub correct_index: i32,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub session_id: Uuid,
    pub total_questions: i32,
    pub correct_count: i32,
    pub score_percent: f64,
    pub results: Vec<QuestionResult>,
}

/// Grade answers against the stored questions. The first answer for a
/// question counts; later duplicates are dropped.
pub fn grade(questions: &[QuizQuestion], answers: &[QuizAnswer]) -> Result<Vec<QuestionResult>, ApiError> {
    let by_id: HashMap<Uuid, &QuizQuestion> = questions.iter().map(|q| (q.id, q)).collect();
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for answer in answers {
        let question = by_id.get(&answer.question_id).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Question {} does not belong to this quiz",
                answer.question_id
            ))
        })?;
        if !seen.insert(answer.question_id) {
            continue;
        }
        results.push(QuestionResult {
            question_id: question.id,
            selected_index: answer.selected_index,
            correct_index: question.correct_index,
            is_correct: answer.selected_index == question.correct_index,
            explanation: question.explanation.clone(),
        });
    }
    Ok(results)
}

pub async fn submit_quiz(
    store: &dyn Store,
    viewer: &Viewer,
    parent: QuizParent,
    submission: QuizSubmission,
    now: DateTime<Utc>,
) -> Result<QuizResult, ApiError> {
    if submission.answers.is_empty() {
        return Err(ApiError::field("answers", "answers are required"));
    }
    content::visible_quiz_parent(store, viewer, parent).await?;

    let questions = store.list_quiz_questions(parent).await?;
    let results = grade(&questions, &submission.answers)?;

    let total = results.len() as i32;
    let correct = results.iter().filter(|r| r.is_correct).count() as i32;
    let score_percent = ((correct as f64 * 100.0 / total as f64) * 100.0).round() / 100.0;

    let deck_id = match parent {
        QuizParent::Deck(id) => id,
        QuizParent::Flashcard(id) => store
            .get_flashcard(id)
            .await?
            .map(|c| c.deck_id)
            .ok_or_else(|| ApiError::not_found(format!("Flashcard {} not found", id)))?,
    };
    let started_at = submission.started_at.filter(|at| *at <= now).unwrap_or(now);

    let session = store
        .insert_session(&StudySession {
            id: Uuid::new_v4(),
            user_id: viewer.user_id,
            deck_id: Some(deck_id),
            class_id: None,
            mode: StudyMode::Quiz,
            started_at,
            ended_at: Some(now),
            cards_studied: total,
            correct_count: correct,
            total_questions: total,
            duration_seconds: (now - started_at).num_seconds(),
        })
        .await?;

    info!(
        "User {} scored {}/{} on {:?}",
        viewer.user_id, correct, total, parent
    );
    Ok(QuizResult {
        session_id: session.id,
        total_questions: total,
        correct_count: correct,
        score_percent,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: i32) -> QuizQuestion {
        let now = Utc::now();
        QuizQuestion {
            id: Uuid::new_v4(),
            deck_id: Some(Uuid::nil()),
            flashcard_id: None,
            question: "Which control is preventive?".into(),
            options: vec!["Fence".into(), "CCTV".into(), "Audit log".into()],
            correct_index: correct,
            explanation: Some("Fences deter and prevent".into()),
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn first_duplicate_answer_wins() {
        let q = question(0);
        let answers = vec![
            QuizAnswer { question_id: q.id, selected_index: 2 },
            QuizAnswer { question_id: q.id, selected_index: 0 },
        ];
        let results = grade(&[q], &answers).unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_correct);
        assert_eq!(results[0].correct_index, 0);
    }

    #[test]
    fn foreign_question_is_rejected() {
        let q = question(1);
        let answers = vec![QuizAnswer {
            question_id: Uuid::new_v4(),
            selected_index: 1,
        }];
        assert_eq!(grade(&[q], &answers).unwrap_err().status_code(), 400);
    }

    #[test]
    fn grades_each_answer() {
        let a = question(1);
        let b = question(2);
        let answers = vec![
            QuizAnswer { question_id: a.id, selected_index: 1 },
            QuizAnswer { question_id: b.id, selected_index: 0 },
        ];
        let results = grade(&[a, b], &answers).unwrap();
        assert_eq!(results.iter().filter(|r| r.is_correct).count(), 1);
        assert_eq!(results[0].explanation.as_deref(), Some("Fences deter and prevent"));
    }
}
