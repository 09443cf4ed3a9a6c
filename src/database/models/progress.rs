use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::StudyMode;

/// One row per user per flashcard
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CardProgress {
    pub user_id: Uuid,
    pub flashcard_id: Uuid,
    pub confidence_level: i32,
    pub times_reviewed: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub deck_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub mode: StudyMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cards_studied: i32,
    pub correct_count: i32,
    pub total_questions: i32,
    pub duration_seconds: i64,
}

impl StudySession {
    pub fn is_completed(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn score_percent(&self) -> Option<f64> {
        (self.total_questions > 0).then(|| self.correct_count as f64 * 100.0 / self.total_questions as f64)
    }
}
