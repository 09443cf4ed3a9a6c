use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{FeedbackPriority, FeedbackStatus, FeedbackType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flashcard_id: Option<Uuid>,
    pub quiz_question_id: Option<Uuid>,
    pub deck_id: Option<Uuid>,
    pub feedback_type: FeedbackType,
    pub message: String,
    pub status: FeedbackStatus,
    pub priority: FeedbackPriority,
    pub admin_notes: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the feedback is about; at least one id must be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackTarget {
    pub flashcard_id: Option<Uuid>,
    pub quiz_question_id: Option<Uuid>,
    pub deck_id: Option<Uuid>,
}

impl FeedbackTarget {
    pub fn is_empty(&self) -> bool {
        self.flashcard_id.is_none() && self.quiz_question_id.is_none() && self.deck_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub user_id: Uuid,
    pub target: FeedbackTarget,
    pub feedback_type: FeedbackType,
    pub message: String,
    pub priority: FeedbackPriority,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<FeedbackStatus>,
    pub priority: Option<FeedbackPriority>,
    pub feedback_type: Option<FeedbackType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FeedbackFilter {
    pub fn matches(&self, feedback: &Feedback) -> bool {
        self.user_id.map_or(true, |u| feedback.user_id == u)
            && self.status.map_or(true, |s| feedback.status == s)
            && self.priority.map_or(true, |p| feedback.priority == p)
            && self.feedback_type.map_or(true, |t| feedback.feedback_type == t)
    }
}
