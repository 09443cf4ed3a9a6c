//! User feedback on content, and the admin triage queue.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{Feedback, FeedbackFilter, FeedbackTarget, NewFeedback};
use crate::database::Store;
use crate::error::ApiError;
use crate::services::content::{self, Viewer};
use crate::types::{FeedbackPriority, FeedbackStatus, FeedbackType};

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const DEFAULT_PAGE: i64 = 50;
pub const MAX_PAGE: i64 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFeedback {
    #[serde(flatten)]
    pub target: FeedbackTarget,
    pub feedback_type: FeedbackType,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackUpdate {
    pub status: Option<FeedbackStatus>,
    pub priority: Option<FeedbackPriority>,
    pub admin_notes: Option<String>,
}

pub fn default_priority(feedback_type: FeedbackType) -> FeedbackPriority {
    match feedback_type {
        FeedbackType::IncorrectAnswer => FeedbackPriority::High,
        _ => FeedbackPriority::Medium,
    }
}

fn clean_message(message: &str) -> Result<String, ApiError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ApiError::field("message", "message is required"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::field(
            "message",
            format!("message must be at most {} characters", MAX_MESSAGE_CHARS),
        ));
    }
    Ok(message.to_string())
}

/// The target must exist and be visible to the submitter
async fn check_target(store: &dyn Store, viewer: &Viewer, target: &FeedbackTarget) -> Result<(), ApiError> {
    if target.is_empty() {
        return Err(ApiError::bad_request(
            "One of flashcard_id, quiz_question_id or deck_id is required",
        ));
    }
    if let Some(id) = target.flashcard_id {
        content::visible_flashcard(store, viewer, id).await?;
    }
    if let Some(id) = target.quiz_question_id {
        let parent = store
            .get_quiz_question(id)
            .await?
            .and_then(|question| question.parent())
            .ok_or_else(|| ApiError::not_found(format!("Quiz question {} not found", id)))?;
        content::visible_quiz_parent(store, viewer, parent).await?;
    }
    if let Some(id) = target.deck_id {
        content::visible_deck(store, viewer, id).await?;
    }
    Ok(())
}

pub async fn submit(store: &dyn Store, viewer: &Viewer, request: SubmitFeedback) -> Result<Feedback, ApiError> {
    let message = clean_message(&request.message)?;
    check_target(store, viewer, &request.target).await?;
    let user_id = viewer.user_id;

    let feedback = store
        .insert_feedback(NewFeedback {
            user_id,
            target: request.target,
            feedback_type: request.feedback_type,
            message,
            priority: default_priority(request.feedback_type),
        })
        .await?;
    info!(
        "User {} filed {} feedback {} ({})",
        user_id, feedback.feedback_type, feedback.id, feedback.priority
    );
    Ok(feedback)
}

pub async fn list_mine(store: &dyn Store, user_id: Uuid) -> Result<Vec<Feedback>, ApiError> {
    let filter = FeedbackFilter {
        user_id: Some(user_id),
        limit: Some(MAX_PAGE),
        ..Default::default()
    };
    Ok(store.list_feedback(&filter).await?)
}

/// Triage queue: highest priority first, then oldest first
pub async fn admin_list(store: &dyn Store, mut filter: FeedbackFilter) -> Result<Vec<Feedback>, ApiError> {
    filter.limit = Some(filter.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE));
    filter.offset = Some(filter.offset.unwrap_or(0).max(0));
    Ok(store.list_feedback(&filter).await?)
}

/// Apply a status transition. Closing stamps the resolver, reopening clears it.
pub fn apply_update(feedback: &mut Feedback, update: FeedbackUpdate, admin_id: Uuid, now: DateTime<Utc>) {
    if let Some(status) = update.status {
        if status != feedback.status {
            if status.is_closed() {
                feedback.resolved_at = Some(now);
                feedback.resolved_by = Some(admin_id);
            } else {
                feedback.resolved_at = None;
                feedback.resolved_by = None;
            }
            feedback.status = status;
        }
    }
    if let Some(priority) = update.priority {
        feedback.priority = priority;
    }
    if let Some(notes) = update.admin_notes {
        let notes = notes.trim().to_string();
        feedback.admin_notes = (!notes.is_empty()).then_some(notes);
    }
    feedback.updated_at = now;
}

pub async fn admin_update(
    store: &dyn Store,
    admin_id: Uuid,
    id: Uuid,
    update: FeedbackUpdate,
    now: DateTime<Utc>,
) -> Result<Feedback, ApiError> {
    let mut feedback = store
        .get_feedback(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Feedback {} not found", id)))?;

    let previous = feedback.status;
    apply_update(&mut feedback, update, admin_id, now);
    let feedback = store.save_feedback(&feedback).await?;

    if previous != feedback.status {
        info!(
            "Admin {} moved feedback {} from {} to {}",
            admin_id, feedback.id, previous, feedback.status
        );
    }
    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn feedback() -> Feedback {
        let now = Utc::now();
        Feedback {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            flashcard_id: Some(Uuid::new_v4()),
            quiz_question_id: None,
            deck_id: None,
            feedback_type: FeedbackType::Typo,
            message: "Spelling of Kerberos".into(),
            status: FeedbackStatus::Open,
            priority: FeedbackPriority::Medium,
            admin_notes: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn incorrect_answers_are_high_priority() {
        assert_eq!(default_priority(FeedbackType::IncorrectAnswer), FeedbackPriority::High);
        assert_eq!(default_priority(FeedbackType::Unclear), FeedbackPriority::Medium);
    }

    #[test]
    fn message_bounds() {
        assert!(clean_message("   ").is_err());
        assert_eq!(clean_message("  ok  ").unwrap(), "ok");
        assert!(clean_message(&"x".repeat(MAX_MESSAGE_CHARS)).is_ok());
        assert!(clean_message(&"x".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
    }

    #[test]
    fn resolving_then_reopening() {
        let admin = Uuid::new_v4();
        let now = Utc::now();
        let mut item = feedback();

        apply_update(
            &mut item,
            FeedbackUpdate {
                status: Some(FeedbackStatus::Resolved),
                admin_notes: Some("fixed".into()),
                ..Default::default()
            },
            admin,
            now,
        );
        assert_eq!(item.resolved_by, Some(admin));
        assert_eq!(item.resolved_at, Some(now));
        assert_eq!(item.admin_notes.as_deref(), Some("fixed"));

        apply_update(
            &mut item,
            FeedbackUpdate {
                status: Some(FeedbackStatus::InReview),
                ..Default::default()
            },
            admin,
            now + Duration::minutes(5),
        );
        assert_eq!(item.status, FeedbackStatus::InReview);
        assert!(item.resolved_by.is_none());
        assert!(item.resolved_at.is_none());
    }
}
