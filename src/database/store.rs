//! Storage abstraction for the study backend.
//!
//! Handlers and services only see `dyn Store`. `PgStore` is the production
//! implementation; `MemoryStore` backs the test suite and database-less local
//! runs. Both enforce the same cascade and uniqueness rules.

use async_trait::async_trait;
use uuid::Uuid;

use super::models::*;
use super::DatabaseError;
use crate::types::PaymentStatus;

pub type StoreResult<T> = Result<T, DatabaseError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity check for /health
    async fn ping(&self) -> StoreResult<()>;

    // Users

    /// Insert or refresh a user by (lowercased) email. `promote_admin` upgrades
    /// the role but never demotes an existing admin.
    async fn upsert_user(&self, email: &str, name: Option<&str>, promote_admin: bool) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    // Content

    async fn create_class(&self, new: NewClass) -> StoreResult<Class>;
    async fn update_class(&self, id: Uuid, patch: ClassPatch) -> StoreResult<Class>;
    /// Cascades to decks, flashcards, quiz questions and progress
    async fn delete_class(&self, id: Uuid) -> StoreResult<()>;
    async fn get_class(&self, id: Uuid) -> StoreResult<Option<Class>>;
    async fn list_classes(&self, include_unpublished: bool) -> StoreResult<Vec<Class>>;

    /// Fails with NotFound when the class does not exist
    async fn create_deck(&self, new: NewDeck) -> StoreResult<Deck>;
    async fn update_deck(&self, id: Uuid, patch: DeckPatch) -> StoreResult<Deck>;
    async fn delete_deck(&self, id: Uuid) -> StoreResult<()>;
    async fn get_deck(&self, id: Uuid) -> StoreResult<Option<Deck>>;
    async fn list_decks(&self, class_id: Uuid, include_unpublished: bool) -> StoreResult<Vec<Deck>>;

    /// Fails with NotFound when the deck does not exist
    async fn create_flashcard(&self, new: NewFlashcard) -> StoreResult<Flashcard>;
    async fn update_flashcard(&self, id: Uuid, patch: FlashcardPatch) -> StoreResult<Flashcard>;
    async fn delete_flashcard(&self, id: Uuid) -> StoreResult<()>;
    async fn get_flashcard(&self, id: Uuid) -> StoreResult<Option<Flashcard>>;
    async fn list_flashcards(&self, deck_id: Uuid, include_unpublished: bool) -> StoreResult<Vec<Flashcard>>;

    /// Inserts the whole batch or nothing
    async fn create_quiz_questions(&self, batch: Vec<NewQuizQuestion>) -> StoreResult<Vec<QuizQuestion>>;
    async fn update_quiz_question(&self, id: Uuid, patch: QuizQuestionPatch) -> StoreResult<QuizQuestion>;
    async fn delete_quiz_question(&self, id: Uuid) -> StoreResult<()>;
    async fn get_quiz_question(&self, id: Uuid) -> StoreResult<Option<QuizQuestion>>;
    async fn list_quiz_questions(&self, parent: QuizParent) -> StoreResult<Vec<QuizQuestion>>;

    // Progress

    async fn get_card_progress(&self, user_id: Uuid, flashcard_id: Uuid) -> StoreResult<Option<CardProgress>>;
    async fn save_card_progress(&self, progress: &CardProgress) -> StoreResult<CardProgress>;
    async fn list_progress_for_cards(&self, user_id: Uuid, flashcard_ids: &[Uuid]) -> StoreResult<Vec<CardProgress>>;
    async fn list_user_progress(&self, user_id: Uuid) -> StoreResult<Vec<CardProgress>>;
    async fn delete_progress_for_cards(&self, user_id: Uuid, flashcard_ids: &[Uuid]) -> StoreResult<u64>;

    // Study sessions

    async fn insert_session(&self, session: &StudySession) -> StoreResult<StudySession>;
    async fn get_session(&self, id: Uuid) -> StoreResult<Option<StudySession>>;
    async fn update_session(&self, session: &StudySession) -> StoreResult<StudySession>;
    /// Most recent first
    async fn list_sessions(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<StudySession>>;

    // Billing

    async fn get_subscription(&self, user_id: Uuid) -> StoreResult<Option<Subscription>>;
    async fn find_subscription_by_stripe_id(&self, stripe_subscription_id: &str) -> StoreResult<Option<Subscription>>;
    async fn find_subscription_by_customer(&self, stripe_customer_id: &str) -> StoreResult<Option<Subscription>>;
    async fn save_subscription(&self, subscription: &Subscription) -> StoreResult<Subscription>;
    /// Returns None when a payment for the same Stripe object already exists
    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<Option<Payment>>;
    /// Moves a pending or failed invoice payment to Succeeded. Returns None
    /// when no such row exists (already succeeded, refunded or unknown).
    async fn settle_invoice_payment(&self, invoice_id: &str, amount_cents: i64) -> StoreResult<Option<Payment>>;
    async fn find_payment_by_intent(&self, payment_intent_id: &str) -> StoreResult<Option<Payment>>;
    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> StoreResult<()>;
    async fn list_payments(&self, user_id: Option<Uuid>) -> StoreResult<Vec<Payment>>;
    /// Records a webhook event id. Returns false if it was already recorded.
    async fn record_webhook_event(&self, event_id: &str, event_type: &str) -> StoreResult<bool>;
    /// Drops a recorded event so a provider retry is processed again
    async fn forget_webhook_event(&self, event_id: &str) -> StoreResult<()>;

    // Feedback

    async fn insert_feedback(&self, new: NewFeedback) -> StoreResult<Feedback>;
    async fn get_feedback(&self, id: Uuid) -> StoreResult<Option<Feedback>>;
    async fn save_feedback(&self, feedback: &Feedback) -> StoreResult<Feedback>;
    /// Highest priority first, then oldest first
    async fn list_feedback(&self, filter: &FeedbackFilter) -> StoreResult<Vec<Feedback>>;

    // AI generation

    async fn get_ai_quota(&self, user_id: Uuid) -> StoreResult<Option<AiQuota>>;
    async fn save_ai_quota(&self, quota: &AiQuota) -> StoreResult<AiQuota>;
    async fn insert_ai_log(&self, log: &AiGenerationLog) -> StoreResult<()>;
    async fn list_ai_logs(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<AiGenerationLog>>;
}
