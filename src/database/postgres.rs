//! Postgres `Store` implementation.
//!
//! Runtime queries only; cascades are handled by the foreign keys declared in
//! `migrations/`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::*;
use super::store::{Store, StoreResult};
use super::DatabaseError;
use crate::types::{FeedbackStatus, PaymentStatus, UserRole};

const CLASS_COLUMNS: &str = "id, name, description, sort_order, is_published, created_at, updated_at";
const DECK_COLUMNS: &str =
    "id, class_id, name, description, sort_order, is_premium, is_published, created_at, updated_at";
const FLASHCARD_COLUMNS: &str =
    "id, deck_id, question, answer, explanation, sort_order, is_published, created_at, updated_at";
const QUIZ_COLUMNS: &str = "id, deck_id, flashcard_id, question, options, correct_index, explanation, sort_order, created_at, updated_at";
const PROGRESS_COLUMNS: &str = "user_id, flashcard_id, confidence_level, times_reviewed, last_reviewed_at, next_review_at, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, user_id, deck_id, class_id, mode, started_at, ended_at, cards_studied, correct_count, total_questions, duration_seconds";
const SUBSCRIPTION_COLUMNS: &str = "user_id, plan_type, status, stripe_customer_id, stripe_subscription_id, current_period_end, cancel_at_period_end, created_at, updated_at";
const PAYMENT_COLUMNS: &str = "id, user_id, stripe_session_id, stripe_payment_intent_id, stripe_invoice_id, amount_cents, currency, status, plan_type, created_at";
const FEEDBACK_COLUMNS: &str = "id, user_id, flashcard_id, quiz_question_id, deck_id, feedback_type, message, status, priority, admin_notes, resolved_by, resolved_at, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn not_found(what: &str, id: Uuid) -> DatabaseError {
    DatabaseError::NotFound(format!("{} {} not found", what, id))
}

/// `Some("")` clears a nullable text column, `None` leaves it alone
fn text_patch(value: Option<String>) -> (bool, Option<String>) {
    match value {
        Some(v) if v.is_empty() => (true, None),
        Some(v) => (true, Some(v)),
        None => (false, None),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_user(&self, email: &str, name: Option<&str>, promote_admin: bool) -> StoreResult<User> {
        let email = email.trim().to_lowercase();
        let role = if promote_admin { UserRole::Admin } else { UserRole::User };
        let sql = format!(
            "INSERT INTO users (id, email, name, role) VALUES ($1, $2, $3, $4)
             ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, users.name),
                role = CASE WHEN $5 THEN 'admin' ELSE users.role END,
                updated_at = now()
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&email)
            .bind(name)
            .bind(role)
            .bind(promote_admin)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_class(&self, new: NewClass) -> StoreResult<Class> {
        let sql = format!(
            "INSERT INTO classes (id, name, description, sort_order, is_published)
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            CLASS_COLUMNS
        );
        Ok(sqlx::query_as::<_, Class>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.name)
            .bind(new.description)
            .bind(new.sort_order)
            .bind(new.is_published)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_class(&self, id: Uuid, patch: ClassPatch) -> StoreResult<Class> {
        let (set_description, description) = text_patch(patch.description);
        let sql = format!(
            "UPDATE classes SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                sort_order = COALESCE($5, sort_order),
                is_published = COALESCE($6, is_published),
                updated_at = now()
             WHERE id = $1 RETURNING {}",
            CLASS_COLUMNS
        );
        sqlx::query_as::<_, Class>(&sql)
            .bind(id)
            .bind(patch.name)
            .bind(set_description)
            .bind(description)
            .bind(patch.sort_order)
            .bind(patch.is_published)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Class", id))
    }

    async fn delete_class(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("Class", id));
        }
        Ok(())
    }

    async fn get_class(&self, id: Uuid) -> StoreResult<Option<Class>> {
        let sql = format!("SELECT {} FROM classes WHERE id = $1", CLASS_COLUMNS);
        Ok(sqlx::query_as::<_, Class>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn list_classes(&self, include_unpublished: bool) -> StoreResult<Vec<Class>> {
        let sql = format!(
            "SELECT {} FROM classes WHERE $1 OR is_published ORDER BY sort_order, created_at",
            CLASS_COLUMNS
        );
        Ok(sqlx::query_as::<_, Class>(&sql)
            .bind(include_unpublished)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_deck(&self, new: NewDeck) -> StoreResult<Deck> {
        if self.get_class(new.class_id).await?.is_none() {
            return Err(not_found("Class", new.class_id));
        }
        let sql = format!(
            "INSERT INTO decks (id, class_id, name, description, sort_order, is_premium, is_published)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            DECK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Deck>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.class_id)
            .bind(new.name)
            .bind(new.description)
            .bind(new.sort_order)
            .bind(new.is_premium)
            .bind(new.is_published)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_deck(&self, id: Uuid, patch: DeckPatch) -> StoreResult<Deck> {
        if let Some(class_id) = patch.class_id {
            if self.get_class(class_id).await?.is_none() {
                return Err(not_found("Class", class_id));
            }
        }
        let (set_description, description) = text_patch(patch.description);
        let sql = format!(
            "UPDATE decks SET
                class_id = COALESCE($2, class_id),
                name = COALESCE($3, name),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                sort_order = COALESCE($6, sort_order),
                is_premium = COALESCE($7, is_premium),
                is_published = COALESCE($8, is_published),
                updated_at = now()
             WHERE id = $1 RETURNING {}",
            DECK_COLUMNS
        );
        sqlx::query_as::<_, Deck>(&sql)
            .bind(id)
            .bind(patch.class_id)
            .bind(patch.name)
            .bind(set_description)
            .bind(description)
            .bind(patch.sort_order)
            .bind(patch.is_premium)
            .bind(patch.is_published)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Deck", id))
    }

    async fn delete_deck(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM decks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("Deck", id));
        }
        Ok(())
    }

    async fn get_deck(&self, id: Uuid) -> StoreResult<Option<Deck>> {
        let sql = format!("SELECT {} FROM decks WHERE id = $1", DECK_COLUMNS);
        Ok(sqlx::query_as::<_, Deck>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn list_decks(&self, class_id: Uuid, include_unpublished: bool) -> StoreResult<Vec<Deck>> {
        let sql = format!(
            "SELECT {} FROM decks WHERE class_id = $1 AND ($2 OR is_published) ORDER BY sort_order, created_at",
            DECK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Deck>(&sql)
            .bind(class_id)
            .bind(include_unpublished)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_flashcard(&self, new: NewFlashcard) -> StoreResult<Flashcard> {
        if self.get_deck(new.deck_id).await?.is_none() {
            return Err(not_found("Deck", new.deck_id));
        }
        let sql = format!(
            "INSERT INTO flashcards (id, deck_id, question, answer, explanation, sort_order, is_published)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            FLASHCARD_COLUMNS
        );
        Ok(sqlx::query_as::<_, Flashcard>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.deck_id)
            .bind(new.question)
            .bind(new.answer)
            .bind(new.explanation)
            .bind(new.sort_order)
            .bind(new.is_published)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_flashcard(&self, id: Uuid, patch: FlashcardPatch) -> StoreResult<Flashcard> {
        if let Some(deck_id) = patch.deck_id {
            if self.get_deck(deck_id).await?.is_none() {
                return Err(not_found("Deck", deck_id));
            }
        }
        let (set_explanation, explanation) = text_patch(patch.explanation);
        let sql = format!(
            "UPDATE flashcards SET
                deck_id = COALESCE($2, deck_id),
                question = COALESCE($3, question),
                answer = COALESCE($4, answer),
                explanation = CASE WHEN $5 THEN $6 ELSE explanation END,
                sort_order = COALESCE($7, sort_order),
                is_published = COALESCE($8, is_published),
                updated_at = now()
             WHERE id = $1 RETURNING {}",
            FLASHCARD_COLUMNS
        );
        sqlx::query_as::<_, Flashcard>(&sql)
            .bind(id)
            .bind(patch.deck_id)
            .bind(patch.question)
            .bind(patch.answer)
            .bind(set_explanation)
            .bind(explanation)
            .bind(patch.sort_order)
            .bind(patch.is_published)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Flashcard", id))
    }

    async fn delete_flashcard(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM flashcards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("Flashcard", id));
        }
        Ok(())
    }

    async fn get_flashcard(&self, id: Uuid) -> StoreResult<Option<Flashcard>> {
        let sql = format!("SELECT {} FROM flashcards WHERE id = $1", FLASHCARD_COLUMNS);
        Ok(sqlx::query_as::<_, Flashcard>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn list_flashcards(&self, deck_id: Uuid, include_unpublished: bool) -> StoreResult<Vec<Flashcard>> {
        let sql = format!(
            "SELECT {} FROM flashcards WHERE deck_id = $1 AND ($2 OR is_published) ORDER BY sort_order, created_at",
            FLASHCARD_COLUMNS
        );
        Ok(sqlx::query_as::<_, Flashcard>(&sql)
            .bind(deck_id)
            .bind(include_unpublished)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_quiz_questions(&self, batch: Vec<NewQuizQuestion>) -> StoreResult<Vec<QuizQuestion>> {
        let sql = format!(
            "INSERT INTO quiz_questions (id, deck_id, flashcard_id, question, options, correct_index, explanation, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            QUIZ_COLUMNS
        );

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(batch.len());
        for new in batch {
            // Missing parents surface as NotFound rather than a foreign key error
            let (deck_id, flashcard_id, exists) = match new.parent {
                QuizParent::Deck(id) => {
                    let found = sqlx::query("SELECT 1 FROM decks WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                    (Some(id), None, found.is_some())
                }
                QuizParent::Flashcard(id) => {
                    let found = sqlx::query("SELECT 1 FROM flashcards WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                    (None, Some(id), found.is_some())
                }
            };
            if !exists {
                let (what, id) = match new.parent {
                    QuizParent::Deck(id) => ("Deck", id),
                    QuizParent::Flashcard(id) => ("Flashcard", id),
                };
                return Err(not_found(what, id));
            }

            let question = sqlx::query_as::<_, QuizQuestion>(&sql)
                .bind(Uuid::new_v4())
                .bind(deck_id)
                .bind(flashcard_id)
                .bind(new.question)
                .bind(new.options)
                .bind(new.correct_index)
                .bind(new.explanation)
                .bind(new.sort_order)
                .fetch_one(&mut *tx)
                .await?;
            created.push(question);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn update_quiz_question(&self, id: Uuid, patch: QuizQuestionPatch) -> StoreResult<QuizQuestion> {
        let (set_explanation, explanation) = text_patch(patch.explanation);
        let sql = format!(
            "UPDATE quiz_questions SET
                question = COALESCE($2, question),
                options = COALESCE($3, options),
                correct_index = COALESCE($4, correct_index),
                explanation = CASE WHEN $5 THEN $6 ELSE explanation END,
                sort_order = COALESCE($7, sort_order),
                updated_at = now()
             WHERE id = $1 RETURNING {}",
            QUIZ_COLUMNS
        );
        sqlx::query_as::<_, QuizQuestion>(&sql)
            .bind(id)
            .bind(patch.question)
            .bind(patch.options)
            .bind(patch.correct_index)
            .bind(set_explanation)
            .bind(explanation)
            .bind(patch.sort_order)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Quiz question", id))
    }

    async fn delete_quiz_question(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM quiz_questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("Quiz question", id));
        }
        Ok(())
    }

    async fn get_quiz_question(&self, id: Uuid) -> StoreResult<Option<QuizQuestion>> {
        let sql = format!("SELECT {} FROM quiz_questions WHERE id = $1", QUIZ_COLUMNS);
        Ok(sqlx::query_as::<_, QuizQuestion>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_quiz_questions(&self, parent: QuizParent) -> StoreResult<Vec<QuizQuestion>> {
        let (column, id) = match parent {
            QuizParent::Deck(id) => ("deck_id", id),
            QuizParent::Flashcard(id) => ("flashcard_id", id),
        };
        let sql = format!(
            "SELECT {} FROM quiz_questions WHERE {} = $1 ORDER BY sort_order, created_at",
            QUIZ_COLUMNS, column
        );
        Ok(sqlx::query_as::<_, QuizQuestion>(&sql).bind(id).fetch_all(&self.pool).await?)
    }

    async fn get_card_progress(&self, user_id: Uuid, flashcard_id: Uuid) -> StoreResult<Option<CardProgress>> {
        let sql = format!(
            "SELECT {} FROM user_card_progress WHERE user_id = $1 AND flashcard_id = $2",
            PROGRESS_COLUMNS
        );
        Ok(sqlx::query_as::<_, CardProgress>(&sql)
            .bind(user_id)
            .bind(flashcard_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_card_progress(&self, progress: &CardProgress) -> StoreResult<CardProgress> {
        if self.get_flashcard(progress.flashcard_id).await?.is_none() {
            return Err(not_found("Flashcard", progress.flashcard_id));
        }
        let sql = format!(
            "INSERT INTO user_card_progress
                (user_id, flashcard_id, confidence_level, times_reviewed, last_reviewed_at, next_review_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, flashcard_id) DO UPDATE SET
                confidence_level = EXCLUDED.confidence_level,
                times_reviewed = EXCLUDED.times_reviewed,
                last_reviewed_at = EXCLUDED.last_reviewed_at,
                next_review_at = EXCLUDED.next_review_at,
                updated_at = EXCLUDED.updated_at
             RETURNING {}",
            PROGRESS_COLUMNS
        );
        Ok(sqlx::query_as::<_, CardProgress>(&sql)
            .bind(progress.user_id)
            .bind(progress.flashcard_id)
            .bind(progress.confidence_level)
            .bind(progress.times_reviewed)
            .bind(progress.last_reviewed_at)
            .bind(progress.next_review_at)
            .bind(progress.created_at)
            .bind(progress.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_progress_for_cards(&self, user_id: Uuid, flashcard_ids: &[Uuid]) -> StoreResult<Vec<CardProgress>> {
        if flashcard_ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!(
            "SELECT {} FROM user_card_progress WHERE user_id = $1 AND flashcard_id = ANY($2)",
            PROGRESS_COLUMNS
        );
        Ok(sqlx::query_as::<_, CardProgress>(&sql)
            .bind(user_id)
            .bind(flashcard_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_user_progress(&self, user_id: Uuid) -> StoreResult<Vec<CardProgress>> {
        let sql = format!("SELECT {} FROM user_card_progress WHERE user_id = $1", PROGRESS_COLUMNS);
        Ok(sqlx::query_as::<_, CardProgress>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_progress_for_cards(&self, user_id: Uuid, flashcard_ids: &[Uuid]) -> StoreResult<u64> {
        if flashcard_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM user_card_progress WHERE user_id = $1 AND flashcard_id = ANY($2)")
            .bind(user_id)
            .bind(flashcard_ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_session(&self, session: &StudySession) -> StoreResult<StudySession> {
        let sql = format!(
            "INSERT INTO study_sessions
                (id, user_id, deck_id, class_id, mode, started_at, ended_at, cards_studied, correct_count, total_questions, duration_seconds)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            SESSION_COLUMNS
        );
        Ok(sqlx::query_as::<_, StudySession>(&sql)
            .bind(session.id)
            .bind(session.user_id)
            .bind(session.deck_id)
            .bind(session.class_id)
            .bind(session.mode)
            .bind(session.started_at)
            .bind(session.ended_at)
            .bind(session.cards_studied)
            .bind(session.correct_count)
            .bind(session.total_questions)
            .bind(session.duration_seconds)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<StudySession>> {
        let sql = format!("SELECT {} FROM study_sessions WHERE id = $1", SESSION_COLUMNS);
        Ok(sqlx::query_as::<_, StudySession>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_session(&self, session: &StudySession) -> StoreResult<StudySession> {
        let sql = format!(
            "UPDATE study_sessions SET
                ended_at = $2, cards_studied = $3, correct_count = $4,
                total_questions = $5, duration_seconds = $6
             WHERE id = $1 RETURNING {}",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, StudySession>(&sql)
            .bind(session.id)
            .bind(session.ended_at)
            .bind(session.cards_studied)
            .bind(session.correct_count)
            .bind(session.total_questions)
            .bind(session.duration_seconds)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Session", session.id))
    }

    async fn list_sessions(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<StudySession>> {
        let sql = format!(
            "SELECT {} FROM study_sessions WHERE user_id = $1 ORDER BY started_at DESC LIMIT $2",
            SESSION_COLUMNS
        );
        Ok(sqlx::query_as::<_, StudySession>(&sql)
            .bind(user_id)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_subscription(&self, user_id: Uuid) -> StoreResult<Option<Subscription>> {
        let sql = format!("SELECT {} FROM subscriptions WHERE user_id = $1", SUBSCRIPTION_COLUMNS);
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_subscription_by_stripe_id(&self, stripe_subscription_id: &str) -> StoreResult<Option<Subscription>> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE stripe_subscription_id = $1",
            SUBSCRIPTION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(stripe_subscription_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_subscription_by_customer(&self, stripe_customer_id: &str) -> StoreResult<Option<Subscription>> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE stripe_customer_id = $1 ORDER BY updated_at DESC LIMIT 1",
            SUBSCRIPTION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(stripe_customer_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_subscription(&self, subscription: &Subscription) -> StoreResult<Subscription> {
        if self.get_user(subscription.user_id).await?.is_none() {
            return Err(not_found("User", subscription.user_id));
        }
        let sql = format!(
            "INSERT INTO subscriptions
                (user_id, plan_type, status, stripe_customer_id, stripe_subscription_id, current_period_end, cancel_at_period_end, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
             ON CONFLICT (user_id) DO UPDATE SET
                plan_type = EXCLUDED.plan_type,
                status = EXCLUDED.status,
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                stripe_subscription_id = EXCLUDED.stripe_subscription_id,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                updated_at = now()
             RETURNING {}",
            SUBSCRIPTION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(subscription.user_id)
            .bind(subscription.plan_type)
            .bind(subscription.status)
            .bind(&subscription.stripe_customer_id)
            .bind(&subscription.stripe_subscription_id)
            .bind(subscription.current_period_end)
            .bind(subscription.cancel_at_period_end)
            .bind(subscription.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<Option<Payment>> {
        if self.get_user(payment.user_id).await?.is_none() {
            return Err(not_found("User", payment.user_id));
        }
        let sql = format!(
            "INSERT INTO payments
                (id, user_id, stripe_session_id, stripe_payment_intent_id, stripe_invoice_id, amount_cents, currency, status, plan_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT DO NOTHING
             RETURNING {}",
            PAYMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Payment>(&sql)
            .bind(Uuid::new_v4())
            .bind(payment.user_id)
            .bind(payment.stripe_session_id)
            .bind(payment.stripe_payment_intent_id)
            .bind(payment.stripe_invoice_id)
            .bind(payment.amount_cents)
            .bind(payment.currency)
            .bind(payment.status)
            .bind(payment.plan_type)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn settle_invoice_payment(&self, invoice_id: &str, amount_cents: i64) -> StoreResult<Option<Payment>> {
        let sql = format!(
            "UPDATE payments SET status = 'succeeded', amount_cents = $2
             WHERE stripe_invoice_id = $1 AND status IN ('pending', 'failed')
             RETURNING {}",
            PAYMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Payment>(&sql)
            .bind(invoice_id)
            .bind(amount_cents)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_payment_by_intent(&self, payment_intent_id: &str) -> StoreResult<Option<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE stripe_payment_intent_id = $1",
            PAYMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE payments SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("Payment", id));
        }
        Ok(())
    }

    async fn list_payments(&self, user_id: Option<Uuid>) -> StoreResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE $1::uuid IS NULL OR user_id = $1 ORDER BY created_at",
            PAYMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Payment>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn record_webhook_event(&self, event_id: &str, event_type: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO stripe_webhook_events (event_id, event_type) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn forget_webhook_event(&self, event_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM stripe_webhook_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_feedback(&self, new: NewFeedback) -> StoreResult<Feedback> {
        let sql = format!(
            "INSERT INTO feedback
                (id, user_id, flashcard_id, quiz_question_id, deck_id, feedback_type, message, status, priority)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            FEEDBACK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Feedback>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(new.target.flashcard_id)
            .bind(new.target.quiz_question_id)
            .bind(new.target.deck_id)
            .bind(new.feedback_type)
            .bind(new.message)
            .bind(FeedbackStatus::Open)
            .bind(new.priority)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_feedback(&self, id: Uuid) -> StoreResult<Option<Feedback>> {
        let sql = format!("SELECT {} FROM feedback WHERE id = $1", FEEDBACK_COLUMNS);
        Ok(sqlx::query_as::<_, Feedback>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn save_feedback(&self, feedback: &Feedback) -> StoreResult<Feedback> {
        let sql = format!(
            "UPDATE feedback SET
                status = $2, priority = $3, admin_notes = $4,
                resolved_by = $5, resolved_at = $6, updated_at = now()
             WHERE id = $1 RETURNING {}",
            FEEDBACK_COLUMNS
        );
        sqlx::query_as::<_, Feedback>(&sql)
            .bind(feedback.id)
            .bind(feedback.status)
            .bind(feedback.priority)
            .bind(&feedback.admin_notes)
            .bind(feedback.resolved_by)
            .bind(feedback.resolved_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Feedback", feedback.id))
    }

    async fn list_feedback(&self, filter: &FeedbackFilter) -> StoreResult<Vec<Feedback>> {
        let sql = format!(
            "SELECT {} FROM feedback
             WHERE ($1::uuid IS NULL OR user_id = $1)
               AND ($2::text IS NULL OR status = $2)
               AND ($3::text IS NULL OR priority = $3)
               AND ($4::text IS NULL OR feedback_type = $4)
             ORDER BY CASE priority
                        WHEN 'critical' THEN 3 WHEN 'high' THEN 2
                        WHEN 'medium' THEN 1 ELSE 0 END DESC,
                      created_at ASC
             LIMIT $5 OFFSET $6",
            FEEDBACK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Feedback>(&sql)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.priority.map(|p| p.as_str()))
            .bind(filter.feedback_type.map(|t| t.as_str()))
            .bind(filter.limit.unwrap_or(50).max(0))
            .bind(filter.offset.unwrap_or(0).max(0))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_ai_quota(&self, user_id: Uuid) -> StoreResult<Option<AiQuota>> {
        Ok(sqlx::query_as::<_, AiQuota>(
            "SELECT user_id, daily_limit, used_today, reset_hour, last_reset_at FROM ai_generation_quotas WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn save_ai_quota(&self, quota: &AiQuota) -> StoreResult<AiQuota> {
        Ok(sqlx::query_as::<_, AiQuota>(
            "INSERT INTO ai_generation_quotas (user_id, daily_limit, used_today, reset_hour, last_reset_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id) DO UPDATE SET
                daily_limit = EXCLUDED.daily_limit,
                used_today = EXCLUDED.used_today,
                reset_hour = EXCLUDED.reset_hour,
                last_reset_at = EXCLUDED.last_reset_at
             RETURNING user_id, daily_limit, used_today, reset_hour, last_reset_at",
        )
        .bind(quota.user_id)
        .bind(quota.daily_limit)
        .bind(quota.used_today)
        .bind(quota.reset_hour)
        .bind(quota.last_reset_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_ai_log(&self, log: &AiGenerationLog) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO ai_generation_logs
                (id, user_id, flashcard_id, deck_id, model, questions_requested, questions_generated, success, error, duration_ms, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(log.flashcard_id)
        .bind(log.deck_id)
        .bind(&log.model)
        .bind(log.questions_requested)
        .bind(log.questions_generated)
        .bind(log.success)
        .bind(&log.error)
        .bind(log.duration_ms)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_ai_logs(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<AiGenerationLog>> {
        Ok(sqlx::query_as::<_, AiGenerationLog>(
            "SELECT id, user_id, flashcard_id, deck_id, model, questions_requested, questions_generated,
                    success, error, duration_ms, created_at
             FROM ai_generation_logs WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?)
    }
}
