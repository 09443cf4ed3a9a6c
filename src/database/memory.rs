//! In-memory `Store` implementation.
//!
//! Everything lives behind one `RwLock`, so each trait call is atomic with
//! respect to the others. Data is lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::*;
use super::store::{Store, StoreResult};
use super::DatabaseError;
use crate::types::{PaymentStatus, UserRole};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    classes: HashMap<Uuid, Class>,
    decks: HashMap<Uuid, Deck>,
    flashcards: HashMap<Uuid, Flashcard>,
    quiz_questions: HashMap<Uuid, QuizQuestion>,
    progress: HashMap<(Uuid, Uuid), CardProgress>,
    sessions: HashMap<Uuid, StudySession>,
    subscriptions: HashMap<Uuid, Subscription>,
    payments: Vec<Payment>,
    webhook_events: HashSet<String>,
    feedback: HashMap<Uuid, Feedback>,
    ai_quotas: HashMap<Uuid, AiQuota>,
    ai_logs: Vec<AiGenerationLog>,
}

impl Inner {
    fn cascade_flashcard(&mut self, flashcard_id: Uuid) {
        self.flashcards.remove(&flashcard_id);
        self.quiz_questions.retain(|_, q| q.flashcard_id != Some(flashcard_id));
        self.progress.retain(|(_, card), _| *card != flashcard_id);
        for f in self.feedback.values_mut() {
            if f.flashcard_id == Some(flashcard_id) {
                f.flashcard_id = None;
            }
        }
        self.clear_dangling_quiz_refs();
    }

    fn cascade_deck(&mut self, deck_id: Uuid) {
        let cards: Vec<Uuid> = self
            .flashcards
            .values()
            .filter(|c| c.deck_id == deck_id)
            .map(|c| c.id)
            .collect();
        for card in cards {
            self.cascade_flashcard(card);
        }
        self.decks.remove(&deck_id);
        self.quiz_questions.retain(|_, q| q.deck_id != Some(deck_id));
        for f in self.feedback.values_mut() {
            if f.deck_id == Some(deck_id) {
                f.deck_id = None;
            }
        }
        for s in self.sessions.values_mut() {
            if s.deck_id == Some(deck_id) {
                s.deck_id = None;
            }
        }
        self.clear_dangling_quiz_refs();
    }

    fn clear_dangling_quiz_refs(&mut self) {
        let questions = &self.quiz_questions;
        for f in self.feedback.values_mut() {
            if let Some(q) = f.quiz_question_id {
                if !questions.contains_key(&q) {
                    f.quiz_question_id = None;
                }
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(what: &str, id: Uuid) -> DatabaseError {
    DatabaseError::NotFound(format!("{} {} not found", what, id))
}

fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(key);
    items
}

/// Empty string clears an optional text field
fn patch_text(target: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *target = Some(v).filter(|s| !s.is_empty());
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert_user(&self, email: &str, name: Option<&str>, promote_admin: bool) -> StoreResult<User> {
        let email = email.trim().to_lowercase();
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        if let Some(user) = inner.users.values_mut().find(|u| u.email == email) {
            if let Some(name) = name {
                user.name = Some(name.to_string());
            }
            if promote_admin {
                user.role = UserRole::Admin;
            }
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            email,
            name: name.map(str::to_string),
            role: if promote_admin { UserRole::Admin } else { UserRole::User },
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self.inner.read().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_class(&self, new: NewClass) -> StoreResult<Class> {
        let now = Utc::now();
        let class = Class {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            sort_order: new.sort_order,
            is_published: new.is_published,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.classes.insert(class.id, class.clone());
        Ok(class)
    }

    async fn update_class(&self, id: Uuid, patch: ClassPatch) -> StoreResult<Class> {
        let mut inner = self.inner.write().await;
        let class = inner.classes.get_mut(&id).ok_or_else(|| not_found("Class", id))?;
        if let Some(name) = patch.name {
            class.name = name;
        }
        patch_text(&mut class.description, patch.description);
        if let Some(order) = patch.sort_order {
            class.sort_order = order;
        }
        if let Some(published) = patch.is_published {
            class.is_published = published;
        }
        class.updated_at = Utc::now();
        Ok(class.clone())
    }

    async fn delete_class(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.classes.contains_key(&id) {
            return Err(not_found("Class", id));
        }
        let decks: Vec<Uuid> = inner.decks.values().filter(|d| d.class_id == id).map(|d| d.id).collect();
        for deck in decks {
            inner.cascade_deck(deck);
        }
        inner.classes.remove(&id);
        for s in inner.sessions.values_mut() {
            if s.class_id == Some(id) {
                s.class_id = None;
            }
        }
        Ok(())
    }

    async fn get_class(&self, id: Uuid) -> StoreResult<Option<Class>> {
        Ok(self.inner.read().await.classes.get(&id).cloned())
    }

    async fn list_classes(&self, include_unpublished: bool) -> StoreResult<Vec<Class>> {
        let inner = self.inner.read().await;
        let items: Vec<Class> = inner
            .classes
            .values()
            .filter(|c| include_unpublished || c.is_published)
            .cloned()
            .collect();
        Ok(sorted(items, |c| (c.sort_order, c.created_at)))
    }

    async fn create_deck(&self, new: NewDeck) -> StoreResult<Deck> {
        let mut inner = self.inner.write().await;
        if !inner.classes.contains_key(&new.class_id) {
            return Err(not_found("Class", new.class_id));
        }
        let now = Utc::now();
        let deck = Deck {
            id: Uuid::new_v4(),
            class_id: new.class_id,
            name: new.name,
            description: new.description,
            sort_order: new.sort_order,
            is_premium: new.is_premium,
            is_published: new.is_published,
            created_at: now,
            updated_at: now,
        };
        inner.decks.insert(deck.id, deck.clone());
        Ok(deck)
    }

    async fn update_deck(&self, id: Uuid, patch: DeckPatch) -> StoreResult<Deck> {
        let mut inner = self.inner.write().await;
        if let Some(class_id) = patch.class_id {
            if !inner.classes.contains_key(&class_id) {
                return Err(not_found("Class", class_id));
            }
        }
        let deck = inner.decks.get_mut(&id).ok_or_else(|| not_found("Deck", id))?;
        if let Some(class_id) = patch.class_id {
            deck.class_id = class_id;
        }
        if let Some(name) = patch.name {
            deck.name = name;
        }
        patch_text(&mut deck.description, patch.description);
        if let Some(order) = patch.sort_order {
            deck.sort_order = order;
        }
        if let Some(premium) = patch.is_premium {
            deck.is_premium = premium;
        }
        if let Some(published) = patch.is_published {
            deck.is_published = published;
        }
        deck.updated_at = Utc::now();
        Ok(deck.clone())
    }

    async fn delete_deck(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.decks.contains_key(&id) {
            return Err(not_found("Deck", id));
        }
        inner.cascade_deck(id);
        Ok(())
    }

    async fn get_deck(&self, id: Uuid) -> StoreResult<Option<Deck>> {
        Ok(self.inner.read().await.decks.get(&id).cloned())
    }

    async fn list_decks(&self, class_id: Uuid, include_unpublished: bool) -> StoreResult<Vec<Deck>> {
        let inner = self.inner.read().await;
        let items: Vec<Deck> = inner
            .decks
            .values()
            .filter(|d| d.class_id == class_id && (include_unpublished || d.is_published))
            .cloned()
            .collect();
        Ok(sorted(items, |d| (d.sort_order, d.created_at)))
    }

    async fn create_flashcard(&self, new: NewFlashcard) -> StoreResult<Flashcard> {
        let mut inner = self.inner.write().await;
        if !inner.decks.contains_key(&new.deck_id) {
            return Err(not_found("Deck", new.deck_id));
        }
        let now = Utc::now();
        let card = Flashcard {
            id: Uuid::new_v4(),
            deck_id: new.deck_id,
            question: new.question,
            answer: new.answer,
            explanation: new.explanation,
            sort_order: new.sort_order,
            is_published: new.is_published,
            created_at: now,
            updated_at: now,
        };
        inner.flashcards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn update_flashcard(&self, id: Uuid, patch: FlashcardPatch) -> StoreResult<Flashcard> {
        let mut inner = self.inner.write().await;
        if let Some(deck_id) = patch.deck_id {
            if !inner.decks.contains_key(&deck_id) {
                return Err(not_found("Deck", deck_id));
            }
        }
        let card = inner.flashcards.get_mut(&id).ok_or_else(|| not_found("Flashcard", id))?;
        if let Some(deck_id) = patch.deck_id {
            card.deck_id = deck_id;
        }
        if let Some(question) = patch.question {
            card.question = question;
        }
        if let Some(answer) = patch.answer {
            card.answer = answer;
        }
        patch_text(&mut card.explanation, patch.explanation);
        if let Some(order) = patch.sort_order {
            card.sort_order = order;
        }
        if let Some(published) = patch.is_published {
            card.is_published = published;
        }
        card.updated_at = Utc::now();
        Ok(card.clone())
    }

    async fn delete_flashcard(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.flashcards.contains_key(&id) {
            return Err(not_found("Flashcard", id));
        }
        inner.cascade_flashcard(id);
        Ok(())
    }

    async fn get_flashcard(&self, id: Uuid) -> StoreResult<Option<Flashcard>> {
        Ok(self.inner.read().await.flashcards.get(&id).cloned())
    }

    async fn list_flashcards(&self, deck_id: Uuid, include_unpublished: bool) -> StoreResult<Vec<Flashcard>> {
        let inner = self.inner.read().await;
        let items: Vec<Flashcard> = inner
            .flashcards
            .values()
            .filter(|c| c.deck_id == deck_id && (include_unpublished || c.is_published))
            .cloned()
            .collect();
        Ok(sorted(items, |c| (c.sort_order, c.created_at)))
    }

    async fn create_quiz_questions(&self, batch: Vec<NewQuizQuestion>) -> StoreResult<Vec<QuizQuestion>> {
        let mut inner = self.inner.write().await;

        // Check every parent first so a bad row leaves nothing behind
        for new in &batch {
            match new.parent {
                QuizParent::Deck(id) if !inner.decks.contains_key(&id) => return Err(not_found("Deck", id)),
                QuizParent::Flashcard(id) if !inner.flashcards.contains_key(&id) => {
                    return Err(not_found("Flashcard", id))
                }
                _ => {}
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(batch.len());
        for new in batch {
            let (deck_id, flashcard_id) = match new.parent {
                QuizParent::Deck(id) => (Some(id), None),
                QuizParent::Flashcard(id) => (None, Some(id)),
            };
            let question = QuizQuestion {
                id: Uuid::new_v4(),
                deck_id,
                flashcard_id,
                question: new.question,
                options: new.options,
                correct_index: new.correct_index,
                explanation: new.explanation,
                sort_order: new.sort_order,
                created_at: now,
                updated_at: now,
            };
            inner.quiz_questions.insert(question.id, question.clone());
            created.push(question);
        }
        Ok(created)
    }

    async fn update_quiz_question(&self, id: Uuid, patch: QuizQuestionPatch) -> StoreResult<QuizQuestion> {
        let mut inner = self.inner.write().await;
        let q = inner.quiz_questions.get_mut(&id).ok_or_else(|| not_found("Quiz question", id))?;
        if let Some(question) = patch.question {
            q.question = question;
        }
        if let Some(options) = patch.options {
            q.options = options;
        }
        if let Some(index) = patch.correct_index {
            q.correct_index = index;
        }
        patch_text(&mut q.explanation, patch.explanation);
        if let Some(order) = patch.sort_order {
            q.sort_order = order;
        }
        q.updated_at = Utc::now();
        Ok(q.clone())
    }

    async fn delete_quiz_question(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .quiz_questions
            .remove(&id)
            .ok_or_else(|| not_found("Quiz question", id))?;
        inner.clear_dangling_quiz_refs();
        Ok(())
    }

    async fn get_quiz_question(&self, id: Uuid) -> StoreResult<Option<QuizQuestion>> {
        Ok(self.inner.read().await.quiz_questions.get(&id).cloned())
    }

    async fn list_quiz_questions(&self, parent: QuizParent) -> StoreResult<Vec<QuizQuestion>> {
        let inner = self.inner.read().await;
        let items: Vec<QuizQuestion> = inner
            .quiz_questions
            .values()
            .filter(|q| q.belongs_to(parent))
            .cloned()
            .collect();
        Ok(sorted(items, |q| (q.sort_order, q.created_at)))
    }

    async fn get_card_progress(&self, user_id: Uuid, flashcard_id: Uuid) -> StoreResult<Option<CardProgress>> {
        Ok(self.inner.read().await.progress.get(&(user_id, flashcard_id)).cloned())
    }

    async fn save_card_progress(&self, progress: &CardProgress) -> StoreResult<CardProgress> {
        let mut inner = self.inner.write().await;
        if !inner.flashcards.contains_key(&progress.flashcard_id) {
            return Err(not_found("Flashcard", progress.flashcard_id));
        }
        inner
            .progress
            .insert((progress.user_id, progress.flashcard_id), progress.clone());
        Ok(progress.clone())
    }

    async fn list_progress_for_cards(&self, user_id: Uuid, flashcard_ids: &[Uuid]) -> StoreResult<Vec<CardProgress>> {
        let inner = self.inner.read().await;
        Ok(flashcard_ids
            .iter()
            .filter_map(|card| inner.progress.get(&(user_id, *card)).cloned())
            .collect())
    }

    async fn list_user_progress(&self, user_id: Uuid) -> StoreResult<Vec<CardProgress>> {
        let inner = self.inner.read().await;
        Ok(inner
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_progress_for_cards(&self, user_id: Uuid, flashcard_ids: &[Uuid]) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let removed = flashcard_ids
            .iter()
            .filter(|card| inner.progress.remove(&(user_id, **card)).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn insert_session(&self, session: &StudySession) -> StoreResult<StudySession> {
        self.inner.write().await.sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<StudySession>> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn update_session(&self, session: &StudySession) -> StoreResult<StudySession> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| not_found("Session", session.id))?;
        *slot = session.clone();
        Ok(session.clone())
    }

    async fn list_sessions(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<StudySession>> {
        let inner = self.inner.read().await;
        let mut items: Vec<StudySession> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn get_subscription(&self, user_id: Uuid) -> StoreResult<Option<Subscription>> {
        Ok(self.inner.read().await.subscriptions.get(&user_id).cloned())
    }

    async fn find_subscription_by_stripe_id(&self, stripe_subscription_id: &str) -> StoreResult<Option<Subscription>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subscriptions
            .values()
            .find(|s| s.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
            .cloned())
    }

    async fn find_subscription_by_customer(&self, stripe_customer_id: &str) -> StoreResult<Option<Subscription>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subscriptions
            .values()
            .find(|s| s.stripe_customer_id.as_deref() == Some(stripe_customer_id))
            .cloned())
    }

    async fn save_subscription(&self, subscription: &Subscription) -> StoreResult<Subscription> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&subscription.user_id) {
            return Err(not_found("User", subscription.user_id));
        }
        let mut saved = subscription.clone();
        if let Some(existing) = inner.subscriptions.get(&subscription.user_id) {
            saved.created_at = existing.created_at;
        }
        saved.updated_at = Utc::now();
        inner.subscriptions.insert(saved.user_id, saved.clone());
        Ok(saved)
    }

    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<Option<Payment>> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&payment.user_id) {
            return Err(not_found("User", payment.user_id));
        }
        if inner.payments.iter().any(|p| payment.same_stripe_object(p)) {
            return Ok(None);
        }
        let row = Payment {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            stripe_session_id: payment.stripe_session_id,
            stripe_payment_intent_id: payment.stripe_payment_intent_id,
            stripe_invoice_id: payment.stripe_invoice_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            status: payment.status,
            plan_type: payment.plan_type,
            created_at: Utc::now(),
        };
        inner.payments.push(row.clone());
        Ok(Some(row))
    }

    async fn settle_invoice_payment(&self, invoice_id: &str, amount_cents: i64) -> StoreResult<Option<Payment>> {
        let mut inner = self.inner.write().await;
        let Some(payment) = inner.payments.iter_mut().find(|p| {
            p.stripe_invoice_id.as_deref() == Some(invoice_id)
                && matches!(p.status, PaymentStatus::Pending | PaymentStatus::Failed)
        }) else {
            return Ok(None);
        };
        payment.status = PaymentStatus::Succeeded;
        payment.amount_cents = amount_cents;
        Ok(Some(payment.clone()))
    }

    async fn find_payment_by_intent(&self, payment_intent_id: &str) -> StoreResult<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .iter()
            .find(|p| p.stripe_payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let payment = inner
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("Payment", id))?;
        payment.status = status;
        Ok(())
    }

    async fn list_payments(&self, user_id: Option<Uuid>) -> StoreResult<Vec<Payment>> {
        let inner = self.inner.read().await;
        let items: Vec<Payment> = inner
            .payments
            .iter()
            .filter(|p| user_id.map_or(true, |u| p.user_id == u))
            .cloned()
            .collect();
        Ok(sorted(items, |p| p.created_at))
    }

    async fn record_webhook_event(&self, event_id: &str, _event_type: &str) -> StoreResult<bool> {
        Ok(self.inner.write().await.webhook_events.insert(event_id.to_string()))
    }

    async fn forget_webhook_event(&self, event_id: &str) -> StoreResult<()> {
        self.inner.write().await.webhook_events.remove(event_id);
        Ok(())
    }

    async fn insert_feedback(&self, new: NewFeedback) -> StoreResult<Feedback> {
        let now = Utc::now();
        let feedback = Feedback {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            flashcard_id: new.target.flashcard_id,
            quiz_question_id: new.target.quiz_question_id,
            deck_id: new.target.deck_id,
            feedback_type: new.feedback_type,
            message: new.message,
            status: crate::types::FeedbackStatus::Open,
            priority: new.priority,
            admin_notes: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.feedback.insert(feedback.id, feedback.clone());
        Ok(feedback)
    }

    async fn get_feedback(&self, id: Uuid) -> StoreResult<Option<Feedback>> {
        Ok(self.inner.read().await.feedback.get(&id).cloned())
    }

    async fn save_feedback(&self, feedback: &Feedback) -> StoreResult<Feedback> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .feedback
            .get_mut(&feedback.id)
            .ok_or_else(|| not_found("Feedback", feedback.id))?;
        *slot = feedback.clone();
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn list_feedback(&self, filter: &FeedbackFilter) -> StoreResult<Vec<Feedback>> {
        let inner = self.inner.read().await;
        let mut items: Vec<Feedback> = inner.feedback.values().filter(|f| filter.matches(f)).cloned().collect();
        items.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then(a.created_at.cmp(&b.created_at))
        });
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(50).max(0) as usize;
        Ok(items.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_ai_quota(&self, user_id: Uuid) -> StoreResult<Option<AiQuota>> {
        Ok(self.inner.read().await.ai_quotas.get(&user_id).cloned())
    }

    async fn save_ai_quota(&self, quota: &AiQuota) -> StoreResult<AiQuota> {
        self.inner.write().await.ai_quotas.insert(quota.user_id, quota.clone());
        Ok(quota.clone())
    }

    async fn insert_ai_log(&self, log: &AiGenerationLog) -> StoreResult<()> {
        self.inner.write().await.ai_logs.push(log.clone());
        Ok(())
    }

    async fn list_ai_logs(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<AiGenerationLog>> {
        let inner = self.inner.read().await;
        let mut items: Vec<AiGenerationLog> = inner.ai_logs.iter().filter(|l| l.user_id == user_id).cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStore, Class, Deck, Flashcard) {
        let store = MemoryStore::new();
        let class = store
            .create_class(NewClass {
                name: "Security and Risk Management".into(),
                description: None,
                sort_order: 1,
                is_published: true,
            })
            .await
            .unwrap();
        let deck = store
            .create_deck(NewDeck {
                class_id: class.id,
                name: "Governance".into(),
                description: None,
                sort_order: 0,
                is_premium: false,
                is_published: true,
            })
            .await
            .unwrap();
        let card = store
            .create_flashcard(NewFlashcard {
                deck_id: deck.id,
                question: "What is due care?".into(),
                answer: "Acting as a prudent person would".into(),
                explanation: None,
                sort_order: 0,
                is_published: true,
            })
            .await
            .unwrap();
        (store, class, deck, card)
    }

    #[tokio::test]
    async fn deleting_class_cascades() {
        let (store, class, deck, card) = seeded().await;
        store
            .create_quiz_questions(vec![NewQuizQuestion {
                parent: QuizParent::Flashcard(card.id),
                question: "Due care means?".into(),
                options: vec!["Prudent action".into(), "Ignoring risk".into()],
                correct_index: 0,
                explanation: None,
                sort_order: 0,
            }])
            .await
            .unwrap();

        store.delete_class(class.id).await.unwrap();

        assert!(store.get_deck(deck.id).await.unwrap().is_none());
        assert!(store.get_flashcard(card.id).await.unwrap().is_none());
        assert!(store
            .list_quiz_questions(QuizParent::Flashcard(card.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn quiz_batch_is_all_or_nothing() {
        let (store, _class, deck, _card) = seeded().await;
        let good = NewQuizQuestion {
            parent: QuizParent::Deck(deck.id),
            question: "Q".into(),
            options: vec!["a".into(), "b".into()],
            correct_index: 1,
            explanation: None,
            sort_order: 0,
        };
        let bad = NewQuizQuestion {
            parent: QuizParent::Deck(Uuid::new_v4()),
            ..good.clone()
        };
        assert!(store.create_quiz_questions(vec![good, bad]).await.is_err());
        assert!(store.list_quiz_questions(QuizParent::Deck(deck.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_payments_are_ignored() {
        let store = MemoryStore::new();
        let user = store.upsert_user("a@example.com", None, false).await.unwrap();
        let payment = NewPayment {
            user_id: user.id,
            stripe_session_id: Some("cs_1".into()),
            stripe_payment_intent_id: Some("pi_1".into()),
            stripe_invoice_id: None,
            amount_cents: 9900,
            currency: "usd".into(),
            status: PaymentStatus::Succeeded,
            plan_type: crate::types::PlanType::Lifetime,
        };
        assert!(store.insert_payment(payment.clone()).await.unwrap().is_some());
        assert!(store.insert_payment(payment).await.unwrap().is_none());
        assert_eq!(store.list_payments(Some(user.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_user_normalizes_email_and_keeps_admin() {
        let store = MemoryStore::new();
        let admin = store.upsert_user("Admin@Example.com", Some("Ada"), true).await.unwrap();
        assert_eq!(admin.email, "admin@example.com");
        let again = store.upsert_user("admin@example.com", None, false).await.unwrap();
        assert_eq!(again.id, admin.id);
        assert_eq!(again.role, UserRole::Admin);
        assert_eq!(again.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn webhook_events_record_once() {
        let store = MemoryStore::new();
        assert!(store.record_webhook_event("evt_1", "checkout.session.completed").await.unwrap());
        assert!(!store.record_webhook_event("evt_1", "checkout.session.completed").await.unwrap());
        store.forget_webhook_event("evt_1").await.unwrap();
        assert!(store.record_webhook_event("evt_1", "checkout.session.completed").await.unwrap());
    }
}
