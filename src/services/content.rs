//! Content hierarchy: validation, visibility and admin authoring.
//!
//! Users only ever see published content. Premium decks are listed for
//! everyone but carry `locked: true` and refuse to open without paid access.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use crate::database::models::*;
use crate::database::Store;
use crate::error::ApiError;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// Who is looking at content, resolved once per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub has_paid_access: bool,
}

impl Viewer {
    pub fn can_open(&self, deck: &Deck) -> bool {
        !deck.is_premium || self.is_admin || self.has_paid_access
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckSummary {
    #[serde(flatten)]
    pub deck: Deck,
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDetail {
    #[serde(flatten)]
    pub class: Class,
    pub decks: Vec<DeckSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckDetail {
    #[serde(flatten)]
    pub deck: Deck,
    pub flashcards: Vec<Flashcard>,
}

/// A quiz question before it is attached to a parent. Used by bulk import,
/// the class bundle format and AI generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl QuizDraft {
    /// Trimmed copy of the draft, or the reason it is unusable
    pub fn cleaned(&self) -> Result<QuizDraft, String> {
        let (question, options) = check_quiz(&self.question, &self.options, self.correct_index)?;
        Ok(QuizDraft {
            question,
            options,
            correct_index: self.correct_index,
            explanation: clean_optional(self.explanation.clone()),
            sort_order: self.sort_order,
        })
    }

    pub fn attach(self, parent: QuizParent) -> NewQuizQuestion {
        NewQuizQuestion {
            parent,
            question: self.question,
            options: self.options,
            correct_index: self.correct_index,
            explanation: self.explanation,
            sort_order: self.sort_order,
        }
    }
}

// Validation

pub fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::field(field, format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Patches keep an empty string so the store can clear the column
fn clean_patch_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

fn required_patch(field: &str, value: Option<String>) -> Result<Option<String>, ApiError> {
    value.map(|v| required_text(field, &v)).transpose()
}

/// Checks a multiple-choice question and returns the trimmed question and options
pub fn check_quiz(question: &str, options: &[String], correct_index: i32) -> Result<(String, Vec<String>), String> {
    let question = question.trim();
    if question.is_empty() {
        return Err("question is required".to_string());
    }
    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err(format!(
            "options must have between {} and {} entries",
            MIN_OPTIONS, MAX_OPTIONS
        ));
    }

    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(options.len());
    for option in options {
        let option = option.trim();
        if option.is_empty() {
            return Err("options must not be empty".to_string());
        }
        if !seen.insert(option.to_lowercase()) {
            return Err(format!("options must be distinct, '{}' is repeated", option));
        }
        cleaned.push(option.to_string());
    }

    if correct_index < 0 || correct_index as usize >= cleaned.len() {
        return Err(format!(
            "correct_index must be between 0 and {}",
            cleaned.len() - 1
        ));
    }

    Ok((question.to_string(), cleaned))
}

fn validate_draft(draft: &QuizDraft) -> Result<QuizDraft, ApiError> {
    draft.cleaned().map_err(|problem| ApiError::field("quiz", problem))
}

// Visibility

fn class_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Class {} not found", id))
}

fn deck_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Deck {} not found", id))
}

fn flashcard_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Flashcard {} not found", id))
}

fn premium_required(deck: &Deck) -> ApiError {
    ApiError::forbidden(format!(
        "Deck '{}' is premium content; purchase access to unlock it",
        deck.name
    ))
}

pub async fn visible_class(store: &dyn Store, viewer: &Viewer, id: Uuid) -> Result<Class, ApiError> {
    match store.get_class(id).await? {
        Some(class) if class.is_published || viewer.is_admin => Ok(class),
        _ => Err(class_not_found(id)),
    }
}

/// The deck if the viewer may open it: 404 when hidden, 403 when premium-locked
pub async fn visible_deck(store: &dyn Store, viewer: &Viewer, id: Uuid) -> Result<Deck, ApiError> {
    let deck = match store.get_deck(id).await? {
        Some(deck) if deck.is_published || viewer.is_admin => deck,
        _ => return Err(deck_not_found(id)),
    };
    if !viewer.can_open(&deck) {
        return Err(premium_required(&deck));
    }
    Ok(deck)
}

pub async fn visible_flashcard(store: &dyn Store, viewer: &Viewer, id: Uuid) -> Result<Flashcard, ApiError> {
    let card = match store.get_flashcard(id).await? {
        Some(card) if card.is_published || viewer.is_admin => card,
        _ => return Err(flashcard_not_found(id)),
    };
    visible_deck(store, viewer, card.deck_id).await?;
    Ok(card)
}

pub async fn visible_quiz_parent(store: &dyn Store, viewer: &Viewer, parent: QuizParent) -> Result<(), ApiError> {
    match parent {
        QuizParent::Deck(id) => visible_deck(store, viewer, id).await.map(|_| ()),
        QuizParent::Flashcard(id) => visible_flashcard(store, viewer, id).await.map(|_| ()),
    }
}

// Reads

pub async fn list_classes(store: &dyn Store, viewer: &Viewer) -> Result<Vec<Class>, ApiError> {
    Ok(store.list_classes(viewer.is_admin).await?)
}

pub async fn get_class(store: &dyn Store, viewer: &Viewer, id: Uuid) -> Result<ClassDetail, ApiError> {
    let class = visible_class(store, viewer, id).await?;
    let decks = list_decks(store, viewer, id).await?;
    Ok(ClassDetail { class, decks })
}

pub async fn list_decks(store: &dyn Store, viewer: &Viewer, class_id: Uuid) -> Result<Vec<DeckSummary>, ApiError> {
    visible_class(store, viewer, class_id).await?;
    let decks = store.list_decks(class_id, viewer.is_admin).await?;
    Ok(decks
        .into_iter()
        .map(|deck| DeckSummary {
            locked: !viewer.can_open(&deck),
            deck,
        })
        .collect())
}

pub async fn get_deck(store: &dyn Store, viewer: &Viewer, id: Uuid) -> Result<DeckDetail, ApiError> {
    let deck = visible_deck(store, viewer, id).await?;
    let flashcards = store.list_flashcards(id, viewer.is_admin).await?;
    Ok(DeckDetail { deck, flashcards })
}

pub async fn list_flashcards(store: &dyn Store, viewer: &Viewer, deck_id: Uuid) -> Result<Vec<Flashcard>, ApiError> {
    visible_deck(store, viewer, deck_id).await?;
    Ok(store.list_flashcards(deck_id, viewer.is_admin).await?)
}

pub async fn list_quiz(store: &dyn Store, viewer: &Viewer, parent: QuizParent) -> Result<Vec<QuizQuestion>, ApiError> {
    visible_quiz_parent(store, viewer, parent).await?;
    Ok(store.list_quiz_questions(parent).await?)
}

// Authoring

pub async fn create_class(store: &dyn Store, mut new: NewClass) -> Result<Class, ApiError> {
    new.name = required_text("name", &new.name)?;
    new.description = clean_optional(new.description);
    let class = store.create_class(new).await?;
    info!("Created class {} ({})", class.id, class.name);
    Ok(class)
}

pub async fn update_class(store: &dyn Store, id: Uuid, mut patch: ClassPatch) -> Result<Class, ApiError> {
    patch.name = required_patch("name", patch.name)?;
    patch.description = clean_patch_text(patch.description);
    Ok(store.update_class(id, patch).await?)
}

pub async fn delete_class(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    store.delete_class(id).await?;
    info!("Deleted class {} and its content", id);
    Ok(())
}

pub async fn create_deck(store: &dyn Store, mut new: NewDeck) -> Result<Deck, ApiError> {
    new.name = required_text("name", &new.name)?;
    new.description = clean_optional(new.description);
    let deck = store.create_deck(new).await?;
    info!("Created deck {} in class {}", deck.id, deck.class_id);
    Ok(deck)
}

pub async fn update_deck(store: &dyn Store, id: Uuid, mut patch: DeckPatch) -> Result<Deck, ApiError> {
    patch.name = required_patch("name", patch.name)?;
    patch.description = clean_patch_text(patch.description);
    Ok(store.update_deck(id, patch).await?)
}

pub async fn delete_deck(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    store.delete_deck(id).await?;
    info!("Deleted deck {} and its content", id);
    Ok(())
}

pub async fn create_flashcard(store: &dyn Store, mut new: NewFlashcard) -> Result<Flashcard, ApiError> {
    new.question = required_text("question", &new.question)?;
    new.answer = required_text("answer", &new.answer)?;
    new.explanation = clean_optional(new.explanation);
    Ok(store.create_flashcard(new).await?)
}

pub async fn update_flashcard(store: &dyn Store, id: Uuid, mut patch: FlashcardPatch) -> Result<Flashcard, ApiError> {
    patch.question = required_patch("question", patch.question)?;
    patch.answer = required_patch("answer", patch.answer)?;
    patch.explanation = clean_patch_text(patch.explanation);
    Ok(store.update_flashcard(id, patch).await?)
}

pub async fn delete_flashcard(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    Ok(store.delete_flashcard(id).await?)
}

async fn ensure_quiz_parent(store: &dyn Store, parent: QuizParent) -> Result<(), ApiError> {
    match parent {
        QuizParent::Deck(id) => store.get_deck(id).await?.map(|_| ()).ok_or_else(|| deck_not_found(id)),
        QuizParent::Flashcard(id) => store
            .get_flashcard(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| flashcard_not_found(id)),
    }
}

pub async fn create_quiz_question(store: &dyn Store, new: NewQuizQuestion) -> Result<QuizQuestion, ApiError> {
    let parent = new.parent;
    let draft = validate_draft(&QuizDraft {
        question: new.question,
        options: new.options,
        correct_index: new.correct_index,
        explanation: new.explanation,
        sort_order: new.sort_order,
    })?;
    ensure_quiz_parent(store, parent).await?;

    let mut created = store.create_quiz_questions(vec![draft.attach(parent)]).await?;
    created
        .pop()
        .ok_or_else(|| ApiError::internal_server_error("Quiz question was not created"))
}

/// Applies the patch on top of the stored question and re-validates the result
pub async fn update_quiz_question(
    store: &dyn Store,
    id: Uuid,
    mut patch: QuizQuestionPatch,
) -> Result<QuizQuestion, ApiError> {
    let existing = store
        .get_quiz_question(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Quiz question {} not found", id)))?;

    let merged = QuizDraft {
        question: patch.question.clone().unwrap_or(existing.question),
        options: patch.options.clone().unwrap_or(existing.options),
        correct_index: patch.correct_index.unwrap_or(existing.correct_index),
        explanation: None,
        sort_order: existing.sort_order,
    };
    let cleaned = validate_draft(&merged)?;

    patch.question = patch.question.map(|_| cleaned.question);
    patch.options = patch.options.map(|_| cleaned.options);
    patch.explanation = clean_patch_text(patch.explanation);
    Ok(store.update_quiz_question(id, patch).await?)
}

pub async fn delete_quiz_question(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    Ok(store.delete_quiz_question(id).await?)
}

/// Validates the whole batch before writing anything
pub async fn import_quiz(
    store: &dyn Store,
    parent: QuizParent,
    drafts: Vec<QuizDraft>,
) -> Result<Vec<QuizQuestion>, ApiError> {
    if drafts.is_empty() {
        return Err(ApiError::field("questions", "questions are required"));
    }
    ensure_quiz_parent(store, parent).await?;

    let mut problems = HashMap::new();
    let mut batch = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.iter().enumerate() {
        match draft.cleaned() {
            Ok(clean) => batch.push(clean.attach(parent)),
            Err(problem) => {
                problems.insert(format!("questions[{}]", index), problem);
            }
        }
    }
    if !problems.is_empty() {
        return Err(ApiError::validation_error(
            format!("{} of {} questions are invalid; nothing was imported", problems.len(), drafts.len()),
            Some(problems),
        ));
    }

    let created = store.create_quiz_questions(batch).await?;
    info!("Imported {} quiz questions into {:?}", created.len(), parent);
    Ok(created)
}

// Class bundles (CLI import format)

#[derive(Debug, Clone, Deserialize)]
pub struct ClassBundle {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub decks: Vec<DeckBundle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeckBundle {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub flashcards: Vec<FlashcardBundle>,
    #[serde(default)]
    pub quiz: Vec<QuizDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlashcardBundle {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub quiz: Vec<QuizDraft>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub class_id: Option<Uuid>,
    pub decks: usize,
    pub flashcards: usize,
    pub quiz_questions: usize,
}

/// Checks every name, card and quiz in a bundle before anything is written
pub fn validate_bundle(bundle: &ClassBundle) -> Result<(), ApiError> {
    required_text("name", &bundle.name)?;
    for (d, deck) in bundle.decks.iter().enumerate() {
        let at = |field: &str| format!("decks[{}].{}", d, field);
        if deck.name.trim().is_empty() {
            return Err(ApiError::field(&at("name"), "deck name is required"));
        }
        for (c, card) in deck.flashcards.iter().enumerate() {
            for (field, value) in [("question", &card.question), ("answer", &card.answer)] {
                if value.trim().is_empty() {
                    return Err(ApiError::field(
                        &at(&format!("flashcards[{}].{}", c, field)),
                        format!("deck '{}': flashcard {} is required", deck.name.trim(), field),
                    ));
                }
            }
        }
        for draft in deck.quiz.iter().chain(deck.flashcards.iter().flat_map(|c| c.quiz.iter())) {
            draft
                .cleaned()
                .map_err(|problem| ApiError::field(&at("quiz"), format!("deck '{}': {}", deck.name.trim(), problem)))?;
        }
    }
    Ok(())
}

/// Creates a class with all of its decks, cards and quizzes.
///
/// The whole bundle is validated first, so a bad entry fails the import
/// before the class is created.
pub async fn import_bundle(store: &dyn Store, bundle: ClassBundle) -> Result<ImportSummary, ApiError> {
    validate_bundle(&bundle)?;

    let mut summary = ImportSummary::default();
    let class = create_class(
        store,
        NewClass {
            name: bundle.name,
            description: bundle.description,
            sort_order: bundle.sort_order,
            is_published: bundle.is_published,
        },
    )
    .await?;
    summary.class_id = Some(class.id);

    for deck_bundle in bundle.decks {
        let deck = create_deck(
            store,
            NewDeck {
                class_id: class.id,
                name: deck_bundle.name,
                description: deck_bundle.description,
                sort_order: deck_bundle.sort_order,
                is_premium: deck_bundle.is_premium,
                is_published: deck_bundle.is_published,
            },
        )
        .await?;
        summary.decks += 1;

        for (order, card_bundle) in deck_bundle.flashcards.into_iter().enumerate() {
            let card = create_flashcard(
                store,
                NewFlashcard {
                    deck_id: deck.id,
                    question: card_bundle.question,
                    answer: card_bundle.answer,
                    explanation: card_bundle.explanation,
                    sort_order: order as i32,
                    is_published: true,
                },
            )
            .await?;
            summary.flashcards += 1;
            if !card_bundle.quiz.is_empty() {
                summary.quiz_questions += import_quiz(store, QuizParent::Flashcard(card.id), card_bundle.quiz)
                    .await?
                    .len();
            }
        }

        if !deck_bundle.quiz.is_empty() {
            summary.quiz_questions += import_quiz(store, QuizParent::Deck(deck.id), deck_bundle.quiz)
                .await?
                .len();
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn quiz_rules() {
        assert!(check_quiz("Q", &opts(&["a", "b"]), 1).is_ok());
        assert!(check_quiz("  ", &opts(&["a", "b"]), 0).is_err());
        assert!(check_quiz("Q", &opts(&["a"]), 0).is_err());
        assert!(check_quiz("Q", &opts(&["a", "b", "c", "d", "e", "f", "g"]), 0).is_err());
        assert!(check_quiz("Q", &opts(&["a", " "]), 0).is_err());
        assert!(check_quiz("Q", &opts(&["Yes", "yes "]), 0).is_err());
        assert!(check_quiz("Q", &opts(&["a", "b"]), 2).is_err());
        assert!(check_quiz("Q", &opts(&["a", "b"]), -1).is_err());
    }

    #[test]
    fn quiz_values_are_trimmed() {
        let (q, o) = check_quiz("  What is CIA? ", &opts(&[" Confidentiality ", "Cost"]), 0).unwrap();
        assert_eq!(q, "What is CIA?");
        assert_eq!(o, vec!["Confidentiality", "Cost"]);
    }

    fn viewer(is_admin: bool, paid: bool) -> Viewer {
        Viewer {
            user_id: Uuid::new_v4(),
            is_admin,
            has_paid_access: paid,
        }
    }

    async fn class_with_decks(store: &MemoryStore) -> (Class, Deck, Deck) {
        let class = create_class(
            store,
            NewClass {
                name: " Asset Security ".into(),
                description: Some("  ".into()),
                sort_order: 2,
                is_published: true,
            },
        )
        .await
        .unwrap();
        let free = create_deck(
            store,
            NewDeck {
                class_id: class.id,
                name: "Classification".into(),
                description: None,
                sort_order: 0,
                is_premium: false,
                is_published: true,
            },
        )
        .await
        .unwrap();
        let premium = create_deck(
            store,
            NewDeck {
                class_id: class.id,
                name: "Data Remanence".into(),
                description: None,
                sort_order: 1,
                is_premium: true,
                is_published: true,
            },
        )
        .await
        .unwrap();
        (class, free, premium)
    }

    #[tokio::test]
    async fn create_class_trims_fields() {
        let store = MemoryStore::new();
        let (class, _, _) = class_with_decks(&store).await;
        assert_eq!(class.name, "Asset Security");
        assert_eq!(class.description, None);
    }

    #[tokio::test]
    async fn premium_decks_are_listed_locked() {
        let store = MemoryStore::new();
        let (class, _, premium) = class_with_decks(&store).await;

        let decks = list_decks(&store, &viewer(false, false), class.id).await.unwrap();
        assert_eq!(decks.len(), 2);
        assert!(!decks[0].locked);
        assert!(decks[1].locked);

        let err = get_deck(&store, &viewer(false, false), premium.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        assert!(get_deck(&store, &viewer(false, true), premium.id).await.is_ok());
        assert!(get_deck(&store, &viewer(true, false), premium.id).await.is_ok());
    }

    #[tokio::test]
    async fn unpublished_content_is_admin_only() {
        let store = MemoryStore::new();
        let class = create_class(
            &store,
            NewClass {
                name: "Draft".into(),
                description: None,
                sort_order: 0,
                is_published: false,
            },
        )
        .await
        .unwrap();

        assert!(list_classes(&store, &viewer(false, true)).await.unwrap().is_empty());
        assert_eq!(
            get_class(&store, &viewer(false, true), class.id).await.unwrap_err().status_code(),
            404
        );
        assert_eq!(list_classes(&store, &viewer(true, false)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn import_rejects_whole_batch() {
        let store = MemoryStore::new();
        let (_, deck, _) = class_with_decks(&store).await;
        let good = QuizDraft {
            question: "Which is a data state?".into(),
            options: opts(&["At rest", "At lunch"]),
            correct_index: 0,
            explanation: None,
            sort_order: 0,
        };
        let bad = QuizDraft {
            correct_index: 5,
            ..good.clone()
        };

        let err = import_quiz(&store, QuizParent::Deck(deck.id), vec![good.clone(), bad])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(store.list_quiz_questions(QuizParent::Deck(deck.id)).await.unwrap().is_empty());

        let created = import_quiz(&store, QuizParent::Deck(deck.id), vec![good]).await.unwrap();
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn update_quiz_question_revalidates() {
        let store = MemoryStore::new();
        let (_, deck, _) = class_with_decks(&store).await;
        let q = create_quiz_question(
            &store,
            NewQuizQuestion {
                parent: QuizParent::Deck(deck.id),
                question: "Q".into(),
                options: opts(&["a", "b", "c"]),
                correct_index: 2,
                explanation: None,
                sort_order: 0,
            },
        )
        .await
        .unwrap();

        // Shrinking the options would orphan the correct answer
        let err = update_quiz_question(
            &store,
            q.id,
            QuizQuestionPatch {
                options: Some(opts(&["a", "b"])),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let updated = update_quiz_question(
            &store,
            q.id,
            QuizQuestionPatch {
                options: Some(opts(&["a", "b"])),
                correct_index: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.correct_index, 1);
    }

    #[tokio::test]
    async fn bundle_import_creates_everything() {
        let store = MemoryStore::new();
        let bundle: ClassBundle = serde_json::from_value(serde_json::json!({
            "name": "Communication and Network Security",
            "is_published": true,
            "decks": [{
                "name": "OSI Model",
                "is_published": true,
                "flashcards": [{
                    "question": "Layer 3?",
                    "answer": "Network",
                    "quiz": [{ "question": "Layer 3 is?", "options": ["Network", "Session"], "correct_index": 0 }]
                }],
                "quiz": [{ "question": "How many layers?", "options": ["5", "7"], "correct_index": 1 }]
            }]
        }))
        .unwrap();

        let summary = import_bundle(&store, bundle).await.unwrap();
        assert_eq!(summary.decks, 1);
        assert_eq!(summary.flashcards, 1);
        assert_eq!(summary.quiz_questions, 2);
    }

    #[tokio::test]
    async fn bundle_with_a_blank_card_writes_nothing() {
        let store = MemoryStore::new();
        let bundle: ClassBundle = serde_json::from_value(serde_json::json!({
            "name": "Security Operations",
            "decks": [
                { "name": "Incident Response", "flashcards": [{ "question": "First step?", "answer": "Detection" }] },
                { "name": "Forensics", "flashcards": [{ "question": "Order of volatility?", "answer": "  " }] }
            ]
        }))
        .unwrap();

        match import_bundle(&store, bundle).await {
            Err(ApiError::ValidationError {
                field_errors: Some(errors),
                ..
            }) => assert!(errors.contains_key("decks[1].flashcards[0].answer")),
            other => panic!("expected a validation error, got {:?}", other.map(|s| s.decks)),
        }
        assert!(store.list_classes(true).await.unwrap().is_empty());

        let unnamed: ClassBundle =
            serde_json::from_value(serde_json::json!({ "name": "Domain", "decks": [{ "name": "" }] })).unwrap();
        assert!(validate_bundle(&unnamed).is_err());
    }
}
