use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Deck {
    pub id: Uuid,
    pub class_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_premium: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Flashcard {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub question: String,
    pub answer: String,
    pub explanation: Option<String>,
    pub sort_order: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A quiz question hangs off exactly one of a deck or a flashcard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum QuizParent {
    Deck(Uuid),
    Flashcard(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub deck_id: Option<Uuid>,
    pub flashcard_id: Option<Uuid>,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub explanation: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuizQuestion {
    pub fn parent(&self) -> Option<QuizParent> {
        match (self.deck_id, self.flashcard_id) {
            (Some(deck), None) => Some(QuizParent::Deck(deck)),
            (None, Some(card)) => Some(QuizParent::Flashcard(card)),
            _ => None,
        }
    }

    pub fn belongs_to(&self, parent: QuizParent) -> bool {
        self.parent() == Some(parent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClass {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassPatch {
    pub name: Option<String>,
    /// An empty string clears the description
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeck {
    pub class_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckPatch {
    pub class_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_premium: Option<bool>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFlashcard {
    pub deck_id: Uuid,
    pub question: String,
    pub answer: String,
    pub explanation: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashcardPatch {
    pub deck_id: Option<Uuid>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub explanation: Option<String>,
    pub sort_order: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuizQuestion {
    pub parent: QuizParent,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub explanation: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizQuestionPatch {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_index: Option<i32>,
    pub explanation: Option<String>,
    pub sort_order: Option<i32>,
}

fn default_true() -> bool {
    true
}
