pub mod ai;
pub mod billing;
pub mod content;
pub mod feedback;
pub mod progress;
pub mod user;

pub use ai::{AiGenerationLog, AiQuota};
pub use billing::{NewPayment, Payment, Subscription};
pub use content::{
    Class, ClassPatch, Deck, DeckPatch, Flashcard, FlashcardPatch, NewClass, NewDeck, NewFlashcard,
    NewQuizQuestion, QuizParent, QuizQuestion, QuizQuestionPatch,
};
pub use feedback::{Feedback, FeedbackFilter, FeedbackTarget, NewFeedback};
pub use progress::{CardProgress, StudySession};
pub use user::User;
