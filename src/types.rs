/// Shared enums used across the store, services and handlers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a text-backed enum: serde and sqlx both use the snake_case names,
/// and `as_str`/`FromStr` give the same spelling for CLI and query params.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[serde(rename_all = "snake_case")]
        #[sqlx(type_name = "text", rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

text_enum!(
    /// Role stored on the user row; admins author content and triage feedback
    UserRole {
        User => "user",
        Admin => "admin",
    }
);

text_enum!(
    PlanType {
        Free => "free",
        Lifetime => "lifetime",
        Monthly => "monthly",
        Yearly => "yearly",
    }
);

text_enum!(
    /// Mirrors the Stripe subscription statuses we act on
    SubscriptionStatus {
        Active => "active",
        Trialing => "trialing",
        PastDue => "past_due",
        Canceled => "canceled",
        Incomplete => "incomplete",
        Unpaid => "unpaid",
    }
);

text_enum!(
    PaymentStatus {
        Succeeded => "succeeded",
        Failed => "failed",
        Pending => "pending",
        Refunded => "refunded",
    }
);

text_enum!(
    StudyMode {
        Flashcards => "flashcards",
        Quiz => "quiz",
    }
);

text_enum!(
    MasteryLevel {
        New => "new",
        Learning => "learning",
        Mastered => "mastered",
    }
);

text_enum!(
    FeedbackType {
        IncorrectAnswer => "incorrect_answer",
        Typo => "typo",
        Unclear => "unclear",
        Outdated => "outdated",
        Other => "other",
    }
);

text_enum!(
    FeedbackStatus {
        Open => "open",
        InReview => "in_review",
        Resolved => "resolved",
        Dismissed => "dismissed",
    }
);

text_enum!(
    /// Ordered from least to most urgent; `rank` drives admin triage ordering
    FeedbackPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
);

impl PlanType {
    pub fn is_recurring(&self) -> bool {
        matches!(self, PlanType::Monthly | PlanType::Yearly)
    }
}

impl FeedbackStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, FeedbackStatus::Resolved | FeedbackStatus::Dismissed)
    }
}

impl FeedbackPriority {
    pub fn rank(&self) -> u8 {
        match self {
            FeedbackPriority::Low => 0,
            FeedbackPriority::Medium => 1,
            FeedbackPriority::High => 2,
            FeedbackPriority::Critical => 3,
        }
    }
}
