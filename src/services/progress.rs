//! Confidence-based progress: rating cards, review scheduling, rollups,
//! the study queue and per-user stats.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::config::StudyConfig;
use crate::database::models::{CardProgress, Flashcard};
use crate::database::Store;
use crate::error::ApiError;
use crate::services::content::{self, Viewer};
use crate::types::{MasteryLevel, StudyMode};

pub const MIN_CONFIDENCE: i32 = 0;
pub const MAX_CONFIDENCE: i32 = 5;

/// Bucket a confidence level. No progress row counts as New.
pub fn mastery_for(confidence: Option<i32>) -> MasteryLevel {
    match confidence {
        None | Some(i32::MIN..=0) => MasteryLevel::New,
        Some(1..=3) => MasteryLevel::Learning,
        Some(_) => MasteryLevel::Mastered,
    }
}

/// Days until the next review for each confidence level
fn review_interval(confidence: i32) -> Duration {
    match confidence {
        i32::MIN..=0 => Duration::zero(),
        1 => Duration::days(1),
        2 => Duration::days(2),
        3 => Duration::days(4),
        4 => Duration::days(7),
        _ => Duration::days(14),
    }
}

pub fn next_review_at(confidence: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    now + review_interval(confidence)
}

#[derive(Debug, Clone, Serialize)]
pub struct RatedCard {
    pub progress: CardProgress,
    pub mastery: MasteryLevel,
}

pub async fn rate_card(
    store: &dyn Store,
    viewer: &Viewer,
    flashcard_id: Uuid,
    confidence: i32,
    now: DateTime<Utc>,
) -> Result<RatedCard, ApiError> {
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&confidence) {
        return Err(ApiError::field(
            "confidence_level",
            format!("confidence_level must be between {} and {}", MIN_CONFIDENCE, MAX_CONFIDENCE),
        ));
    }
    content::visible_flashcard(store, viewer, flashcard_id).await?;

    let existing = store.get_card_progress(viewer.user_id, flashcard_id).await?;
    let progress = CardProgress {
        user_id: viewer.user_id,
        flashcard_id,
        confidence_level: confidence,
        times_reviewed: existing.as_ref().map_or(0, |p| p.times_reviewed) + 1,
        last_reviewed_at: Some(now),
        next_review_at: Some(next_review_at(confidence, now)),
        created_at: existing.as_ref().map_or(now, |p| p.created_at),
        updated_at: now,
    };
    let progress = store.save_card_progress(&progress).await?;
    Ok(RatedCard {
        mastery: mastery_for(Some(progress.confidence_level)),
        progress,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressCounts {
    pub total_cards: usize,
    pub studied_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub mastered_cards: usize,
    /// Mean confidence over studied cards
    pub average_confidence: f64,
    pub mastery_percent: f64,
    #[serde(skip)]
    confidence_sum: i64,
}

impl ProgressCounts {
    fn tally(cards: &[Flashcard], progress: &HashMap<Uuid, &CardProgress>) -> Self {
        let mut counts = ProgressCounts {
            total_cards: cards.len(),
            ..Default::default()
        };
        for card in cards {
            let confidence = progress.get(&card.id).map(|p| p.confidence_level);
            if let Some(level) = confidence {
                counts.studied_cards += 1;
                counts.confidence_sum += level as i64;
            }
            match mastery_for(confidence) {
                MasteryLevel::New => counts.new_cards += 1,
                MasteryLevel::Learning => counts.learning_cards += 1,
                MasteryLevel::Mastered => counts.mastered_cards += 1,
            }
        }
        counts.finish();
        counts
    }

    fn finish(&mut self) {
        self.average_confidence = if self.studied_cards == 0 {
            0.0
        } else {
            round2(self.confidence_sum as f64 / self.studied_cards as f64)
        };
        self.mastery_percent = if self.total_cards == 0 {
            0.0
        } else {
            round2(self.mastered_cards as f64 * 100.0 / self.total_cards as f64)
        };
    }

    fn absorb(&mut self, other: &ProgressCounts) {
        self.total_cards += other.total_cards;
        self.studied_cards += other.studied_cards;
        self.new_cards += other.new_cards;
        self.learning_cards += other.learning_cards;
        self.mastered_cards += other.mastered_cards;
        self.confidence_sum += other.confidence_sum;
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckProgress {
    pub deck_id: Uuid,
    #[serde(flatten)]
    pub counts: ProgressCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassProgress {
    pub class_id: Uuid,
    pub decks: Vec<DeckProgress>,
    pub totals: ProgressCounts,
}

async fn deck_counts(store: &dyn Store, user_id: Uuid, deck_id: Uuid) -> Result<ProgressCounts, ApiError> {
    let cards = store.list_flashcards(deck_id, false).await?;
    let ids: Vec<Uuid> = cards.iter().map(|c| c.id).collect();
    let rows = store.list_progress_for_cards(user_id, &ids).await?;
    let by_card: HashMap<Uuid, &CardProgress> = rows.iter().map(|p| (p.flashcard_id, p)).collect();
    Ok(ProgressCounts::tally(&cards, &by_card))
}

pub async fn deck_progress(store: &dyn Store, viewer: &Viewer, deck_id: Uuid) -> Result<DeckProgress, ApiError> {
    content::visible_deck(store, viewer, deck_id).await?;
    Ok(DeckProgress {
        deck_id,
        counts: deck_counts(store, viewer.user_id, deck_id).await?,
    })
}

pub async fn class_progress(store: &dyn Store, viewer: &Viewer, class_id: Uuid) -> Result<ClassProgress, ApiError> {
    content::visible_class(store, viewer, class_id).await?;

    let mut decks = Vec::new();
    let mut totals = ProgressCounts::default();
    for deck in store.list_decks(class_id, viewer.is_admin).await? {
        let counts = deck_counts(store, viewer.user_id, deck.id).await?;
        totals.absorb(&counts);
        decks.push(DeckProgress {
            deck_id: deck.id,
            counts,
        });
    }
    totals.finish();

    Ok(ClassProgress {
        class_id,
        decks,
        totals,
    })
}

pub async fn reset_deck_progress(store: &dyn Store, viewer: &Viewer, deck_id: Uuid) -> Result<u64, ApiError> {
    content::visible_deck(store, viewer, deck_id).await?;
    let ids: Vec<Uuid> = store
        .list_flashcards(deck_id, true)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let removed = store.delete_progress_for_cards(viewer.user_id, &ids).await?;
    tracing::info!("Reset {} progress rows for user {} in deck {}", removed, viewer.user_id, deck_id);
    Ok(removed)
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueItem {
    pub flashcard: Flashcard,
    pub progress: Option<CardProgress>,
    pub mastery: MasteryLevel,
    pub due: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueOptions {
    pub limit: Option<usize>,
    pub include_all: bool,
}

/// Order cards for study: due first (oldest due first), then unseen cards
/// in deck order, then everything else by soonest review when `include_all`.
pub fn order_queue(
    cards: Vec<Flashcard>,
    progress: Vec<CardProgress>,
    include_all: bool,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<QueueItem> {
    let mut by_card: HashMap<Uuid, CardProgress> = progress.into_iter().map(|p| (p.flashcard_id, p)).collect();

    let mut due = Vec::new();
    let mut unseen = Vec::new();
    let mut later = Vec::new();
    for card in cards {
        match by_card.remove(&card.id) {
            None => unseen.push(QueueItem {
                flashcard: card,
                progress: None,
                mastery: MasteryLevel::New,
                due: true,
            }),
            Some(p) => {
                let is_due = p.next_review_at.map_or(true, |at| at <= now);
                let item = QueueItem {
                    flashcard: card,
                    mastery: mastery_for(Some(p.confidence_level)),
                    progress: Some(p),
                    due: is_due,
                };
                if is_due {
                    due.push(item);
                } else {
                    later.push(item);
                }
            }
        }
    }

    let review_key = |item: &QueueItem| item.progress.as_ref().and_then(|p| p.next_review_at);
    due.sort_by_key(review_key);
    later.sort_by_key(review_key);

    let mut queue = due;
    queue.extend(unseen);
    if include_all {
        queue.extend(later);
    }
    queue.truncate(limit);
    queue
}

pub async fn study_queue(
    store: &dyn Store,
    viewer: &Viewer,
    study: &StudyConfig,
    deck_id: Uuid,
    options: QueueOptions,
    now: DateTime<Utc>,
) -> Result<Vec<QueueItem>, ApiError> {
    content::visible_deck(store, viewer, deck_id).await?;
    let limit = options
        .limit
        .unwrap_or(study.default_queue_size)
        .clamp(1, study.max_queue_size.max(1));

    let cards = store.list_flashcards(deck_id, false).await?;
    let ids: Vec<Uuid> = cards.iter().map(|c| c.id).collect();
    let progress = store.list_progress_for_cards(viewer.user_id, &ids).await?;
    Ok(order_queue(cards, progress, options.include_all, limit, now))
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub cards_studied: usize,
    pub mastered_cards: usize,
    pub total_study_seconds: i64,
    pub sessions_completed: usize,
    pub quiz_average: Option<f64>,
    pub current_streak: u32,
}

/// Consecutive UTC days with a completed session, ending today or yesterday
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}

/// How many sessions feed the stats
const STATS_SESSION_WINDOW: i64 = 10_000;

pub async fn user_stats(store: &dyn Store, user_id: Uuid, now: DateTime<Utc>) -> Result<UserStats, ApiError> {
    let progress = store.list_user_progress(user_id).await?;
    let sessions = store.list_sessions(user_id, STATS_SESSION_WINDOW).await?;

    let completed: Vec<_> = sessions.iter().filter(|s| s.is_completed()).collect();
    let active_days: BTreeSet<NaiveDate> = completed
        .iter()
        .filter_map(|s| s.ended_at.map(|at| at.date_naive()))
        .collect();

    let quiz_scores: Vec<f64> = completed
        .iter()
        .filter(|s| s.mode == StudyMode::Quiz)
        .filter_map(|s| s.score_percent())
        .collect();
    let quiz_average =
        (!quiz_scores.is_empty()).then(|| round2(quiz_scores.iter().sum::<f64>() / quiz_scores.len() as f64));

    Ok(UserStats {
        cards_studied: progress.len(),
        mastered_cards: progress
            .iter()
            .filter(|p| mastery_for(Some(p.confidence_level)) == MasteryLevel::Mastered)
            .count(),
        total_study_seconds: completed.iter().map(|s| s.duration_seconds).sum(),
        sessions_completed: completed.len(),
        quiz_average,
        current_streak: current_streak(&active_days, now.date_naive()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mastery_buckets() {
        assert_eq!(mastery_for(None), MasteryLevel::New);
        assert_eq!(mastery_for(Some(0)), MasteryLevel::New);
        assert_eq!(mastery_for(Some(1)), MasteryLevel::Learning);
        assert_eq!(mastery_for(Some(3)), MasteryLevel::Learning);
        assert_eq!(mastery_for(Some(4)), MasteryLevel::Mastered);
        assert_eq!(mastery_for(Some(5)), MasteryLevel::Mastered);
    }

    #[test]
    fn review_schedule() {
        let now = Utc::now();
        let expected = [(0, 0), (1, 1), (2, 2), (3, 4), (4, 7), (5, 14)];
        for (confidence, days) in expected {
            assert_eq!(next_review_at(confidence, now), now + Duration::days(days), "confidence {}", confidence);
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn streak_counts_back_from_today_or_yesterday() {
        let days: BTreeSet<_> = [day(5), day(6), day(7), day(9)].into_iter().collect();
        assert_eq!(current_streak(&days, day(9)), 1);
        assert_eq!(current_streak(&days, day(8)), 3);
        assert_eq!(current_streak(&days, day(7)), 3);
        assert_eq!(current_streak(&days, day(11)), 0);
        assert_eq!(current_streak(&BTreeSet::new(), day(1)), 0);
    }

    fn card(order: i32) -> Flashcard {
        let now = Utc::now();
        Flashcard {
            id: Uuid::new_v4(),
            deck_id: Uuid::nil(),
            question: format!("Q{}", order),
            answer: "A".into(),
            explanation: None,
            sort_order: order,
            is_published: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn seen(card: &Flashcard, confidence: i32, next: DateTime<Utc>) -> CardProgress {
        CardProgress {
            user_id: Uuid::nil(),
            flashcard_id: card.id,
            confidence_level: confidence,
            times_reviewed: 1,
            last_reviewed_at: Some(next),
            next_review_at: Some(next),
            created_at: next,
            updated_at: next,
        }
    }

    #[test]
    fn queue_puts_due_before_unseen() {
        let now = Utc::now();
        let cards: Vec<_> = (0..4).map(card).collect();
        let progress = vec![
            seen(&cards[0], 5, now + Duration::days(3)),
            seen(&cards[1], 1, now - Duration::hours(1)),
            seen(&cards[2], 2, now - Duration::days(2)),
        ];

        let queue = order_queue(cards.clone(), progress.clone(), false, 20, now);
        let ids: Vec<_> = queue.iter().map(|q| q.flashcard.id).collect();
        assert_eq!(ids, vec![cards[2].id, cards[1].id, cards[3].id]);

        let all = order_queue(cards.clone(), progress, true, 20, now);
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].flashcard.id, cards[0].id);
        assert!(!all[3].due);
    }

    #[test]
    fn queue_respects_limit() {
        let cards: Vec<_> = (0..5).map(card).collect();
        assert_eq!(order_queue(cards, vec![], false, 2, Utc::now()).len(), 2);
    }

    #[test]
    fn counts_roll_up() {
        let cards: Vec<_> = (0..4).map(card).collect();
        let now = Utc::now();
        let rows = [seen(&cards[0], 5, now), seen(&cards[1], 2, now), seen(&cards[2], 0, now)];
        let by_card: HashMap<Uuid, &CardProgress> = rows.iter().map(|p| (p.flashcard_id, p)).collect();
        let counts = ProgressCounts::tally(&cards, &by_card);
        assert_eq!(counts.total_cards, 4);
        assert_eq!(counts.studied_cards, 3);
        assert_eq!(counts.new_cards, 2);
        assert_eq!(counts.learning_cards, 1);
        assert_eq!(counts.mastered_cards, 1);
        assert_eq!(counts.average_confidence, 2.33);
        assert_eq!(counts.mastery_percent, 25.0);
    }
}
