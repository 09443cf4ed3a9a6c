//! Admin-triggered quiz generation with a per-user daily quota.
//!
//! Every call consumes one unit of quota and writes one row to the
//! generation log, whether or not the provider produced anything usable.

pub mod generator;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AiConfig;
use crate::database::models::{AiGenerationLog, AiQuota, QuizParent, QuizQuestion};
use crate::database::Store;
use crate::error::ApiError;
use crate::services::content::{self, QuizDraft};

pub use generator::{
    generator_for, DisabledGenerator, GenerationPrompt, GeneratorError, OpenAiGenerator, QuizGenerator,
    StubGenerator,
};

pub const DEFAULT_QUESTION_COUNT: usize = 5;
/// Flashcards included in a deck prompt
const DECK_PROMPT_CARDS: usize = 40;

// Quota

/// Most recent reset boundary at or before `now`
pub fn last_reset_boundary(reset_hour: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let today = midnight + Duration::hours(reset_hour.clamp(0, 23) as i64);
    if today > now {
        today - Duration::days(1)
    } else {
        today
    }
}

pub fn next_reset_at(reset_hour: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    last_reset_boundary(reset_hour, now) + Duration::days(1)
}

/// Zero the counter if a boundary has passed since the last reset
pub fn roll_over(quota: &mut AiQuota, now: DateTime<Utc>) -> bool {
    if last_reset_boundary(quota.reset_hour, now) > quota.last_reset_at {
        quota.used_today = 0;
        quota.last_reset_at = now;
        true
    } else {
        false
    }
}

fn default_quota(config: &AiConfig, user_id: Uuid, now: DateTime<Utc>) -> AiQuota {
    AiQuota {
        user_id,
        daily_limit: config.default_daily_limit,
        used_today: 0,
        reset_hour: config.default_reset_hour,
        last_reset_at: now,
    }
}

async fn load_quota(store: &dyn Store, config: &AiConfig, user_id: Uuid, now: DateTime<Utc>) -> Result<AiQuota, ApiError> {
    Ok(store
        .get_ai_quota(user_id)
        .await?
        .unwrap_or_else(|| default_quota(config, user_id, now)))
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub daily_limit: i32,
    pub used_today: i32,
    pub remaining: i32,
    pub reset_hour: i32,
    pub next_reset_at: DateTime<Utc>,
}

impl QuotaStatus {
    pub fn of(quota: &AiQuota, now: DateTime<Utc>) -> Self {
        Self {
            daily_limit: quota.daily_limit,
            used_today: quota.used_today,
            remaining: (quota.daily_limit - quota.used_today).max(0),
            reset_hour: quota.reset_hour,
            next_reset_at: next_reset_at(quota.reset_hour, now),
        }
    }
}

/// Take one unit of quota or fail with 429
pub async fn check_and_consume(
    store: &dyn Store,
    config: &AiConfig,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<AiQuota, ApiError> {
    let mut quota = load_quota(store, config, user_id, now).await?;
    let rolled = roll_over(&mut quota, now);

    if quota.used_today >= quota.daily_limit {
        if rolled {
            store.save_ai_quota(&quota).await?;
        }
        let next = next_reset_at(quota.reset_hour, now);
        warn!(
            "User {} hit the AI generation quota ({}/{})",
            user_id, quota.used_today, quota.daily_limit
        );
        return Err(ApiError::too_many_requests(format!(
            "Daily AI generation quota of {} exceeded; resets at {}",
            quota.daily_limit,
            next.to_rfc3339()
        )));
    }

    quota.used_today += 1;
    Ok(store.save_ai_quota(&quota).await?)
}

pub async fn quota_status(store: &dyn Store, config: &AiConfig, user_id: Uuid, now: DateTime<Utc>) -> Result<QuotaStatus, ApiError> {
    let mut quota = load_quota(store, config, user_id, now).await?;
    roll_over(&mut quota, now);
    Ok(QuotaStatus::of(&quota, now))
}

pub async fn reset_quota(store: &dyn Store, config: &AiConfig, user_id: Uuid, now: DateTime<Utc>) -> Result<AiQuota, ApiError> {
    let mut quota = load_quota(store, config, user_id, now).await?;
    quota.used_today = 0;
    quota.last_reset_at = now;
    Ok(store.save_ai_quota(&quota).await?)
}

pub async fn set_daily_limit(
    store: &dyn Store,
    config: &AiConfig,
    user_id: Uuid,
    limit: i32,
    now: DateTime<Utc>,
) -> Result<AiQuota, ApiError> {
    if limit < 0 {
        return Err(ApiError::field("daily_limit", "daily_limit must not be negative"));
    }
    let mut quota = load_quota(store, config, user_id, now).await?;
    quota.daily_limit = limit;
    Ok(store.save_ai_quota(&quota).await?)
}

// Generation

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    pub count: Option<usize>,
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub model: String,
    pub questions_requested: usize,
    pub questions_generated: usize,
    pub dropped: usize,
    pub questions: Vec<QuizDraft>,
    /// Rows written when `save` was requested
    pub saved: Vec<QuizQuestion>,
    pub quota: QuotaStatus,
}

/// Everything a generation call needs besides its target
pub struct GenerationContext<'a> {
    pub store: &'a dyn Store,
    pub generator: &'a dyn QuizGenerator,
    pub config: &'a AiConfig,
    pub user_id: Uuid,
    pub now: DateTime<Utc>,
}

fn requested_count(config: &AiConfig, count: Option<usize>) -> Result<usize, ApiError> {
    let count = count.unwrap_or(DEFAULT_QUESTION_COUNT);
    if count == 0 || count > config.max_questions_per_request {
        return Err(ApiError::field(
            "count",
            format!("count must be between 1 and {}", config.max_questions_per_request),
        ));
    }
    Ok(count)
}

fn card_material(question: &str, answer: &str, explanation: Option<&str>) -> String {
    let mut text = format!("Q: {}\nA: {}", question, answer);
    if let Some(explanation) = explanation {
        text.push_str(&format!("\nNotes: {}", explanation));
    }
    text
}

pub async fn generate_for_flashcard(
    ctx: &GenerationContext<'_>,
    flashcard_id: Uuid,
    request: GenerateRequest,
) -> Result<GenerationResult, ApiError> {
    let count = requested_count(ctx.config, request.count)?;
    let card = ctx
        .store
        .get_flashcard(flashcard_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Flashcard {} not found", flashcard_id)))?;

    let prompt = GenerationPrompt {
        subject: card.question.clone(),
        material: card_material(&card.question, &card.answer, card.explanation.as_deref()),
        count,
    };
    run(ctx, QuizParent::Flashcard(card.id), prompt, request.save).await
}

pub async fn generate_for_deck(
    ctx: &GenerationContext<'_>,
    deck_id: Uuid,
    request: GenerateRequest,
) -> Result<GenerationResult, ApiError> {
    let count = requested_count(ctx.config, request.count)?;
    let deck = ctx
        .store
        .get_deck(deck_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Deck {} not found", deck_id)))?;
    let cards = ctx.store.list_flashcards(deck.id, true).await?;

    let mut material = deck.description.clone().unwrap_or_default();
    for card in cards.iter().take(DECK_PROMPT_CARDS) {
        if !material.is_empty() {
            material.push_str("\n\n");
        }
        material.push_str(&card_material(&card.question, &card.answer, card.explanation.as_deref()));
    }

    let prompt = GenerationPrompt {
        subject: deck.name.clone(),
        material,
        count,
    };
    run(ctx, QuizParent::Deck(deck.id), prompt, request.save).await
}

async fn run(
    ctx: &GenerationContext<'_>,
    parent: QuizParent,
    prompt: GenerationPrompt,
    save: bool,
) -> Result<GenerationResult, ApiError> {
    if !ctx.config.enabled {
        return Err(GeneratorError::Disabled.into());
    }
    let quota = check_and_consume(ctx.store, ctx.config, ctx.user_id, ctx.now).await?;

    let started = Instant::now();
    let outcome = generate_valid(ctx, parent, &prompt, save).await;
    let elapsed = started.elapsed().as_millis() as i64;

    let (flashcard_id, deck_id) = match parent {
        QuizParent::Flashcard(id) => (Some(id), None),
        QuizParent::Deck(id) => (None, Some(id)),
    };
    let log = AiGenerationLog {
        id: Uuid::new_v4(),
        user_id: ctx.user_id,
        flashcard_id,
        deck_id,
        model: ctx.generator.model().to_string(),
        questions_requested: prompt.count as i32,
        questions_generated: outcome.as_ref().map(|(valid, _, _)| valid.len() as i32).unwrap_or(0),
        success: outcome.is_ok(),
        error: outcome.as_ref().err().map(|e| e.message().to_string()),
        duration_ms: elapsed,
        created_at: ctx.now,
    };
    if let Err(e) = ctx.store.insert_ai_log(&log).await {
        tracing::error!("Failed to write AI generation log for user {}: {}", ctx.user_id, e);
    }

    let (questions, dropped, saved) = outcome?;
    info!(
        "User {} generated {} questions for {:?} ({} dropped, {} saved) in {}ms",
        ctx.user_id,
        questions.len(),
        parent,
        dropped,
        saved.len(),
        elapsed
    );
    Ok(GenerationResult {
        model: log.model,
        questions_requested: prompt.count,
        questions_generated: questions.len(),
        dropped,
        questions,
        saved,
        quota: QuotaStatus::of(&quota, ctx.now),
    })
}

/// Call the generator, keep the candidates that pass the content rules,
/// and optionally save them
async fn generate_valid(
    ctx: &GenerationContext<'_>,
    parent: QuizParent,
    prompt: &GenerationPrompt,
    save: bool,
) -> Result<(Vec<QuizDraft>, usize, Vec<QuizQuestion>), ApiError> {
    let candidates = ctx.generator.generate(prompt).await.map_err(|e| {
        tracing::error!("Quiz generation failed for user {}: {}", ctx.user_id, e);
        ApiError::from(e)
    })?;

    let total = candidates.len();
    let valid: Vec<QuizDraft> = candidates
        .iter()
        .filter_map(|draft| draft.cleaned().ok())
        .take(prompt.count)
        .collect();
    let dropped = total - valid.len();

    let saved = if save && !valid.is_empty() {
        content::import_quiz(ctx.store, parent, valid.clone()).await?
    } else {
        Vec::new()
    };
    Ok((valid, dropped, saved))
}
