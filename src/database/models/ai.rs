use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiQuota {
    pub user_id: Uuid,
    pub daily_limit: i32,
    pub used_today: i32,
    /// Hour of day (UTC) at which `used_today` rolls over
    pub reset_hour: i32,
    pub last_reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiGenerationLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flashcard_id: Option<Uuid>,
    pub deck_id: Option<Uuid>,
    pub model: String,
    pub questions_requested: i32,
    pub questions_generated: i32,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}
