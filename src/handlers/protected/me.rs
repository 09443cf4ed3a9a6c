// handlers/protected/me.rs - GET /api/me handler

use axum::{extract::State, Extension};
use chrono::Utc;
use serde::Serialize;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::billing::{self, BillingStatus};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub billing: BillingStatus,
}

/// GET /api/me - the authenticated user and their billing status
pub async fn me_get(State(state): State<AppState>, Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<MeResponse> {
    let billing = billing::billing_status(state.store.as_ref(), &user, Utc::now()).await?;
    Ok(ApiResponse::success(MeResponse { user, billing }))
}
