// handlers/protected/billing.rs - billing status and checkout
//
// GET  /api/billing/status
// POST /api/billing/checkout

use axum::{extract::State, Extension};
use chrono::Utc;
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::billing::{self, BillingStatus, CheckoutSession};
use crate::types::PlanType;

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    #[serde(default = "default_plan")]
    pub plan: PlanType,
}

fn default_plan() -> PlanType {
    PlanType::Lifetime
}

pub async fn status_get(State(state): State<AppState>, Extension(AuthUser(user)): Extension<AuthUser>) -> ApiResult<BillingStatus> {
    Ok(ApiResponse::success(billing::billing_status(state.store.as_ref(), &user, Utc::now()).await?))
}

/**
 * POST /api/billing/checkout - start a hosted checkout
 *
 * `{ "plan": "lifetime" | "monthly" | "yearly" }`, lifetime when omitted.
 * Returns the session id and the URL to redirect the browser to. A user who
 * already owns lifetime access gets 409.
 */
pub async fn checkout_post(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(body): ApiJson<CheckoutBody>,
) -> ApiResult<CheckoutSession> {
    let session = billing::create_checkout(
        state.store.as_ref(),
        state.gateway.as_ref(),
        &state.config,
        &user,
        body.plan,
    )
    .await?;
    Ok(ApiResponse::created(session))
}
