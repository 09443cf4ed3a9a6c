// handlers/public/webhooks/stripe.rs - POST /webhooks/stripe handler

use axum::{body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::billing::{self, signature::SIGNATURE_HEADER, WebhookOutcome};

/**
 * POST /webhooks/stripe - Stripe event receiver
 *
 * The body is taken as raw bytes because the signature covers the exact
 * payload. Duplicate, ignored and unknown-user events are acknowledged with
 * 200 so Stripe stops retrying; a processing failure returns an error status
 * and Stripe redelivers.
 */
pub async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<WebhookOutcome> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let outcome = billing::handle_webhook(state.store.as_ref(), &state.config, signature, &body, Utc::now()).await?;
    Ok(ApiResponse::success(outcome))
}
