//! Billing: plan access rules, Stripe Checkout and webhook-driven sync.
//!
//! A user's paid access is derived from their single subscription row. The
//! lifetime plan is a one-time payment and outranks any recurring plan.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::database::models::{Subscription, User};
use crate::database::{DatabaseError, Store};
use crate::services::content::Viewer;
use crate::types::{PaymentStatus, PlanType, SubscriptionStatus};

pub mod gateway;
pub mod signature;
pub mod webhook;

pub use gateway::{gateway_for, CheckoutMode, CheckoutRequest, CheckoutSession, DummyGateway, PaymentGateway, StripeGateway};
pub use webhook::{handle_webhook, WebhookOutcome};

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),

    #[error("Payment gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Lifetime access already purchased")]
    AlreadyPurchased,

    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Whether a subscription row grants paid content.
///
/// Admin access is decided by the caller; this only looks at billing state.
pub fn has_paid_access(subscription: Option<&Subscription>, now: DateTime<Utc>) -> bool {
    let Some(sub) = subscription else {
        return false;
    };
    match sub.plan_type {
        PlanType::Lifetime => sub.status == SubscriptionStatus::Active,
        PlanType::Monthly | PlanType::Yearly => {
            let status_ok = matches!(
                sub.status,
                SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
            );
            let period_ok = sub.current_period_end.map_or(true, |end| end > now);
            status_ok && period_ok
        }
        PlanType::Free => false,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingStatus {
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub has_access: bool,
}

pub async fn billing_status(store: &dyn Store, user: &User, now: DateTime<Utc>) -> Result<BillingStatus> {
    let subscription = store
        .get_subscription(user.id)
        .await?
        .unwrap_or_else(|| Subscription::free(user.id, now));
    let has_access = user.is_admin() || has_paid_access(Some(&subscription), now);
    Ok(BillingStatus {
        plan_type: subscription.plan_type,
        status: subscription.status,
        current_period_end: subscription.current_period_end,
        cancel_at_period_end: subscription.cancel_at_period_end,
        has_access,
    })
}

/// Resolve the content viewer for a request
pub async fn viewer_for(store: &dyn Store, user: &User, now: DateTime<Utc>) -> Result<Viewer> {
    let subscription = store.get_subscription(user.id).await?;
    Ok(Viewer {
        user_id: user.id,
        is_admin: user.is_admin(),
        has_paid_access: has_paid_access(subscription.as_ref(), now),
    })
}

pub async fn create_checkout(
    store: &dyn Store,
    gateway: &dyn PaymentGateway,
    config: &AppConfig,
    user: &User,
    plan: PlanType,
) -> Result<CheckoutSession> {
    let mode = match plan {
        PlanType::Free => return Err(PaymentError::InvalidData("The free plan does not need checkout".to_string())),
        PlanType::Lifetime => CheckoutMode::Payment,
        PlanType::Monthly | PlanType::Yearly => CheckoutMode::Subscription,
    };

    let existing = store.get_subscription(user.id).await?;
    if existing.as_ref().is_some_and(Subscription::is_lifetime) {
        return Err(PaymentError::AlreadyPurchased);
    }

    let request = CheckoutRequest {
        user_id: user.id,
        email: user.email.clone(),
        plan,
        mode,
        price_id: config.price_for(plan).map(str::to_string),
        customer_id: existing.and_then(|s| s.stripe_customer_id),
        success_url: config.stripe.success_url.clone(),
        cancel_url: config.stripe.cancel_url.clone(),
    };

    let session = gateway.create_checkout_session(&request).await?;
    info!(
        "Created {} checkout session {} for user {} via {}",
        plan,
        session.id,
        user.id,
        gateway.name()
    );
    Ok(session)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileChange {
    pub user_id: uuid::Uuid,
    pub email: Option<String>,
    pub previous_plan: PlanType,
    pub previous_status: SubscriptionStatus,
}

/// Upgrade every user holding a succeeded lifetime payment whose
/// subscription row does not say Lifetime/Active.
pub async fn reconcile_lifetime(store: &dyn Store, dry_run: bool, now: DateTime<Utc>) -> Result<Vec<ReconcileChange>> {
    let mut seen = std::collections::HashSet::new();
    let mut changes = Vec::new();

    for payment in store.list_payments(None).await? {
        if payment.plan_type != PlanType::Lifetime
            || payment.status != PaymentStatus::Succeeded
            || !seen.insert(payment.user_id)
        {
            continue;
        }

        let current = store
            .get_subscription(payment.user_id)
            .await?
            .unwrap_or_else(|| Subscription::free(payment.user_id, now));
        if current.is_lifetime() {
            continue;
        }

        let (previous_plan, previous_status) = (current.plan_type, current.status);
        let email = store.get_user(payment.user_id).await?.map(|u| u.email);
        changes.push(ReconcileChange {
            user_id: payment.user_id,
            email,
            previous_plan,
            previous_status,
        });

        if dry_run {
            info!("Would upgrade user {} to lifetime (dry run)", payment.user_id);
            continue;
        }

        let upgraded = Subscription {
            plan_type: PlanType::Lifetime,
            status: SubscriptionStatus::Active,
            current_period_end: None,
            cancel_at_period_end: false,
            ..current
        };
        store.save_subscription(&upgraded).await?;
        warn!(
            "Reconciled user {} to lifetime (was {}/{})",
            payment.user_id, previous_plan, previous_status
        );
    }

    Ok(changes)
}

/// Manual lifetime grant by email
pub async fn grant_lifetime(store: &dyn Store, email: &str, now: DateTime<Utc>) -> Result<Subscription> {
    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("User {} not found", email)))?;

    let current = store
        .get_subscription(user.id)
        .await?
        .unwrap_or_else(|| Subscription::free(user.id, now));
    let granted = Subscription {
        plan_type: PlanType::Lifetime,
        status: SubscriptionStatus::Active,
        current_period_end: None,
        cancel_at_period_end: false,
        ..current
    };
    let saved = store.save_subscription(&granted).await?;
    info!("Granted lifetime access to user {} ({})", user.id, user.email);
    Ok(saved)
}
