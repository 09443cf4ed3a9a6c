//! Stripe webhook processing.
//!
//! Events are verified, recorded in the processed-events ledger, then
//! dispatched on their type. A failed dispatch removes the ledger entry so
//! Stripe's retry gets processed. Events for users we cannot resolve are
//! acknowledged so Stripe stops retrying them.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::signature;
use super::{PaymentError, Result};
use crate::config::AppConfig;
use crate::database::models::{NewPayment, Subscription};
use crate::database::Store;
use crate::types::{PaymentStatus, PlanType, SubscriptionStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Stripe sends either a bare id or the expanded object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

fn expandable_id(value: &Option<Expandable>) -> Option<String> {
    value.as_ref().map(|e| e.id().to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricedItem {
    pub price: Option<Expandable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub mode: Option<String>,
    pub payment_status: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer: Option<Expandable>,
    pub subscription: Option<Expandable>,
    pub payment_intent: Option<Expandable>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub line_items: Option<List<PricedItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: Option<Expandable>,
    pub status: String,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub items: Option<List<PricedItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub customer: Option<Expandable>,
    pub subscription: Option<Expandable>,
    pub payment_intent: Option<Expandable>,
    pub amount_paid: Option<i64>,
    pub amount_due: Option<i64>,
    pub currency: Option<String>,
    pub lines: Option<List<PricedItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeObject {
    pub id: String,
    pub payment_intent: Option<Expandable>,
    #[serde(default)]
    pub refunded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed { event_type: String },
    Duplicate { event_id: String },
    Ignored { event_type: String },
    UnknownUser { event_type: String },
}

/// Verify, deduplicate and apply one webhook delivery
pub async fn handle_webhook(
    store: &dyn Store,
    config: &AppConfig,
    signature_header: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<WebhookOutcome> {
    let header = signature_header
        .ok_or_else(|| PaymentError::InvalidSignature("missing Stripe-Signature header".to_string()))?;
    signature::verify(
        header,
        body,
        &config.stripe.webhook_secret,
        config.stripe.webhook_tolerance_secs,
        now.timestamp(),
    )?;

    let event: StripeEvent =
        serde_json::from_slice(body).map_err(|e| PaymentError::InvalidData(format!("malformed event: {}", e)))?;

    if !store.record_webhook_event(&event.id, &event.event_type).await? {
        info!("Webhook event {} ({}) already processed", event.id, event.event_type);
        return Ok(WebhookOutcome::Duplicate { event_id: event.id });
    }

    info!("Processing webhook event {} ({})", event.id, event.event_type);
    match dispatch(store, config, &event, now).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            error!("Webhook event {} ({}) failed: {}", event.id, event.event_type, err);
            if let Err(forget_err) = store.forget_webhook_event(&event.id).await {
                error!("Could not release webhook event {}: {}", event.id, forget_err);
            }
            Err(err)
        }
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &StripeEvent) -> Result<T> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| PaymentError::InvalidData(format!("{} payload: {}", event.event_type, e)))
}

async fn dispatch(store: &dyn Store, config: &AppConfig, event: &StripeEvent, now: DateTime<Utc>) -> Result<WebhookOutcome> {
    let event_type = event.event_type.clone();
    let applied = match event.event_type.as_str() {
        "checkout.session.completed" => checkout_completed(store, config, parse_object(event)?, now).await?,
        "customer.subscription.created" | "customer.subscription.updated" => {
            subscription_changed(store, config, parse_object(event)?, now).await?
        }
        "customer.subscription.deleted" => subscription_deleted(store, parse_object(event)?).await?,
        "invoice.payment_succeeded" | "invoice.paid" => {
            invoice_settled(store, config, parse_object(event)?, PaymentStatus::Succeeded).await?
        }
        "invoice.payment_failed" => invoice_settled(store, config, parse_object(event)?, PaymentStatus::Failed).await?,
        "charge.refunded" => charge_refunded(store, parse_object(event)?).await?,
        _ => {
            debug!("Ignoring webhook event type {}", event.event_type);
            return Ok(WebhookOutcome::Ignored { event_type });
        }
    };

    Ok(match applied {
        Applied::Done => WebhookOutcome::Processed { event_type },
        Applied::Skipped => WebhookOutcome::Ignored { event_type },
        Applied::UnknownUser => {
            warn!("Webhook event {} ({}) references an unknown user", event.id, event.event_type);
            WebhookOutcome::UnknownUser { event_type }
        }
    })
}

enum Applied {
    Done,
    Skipped,
    UnknownUser,
}

fn items_plan(config: &AppConfig, items: &Option<List<PricedItem>>) -> Option<PlanType> {
    items
        .as_ref()?
        .data
        .iter()
        .filter_map(|item| item.price.as_ref())
        .find_map(|price| config.plan_for_price(price.id()))
}

fn metadata_plan(metadata: &HashMap<String, String>) -> Option<PlanType> {
    metadata
        .get("plan_type")
        .and_then(|p| p.parse::<PlanType>().ok())
        .filter(|p| *p != PlanType::Free)
}

/// Plan bought in a checkout session: metadata, then price id, then mode
pub fn resolve_checkout_plan(config: &AppConfig, session: &CheckoutSessionObject) -> PlanType {
    metadata_plan(&session.metadata)
        .or_else(|| items_plan(config, &session.line_items))
        .unwrap_or(match session.mode.as_deref() {
            Some("payment") => PlanType::Lifetime,
            _ => PlanType::Monthly,
        })
}

/// Maps Stripe's subscription status strings onto ours
pub fn map_subscription_status(status: &str) -> SubscriptionStatus {
    match status {
        "incomplete_expired" => SubscriptionStatus::Canceled,
        "paused" => SubscriptionStatus::Unpaid,
        other => other.parse().unwrap_or(SubscriptionStatus::Incomplete),
    }
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

async fn user_from_reference(store: &dyn Store, reference: Option<&String>) -> Result<Option<Uuid>> {
    let Some(id) = reference.and_then(|r| Uuid::parse_str(r).ok()) else {
        return Ok(None);
    };
    Ok(store.get_user(id).await?.map(|u| u.id))
}

async fn checkout_completed(
    store: &dyn Store,
    config: &AppConfig,
    session: CheckoutSessionObject,
    now: DateTime<Utc>,
) -> Result<Applied> {
    let reference = session
        .client_reference_id
        .as_ref()
        .or_else(|| session.metadata.get("user_id"));
    let Some(user_id) = user_from_reference(store, reference).await? else {
        return Ok(Applied::UnknownUser);
    };

    let plan = resolve_checkout_plan(config, &session);
    let mut subscription = store
        .get_subscription(user_id)
        .await?
        .unwrap_or_else(|| Subscription::free(user_id, now));
    if let Some(customer) = expandable_id(&session.customer) {
        subscription.stripe_customer_id = Some(customer);
    }

    match session.mode.as_deref() {
        Some("payment") => {
            if session.payment_status.as_deref() != Some("paid") {
                info!(
                    "Checkout session {} for user {} is not paid yet ({:?})",
                    session.id, user_id, session.payment_status
                );
                return Ok(Applied::Skipped);
            }

            subscription.plan_type = PlanType::Lifetime;
            subscription.status = SubscriptionStatus::Active;
            subscription.current_period_end = None;
            subscription.cancel_at_period_end = false;
            store.save_subscription(&subscription).await?;

            let inserted = store
                .insert_payment(NewPayment {
                    user_id,
                    stripe_session_id: Some(session.id.clone()),
                    stripe_payment_intent_id: expandable_id(&session.payment_intent),
                    stripe_invoice_id: None,
                    amount_cents: session.amount_total.unwrap_or(0),
                    currency: session.currency.clone().unwrap_or_else(|| "usd".to_string()),
                    status: PaymentStatus::Succeeded,
                    plan_type: PlanType::Lifetime,
                })
                .await?;
            if inserted.is_none() {
                debug!("Payment for checkout session {} already recorded", session.id);
            }
            info!("User {} upgraded to lifetime via checkout {}", user_id, session.id);
        }
        Some("subscription") => {
            if subscription.plan_type == PlanType::Lifetime {
                info!(
                    "User {} already has lifetime access; keeping plan for checkout {}",
                    user_id, session.id
                );
                store.save_subscription(&subscription).await?;
                return Ok(Applied::Done);
            }
            subscription.plan_type = plan;
            subscription.status = SubscriptionStatus::Active;
            subscription.stripe_subscription_id = expandable_id(&session.subscription);
            store.save_subscription(&subscription).await?;
            info!("User {} subscribed to {} via checkout {}", user_id, plan, session.id);
        }
        other => {
            return Err(PaymentError::InvalidData(format!(
                "checkout session {} has unsupported mode {:?}",
                session.id, other
            )))
        }
    }

    Ok(Applied::Done)
}

/// The subscription row an event refers to: by subscription id, then customer id
async fn find_subscription(
    store: &dyn Store,
    subscription_id: Option<&str>,
    customer_id: Option<&str>,
) -> Result<Option<Subscription>> {
    if let Some(id) = subscription_id {
        if let Some(found) = store.find_subscription_by_stripe_id(id).await? {
            return Ok(Some(found));
        }
    }
    if let Some(customer) = customer_id {
        return Ok(store.find_subscription_by_customer(customer).await?);
    }
    Ok(None)
}

async fn subscription_changed(
    store: &dyn Store,
    config: &AppConfig,
    object: SubscriptionObject,
    now: DateTime<Utc>,
) -> Result<Applied> {
    let customer = expandable_id(&object.customer);
    let mut subscription = match find_subscription(store, Some(&object.id), customer.as_deref()).await? {
        Some(found) => found,
        None => match user_from_reference(store, object.metadata.get("user_id")).await? {
            Some(user_id) => store
                .get_subscription(user_id)
                .await?
                .unwrap_or_else(|| Subscription::free(user_id, now)),
            None => return Ok(Applied::UnknownUser),
        },
    };

    if subscription.plan_type == PlanType::Lifetime {
        info!(
            "Ignoring subscription {} update for lifetime user {}",
            object.id, subscription.user_id
        );
        return Ok(Applied::Skipped);
    }

    let plan = items_plan(config, &object.items)
        .or_else(|| metadata_plan(&object.metadata))
        .or(Some(subscription.plan_type).filter(PlanType::is_recurring))
        .unwrap_or(PlanType::Monthly);

    subscription.plan_type = plan;
    subscription.status = map_subscription_status(&object.status);
    subscription.current_period_end = timestamp(object.current_period_end);
    subscription.cancel_at_period_end = object.cancel_at_period_end;
    subscription.stripe_subscription_id = Some(object.id.clone());
    if customer.is_some() {
        subscription.stripe_customer_id = customer;
    }
    store.save_subscription(&subscription).await?;
    info!(
        "Subscription {} for user {} is now {}/{}",
        object.id, subscription.user_id, subscription.plan_type, subscription.status
    );
    Ok(Applied::Done)
}

async fn subscription_deleted(store: &dyn Store, object: SubscriptionObject) -> Result<Applied> {
    let customer = expandable_id(&object.customer);
    let Some(mut subscription) = find_subscription(store, Some(&object.id), customer.as_deref()).await? else {
        return Ok(Applied::UnknownUser);
    };

    if subscription.plan_type == PlanType::Lifetime {
        info!(
            "Subscription {} deleted for lifetime user {}; access unchanged",
            object.id, subscription.user_id
        );
        return Ok(Applied::Skipped);
    }

    subscription.plan_type = PlanType::Free;
    subscription.status = SubscriptionStatus::Canceled;
    subscription.cancel_at_period_end = false;
    store.save_subscription(&subscription).await?;
    info!("Subscription {} canceled for user {}", object.id, subscription.user_id);
    Ok(Applied::Done)
}

async fn invoice_settled(
    store: &dyn Store,
    config: &AppConfig,
    invoice: InvoiceObject,
    outcome: PaymentStatus,
) -> Result<Applied> {
    let subscription_id = expandable_id(&invoice.subscription);
    let customer = expandable_id(&invoice.customer);
    let Some(mut subscription) = find_subscription(store, subscription_id.as_deref(), customer.as_deref()).await? else {
        return Ok(Applied::UnknownUser);
    };

    let plan = items_plan(config, &invoice.lines)
        .or(Some(subscription.plan_type).filter(PlanType::is_recurring))
        .unwrap_or(PlanType::Monthly);
    let amount = match outcome {
        PaymentStatus::Succeeded => invoice.amount_paid,
        _ => invoice.amount_due,
    };

    let inserted = store
        .insert_payment(NewPayment {
            user_id: subscription.user_id,
            stripe_session_id: None,
            stripe_payment_intent_id: expandable_id(&invoice.payment_intent),
            stripe_invoice_id: Some(invoice.id.clone()),
            amount_cents: amount.unwrap_or(0),
            currency: invoice.currency.clone().unwrap_or_else(|| "usd".to_string()),
            status: outcome,
            plan_type: plan,
        })
        .await?;
    if inserted.is_none() {
        // A retried invoice that now succeeded replaces the earlier failure
        let settled = match outcome {
            PaymentStatus::Succeeded => store.settle_invoice_payment(&invoice.id, amount.unwrap_or(0)).await?,
            _ => None,
        };
        match settled {
            Some(_) => info!("Invoice {} settled after an earlier failed attempt", invoice.id),
            None => debug!("Payment for invoice {} already recorded", invoice.id),
        }
    }

    if subscription.plan_type != PlanType::Lifetime {
        let next = match outcome {
            PaymentStatus::Failed => Some(SubscriptionStatus::PastDue),
            PaymentStatus::Succeeded
                if matches!(
                    subscription.status,
                    SubscriptionStatus::PastDue | SubscriptionStatus::Incomplete | SubscriptionStatus::Unpaid
                ) =>
            {
                Some(SubscriptionStatus::Active)
            }
            _ => None,
        };
        if let Some(status) = next {
            subscription.status = status;
            store.save_subscription(&subscription).await?;
        }
    }

    info!("Invoice {} for user {} recorded as {}", invoice.id, subscription.user_id, outcome);
    Ok(Applied::Done)
}

async fn charge_refunded(store: &dyn Store, charge: ChargeObject) -> Result<Applied> {
    if !charge.refunded {
        info!("Charge {} partially refunded; access unchanged", charge.id);
        return Ok(Applied::Skipped);
    }
    let Some(intent) = expandable_id(&charge.payment_intent) else {
        return Ok(Applied::Skipped);
    };
    let Some(payment) = store.find_payment_by_intent(&intent).await? else {
        warn!("Refunded charge {} has no recorded payment (intent {})", charge.id, intent);
        return Ok(Applied::UnknownUser);
    };

    store.set_payment_status(payment.id, PaymentStatus::Refunded).await?;

    if payment.plan_type == PlanType::Lifetime {
        if let Some(mut subscription) = store.get_subscription(payment.user_id).await? {
            if subscription.plan_type == PlanType::Lifetime {
                subscription.plan_type = PlanType::Free;
                subscription.status = SubscriptionStatus::Canceled;
                store.save_subscription(&subscription).await?;
                warn!("Lifetime access revoked for user {} after refund of {}", payment.user_id, charge.id);
            }
        }
    }

    Ok(Applied::Done)
}
