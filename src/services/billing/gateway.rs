//! Payment gateway seam.
//!
//! `StripeGateway` talks to the Stripe REST API with form-encoded requests.
//! `DummyGateway` completes instantly and is what development and the test
//! suite run against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{PaymentError, Result};
use crate::config::{GatewayKind, StripeConfig};
use crate::types::PlanType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// One-time charge (lifetime plan)
    Payment,
    /// Recurring plan
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub email: String,
    pub plan: PlanType,
    pub mode: CheckoutMode,
    pub price_id: Option<String>,
    pub customer_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Form fields for `POST /v1/checkout/sessions`
    pub fn form_fields(&self) -> Result<Vec<(String, String)>> {
        let price_id = self
            .price_id
            .as_deref()
            .ok_or_else(|| PaymentError::NotConfigured(format!("price id for the {} plan", self.plan)))?;

        let mut fields = vec![
            ("mode".to_string(), self.mode.as_str().to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("client_reference_id".to_string(), self.user_id.to_string()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("metadata[user_id]".to_string(), self.user_id.to_string()),
            ("metadata[plan_type]".to_string(), self.plan.to_string()),
        ];

        match &self.customer_id {
            Some(customer) => fields.push(("customer".to_string(), customer.clone())),
            None => {
                fields.push(("customer_email".to_string(), self.email.clone()));
                if self.mode == CheckoutMode::Payment {
                    fields.push(("customer_creation".to_string(), "always".to_string()));
                }
            }
        }

        // Recurring plans carry the same metadata on the subscription object
        if self.mode == CheckoutMode::Subscription {
            fields.push(("subscription_data[metadata][user_id]".to_string(), self.user_id.to_string()));
            fields.push(("subscription_data[metadata][plan_type]".to_string(), self.plan.to_string()));
        }

        Ok(fields)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create a hosted checkout session and return where to send the user
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;
}

/// Build the gateway selected in config
pub fn gateway_for(config: &StripeConfig) -> Result<Arc<dyn PaymentGateway>> {
    match config.gateway {
        GatewayKind::Stripe => Ok(Arc::new(StripeGateway::new(config)?)),
        GatewayKind::Dummy => Ok(Arc::new(DummyGateway)),
    }
}

pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct StripeSessionBody {
    id: String,
    url: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        if config.secret_key.is_empty() {
            return Err(PaymentError::NotConfigured("STRIPE_SECRET_KEY".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::ProviderApi(e.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let fields = request.form_fields()?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Stripe request failed for user {}: {}", request.user_id, e);
                PaymentError::ProviderApi(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::ProviderApi(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<StripeErrorBody>(&text)
                .ok()
                .map(|b| {
                    format!(
                        "{}: {}",
                        b.error.kind.unwrap_or_else(|| "error".to_string()),
                        b.error.message.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|| format!("HTTP {}", status));
            tracing::error!("Stripe rejected checkout for user {}: {}", request.user_id, detail);
            return Err(PaymentError::ProviderApi(detail));
        }

        let session: StripeSessionBody =
            serde_json::from_str(&text).map_err(|e| PaymentError::ProviderApi(format!("unexpected response: {}", e)))?;
        let url = session.url.ok_or_else(|| {
            tracing::error!("Checkout session {} missing URL", session.id);
            PaymentError::ProviderApi("Checkout session missing URL".to_string())
        })?;
        Ok(CheckoutSession { id: session.id, url })
    }
}

/// Completes checkout without any external call
pub struct DummyGateway;

#[async_trait]
impl PaymentGateway for DummyGateway {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let id = format!("cs_dummy_{}", Uuid::new_v4().simple());
        let url = request.success_url.replace("{CHECKOUT_SESSION_ID}", &id);
        tracing::info!("Dummy gateway created checkout session {} for user {}", id, request.user_id);
        Ok(CheckoutSession { id, url })
    }
}
