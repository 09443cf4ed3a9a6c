#![allow(dead_code)]

use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use cissp_prep_api::config::AppConfig;
use cissp_prep_api::database::{MemoryStore, Store};
use cissp_prep_api::services::ai::{QuizGenerator, StubGenerator};
use cissp_prep_api::services::billing::{signature, DummyGateway};
use cissp_prep_api::{app, AppState};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const LIFETIME_PRICE: &str = "price_lifetime";
pub const MONTHLY_PRICE: &str = "price_monthly";

/// In-process application backed by the memory store, dummy gateway and
/// stub generator
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.admin_emails = vec![ADMIN_EMAIL.to_string()];
    config.security.login_exchange_secret = None;
    config.stripe.webhook_secret = "whsec_test".to_string();
    config.stripe.lifetime_price_id = Some(LIFETIME_PRICE.to_string());
    config.stripe.monthly_price_id = Some(MONTHLY_PRICE.to_string());
    config.ai.enabled = true;
    config.ai.default_daily_limit = 3;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(test_config(), StubGenerator::default())
    }

    pub fn with_config(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = test_config();
        configure(&mut config);
        Self::build(config, StubGenerator::default())
    }

    pub fn with_generator(generator: StubGenerator) -> Self {
        Self::build(test_config(), generator)
    }

    fn build(config: AppConfig, generator: StubGenerator) -> Self {
        let generator: Arc<dyn QuizGenerator> = Arc::new(generator);
        let state = AppState {
            config: Arc::new(config),
            store: Arc::new(MemoryStore::new()),
            gateway: Arc::new(DummyGateway),
            generator,
        };
        let router = app(state.clone());
        Self { state, router }
    }

    pub fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    /// Send a request and return the status with the decoded JSON body
    /// (`Value::Null` for empty bodies)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Log in through the exchange endpoint and return the bearer token
    pub async fn login(&self, email: &str) -> Result<String> {
        let (status, body) = self
            .request(Method::POST, "/auth/login", None, Some(json!({ "email": email })))
            .await?;
        if status != StatusCode::OK {
            return Err(anyhow!("login for {} failed with {}: {}", email, status, body));
        }
        body["data"]["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response has no token: {}", body))
    }

    pub async fn admin(&self) -> Result<String> {
        self.login(ADMIN_EMAIL).await
    }

    pub async fn user_id(&self, email: &str) -> Result<Uuid> {
        self.store()
            .find_user_by_email(email)
            .await?
            .map(|u| u.id)
            .ok_or_else(|| anyhow!("no user {}", email))
    }

    /// Deliver a webhook event signed with the configured secret
    pub async fn webhook(&self, event: &Value) -> Result<(StatusCode, Value)> {
        let payload = serde_json::to_vec(event)?;
        let header = signature::sign_payload(&self.state.config.stripe.webhook_secret, Utc::now().timestamp(), &payload)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/stripe")
            .header(signature::SIGNATURE_HEADER, header)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))?;
        self.send(request).await
    }

    /// Create a published class with one deck of `cards` flashcards
    pub async fn seed_deck(&self, admin: &str, premium: bool, cards: usize) -> Result<SeededDeck> {
        let (_, class) = self
            .post(
                "/api/admin/classes",
                admin,
                json!({ "name": "Security and Risk Management", "is_published": true }),
            )
            .await?;
        let class_id = id_of(&class)?;

        let (_, deck) = self
            .post(
                "/api/admin/decks",
                admin,
                json!({
                    "class_id": class_id,
                    "name": if premium { "Premium deck" } else { "Free deck" },
                    "is_premium": premium,
                    "is_published": true
                }),
            )
            .await?;
        let deck_id = id_of(&deck)?;

        let mut card_ids = Vec::with_capacity(cards);
        for i in 0..cards {
            let (_, card) = self
                .post(
                    "/api/admin/flashcards",
                    admin,
                    json!({
                        "deck_id": deck_id,
                        "question": format!("Question {}", i + 1),
                        "answer": format!("Answer {}", i + 1),
                        "sort_order": i
                    }),
                )
                .await?;
            card_ids.push(id_of(&card)?);
        }

        Ok(SeededDeck {
            class_id,
            deck_id,
            card_ids,
        })
    }
}

pub struct SeededDeck {
    pub class_id: Uuid,
    pub deck_id: Uuid,
    pub card_ids: Vec<Uuid>,
}

/// `data.id` of an envelope
pub fn id_of(body: &Value) -> Result<Uuid> {
    let id = body["data"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("response has no data.id: {}", body))?;
    Ok(Uuid::parse_str(id)?)
}

pub fn checkout_completed(event_id: &str, user_id: Uuid, session_id: &str) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "mode": "payment",
            "payment_status": "paid",
            "client_reference_id": user_id.to_string(),
            "customer": "cus_test",
            "payment_intent": "pi_test",
            "amount_total": 19900,
            "currency": "usd",
            "metadata": { "plan_type": "lifetime" }
        }}
    })
}
