use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin};
use crate::services::ai::{generator_for, QuizGenerator};
use crate::services::billing::{gateway_for, PaymentGateway};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub generator: Arc<dyn QuizGenerator>,
}

impl AppState {
    /// Wire the store, payment gateway and generator selected by config.
    ///
    /// Without DATABASE_URL the service runs on the in-memory store, which
    /// forgets everything on restart.
    pub async fn from_config(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match config.database.url {
            Some(_) => Arc::new(PgStore::new(DatabaseManager::connect(&config.database).await?)),
            None => {
                tracing::warn!("DATABASE_URL not set; using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        let gateway = gateway_for(&config.stripe)?;
        let generator = generator_for(&config.ai)?;

        tracing::info!(
            "Payments via {} gateway, quiz generation via {}",
            gateway.name(),
            generator.model()
        );
        Ok(Self {
            config,
            store,
            gateway,
            generator,
        })
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let request_logging = state.config.server.enable_request_logging;

    // Admin routes sit inside /api so they pass the JWT check before the role check
    let api = protected_routes()
        .nest("/admin", elevated_routes().route_layer(from_fn(require_admin)))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let router = Router::new()
        // Public
        .merge(public_routes())
        // Protected API
        .nest("/api", api)
        .with_state(state)
        // Global middleware
        .layer(cors);

    if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/login", post(public::auth::login))
        .route("/webhooks/stripe", post(public::webhooks::stripe_webhook))
}

fn protected_routes() -> Router<AppState> {
    use protected::{billing, content, feedback, me, progress, sessions};

    Router::new()
        .route("/me", get(me::me_get))
        // Content
        .route("/classes", get(content::classes_list))
        .route("/classes/:id", get(content::class_get))
        .route("/classes/:id/decks", get(content::class_decks))
        .route("/decks/:id", get(content::deck_get))
        .route("/decks/:id/flashcards", get(content::deck_flashcards))
        .route("/decks/:id/quiz", get(content::deck_quiz))
        .route("/flashcards/:id/quiz", get(content::flashcard_quiz))
        .route("/decks/:id/quiz/submit", post(sessions::deck_quiz_submit))
        .route("/flashcards/:id/quiz/submit", post(sessions::flashcard_quiz_submit))
        // Progress
        .route("/progress/cards/:id", post(progress::card_rate))
        .route(
            "/progress/decks/:id",
            get(progress::deck_progress_get).delete(progress::deck_progress_reset),
        )
        .route("/progress/classes/:id", get(progress::class_progress_get))
        .route("/study/decks/:id/queue", get(progress::study_queue_get))
        .route("/stats", get(progress::stats_get))
        // Sessions
        .route("/sessions", post(sessions::session_start).get(sessions::sessions_list))
        .route("/sessions/:id/end", put(sessions::session_end))
        // Billing
        .route("/billing/status", get(billing::status_get))
        .route("/billing/checkout", post(billing::checkout_post))
        // Feedback
        .route("/feedback", post(feedback::feedback_submit).get(feedback::feedback_mine))
}

fn elevated_routes() -> Router<AppState> {
    use elevated::admin;

    Router::new()
        // Content authoring
        .route("/classes", post(admin::content::class_create))
        .route(
            "/classes/:id",
            put(admin::content::class_update)
                .patch(admin::content::class_update)
                .delete(admin::content::class_delete),
        )
        .route("/decks", post(admin::content::deck_create))
        .route(
            "/decks/:id",
            put(admin::content::deck_update)
                .patch(admin::content::deck_update)
                .delete(admin::content::deck_delete),
        )
        .route("/flashcards", post(admin::content::flashcard_create))
        .route(
            "/flashcards/:id",
            put(admin::content::flashcard_update)
                .patch(admin::content::flashcard_update)
                .delete(admin::content::flashcard_delete),
        )
        .route("/quiz-questions", post(admin::quiz::question_create))
        .route(
            "/quiz-questions/:id",
            get(admin::quiz::question_get)
                .put(admin::quiz::question_update)
                .patch(admin::quiz::question_update)
                .delete(admin::quiz::question_delete),
        )
        .route("/decks/:id/quiz/import", post(admin::quiz::deck_quiz_import))
        .route("/flashcards/:id/quiz/import", post(admin::quiz::flashcard_quiz_import))
        // Feedback triage
        .route("/feedback", get(admin::feedback::feedback_list))
        .route("/feedback/:id", axum::routing::patch(admin::feedback::feedback_update))
        // AI generation
        .route("/ai/flashcards/:id/generate", post(admin::ai::flashcard_generate))
        .route("/ai/decks/:id/generate", post(admin::ai::deck_generate))
        .route("/ai/quota", get(admin::ai::quota_get))
}
