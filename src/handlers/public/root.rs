// handlers/public/root.rs - GET / handler

use axum::response::Json;
use serde_json::{json, Value};

/// Service banner with the route map
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "CISSP Prep API",
            "version": version,
            "endpoints": {
                "health": "/health (public)",
                "auth": "/auth/login (public - login exchange)",
                "webhooks": "/webhooks/stripe (public - signed by Stripe)",
                "content": "/api/classes, /api/decks/:id, /api/flashcards/:id/quiz (protected)",
                "progress": "/api/progress/*, /api/study/decks/:id/queue, /api/stats (protected)",
                "sessions": "/api/sessions (protected)",
                "billing": "/api/billing/status, /api/billing/checkout (protected)",
                "feedback": "/api/feedback (protected)",
                "admin": "/api/admin/* (admin role)"
            }
        }
    }))
}
