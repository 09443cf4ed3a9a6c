//! API error type and its JSON rendering.
//!
//! Every handler returns `ApiError` on failure. The body is always
//! `{ "error": true, "message", "code" }`, plus `field_errors` for
//! validation failures.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::DatabaseError;
use crate::services::ai::generator::GeneratorError;
use crate::services::billing::PaymentError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// 400 with per-field problems
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(String),
    InternalServerError(String),
    /// Upstream failure (Stripe, LLM provider)
    BadGateway(String),
    ServiceUnavailable(String),
}

impl ApiError {
    /// Status and machine-readable code for each variant
    fn kind(&self) -> (u16, &'static str) {
        use ApiError::*;
        match self {
            BadRequest(_) => (400, "BAD_REQUEST"),
            ValidationError { .. } => (400, "VALIDATION_ERROR"),
            Unauthorized(_) => (401, "UNAUTHORIZED"),
            Forbidden(_) => (403, "FORBIDDEN"),
            NotFound(_) => (404, "NOT_FOUND"),
            Conflict(_) => (409, "CONFLICT"),
            TooManyRequests(_) => (429, "TOO_MANY_REQUESTS"),
            InternalServerError(_) => (500, "INTERNAL_SERVER_ERROR"),
            BadGateway(_) => (502, "BAD_GATEWAY"),
            ServiceUnavailable(_) => (503, "SERVICE_UNAVAILABLE"),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().0
    }

    pub fn error_code(&self) -> &'static str {
        self.kind().1
    }

    /// Client-safe message
    pub fn message(&self) -> &str {
        use ApiError::*;
        match self {
            ValidationError { message, .. } => message,
            BadRequest(msg) | Unauthorized(msg) | Forbidden(msg) | NotFound(msg) | Conflict(msg)
            | TooManyRequests(msg) | InternalServerError(msg) | BadGateway(msg) | ServiceUnavailable(msg) => msg,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code(),
        });
        if let ApiError::ValidationError {
            field_errors: Some(fields),
            ..
        } = self
        {
            body["field_errors"] = json!(fields);
        }
        body
    }

    /// Choose a status from the wording of an error message.
    ///
    /// Used for errors coming from collaborators that only hand us text
    /// (LLM responses, `anyhow` chains). Matching is on lowercase substrings
    /// and the first rule that hits wins.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["unauthorized", "not authenticated", "invalid token"]) {
            ApiError::Unauthorized(message)
        } else if has(&["forbidden", "admin access required", "premium", "access denied"]) {
            ApiError::Forbidden(message)
        } else if has(&["not found"]) {
            ApiError::NotFound(message)
        } else if has(&["rate limit", "quota", "too many"]) {
            ApiError::TooManyRequests(message)
        } else if has(&["invalid", "required", "must", "validation"]) {
            ApiError::BadRequest(message)
        } else {
            tracing::error!("Unclassified error: {}", message);
            ApiError::InternalServerError("An error occurred while processing your request".to_string())
        }
    }
}

macro_rules! message_constructors {
    ($($name:ident => $variant:ident),* $(,)?) => {
        impl ApiError {
            $(
                pub fn $name(message: impl Into<String>) -> Self {
                    ApiError::$variant(message.into())
                }
            )*
        }
    };
}

message_constructors! {
    bad_request => BadRequest,
    unauthorized => Unauthorized,
    forbidden => Forbidden,
    not_found => NotFound,
    conflict => Conflict,
    too_many_requests => TooManyRequests,
    internal_server_error => InternalServerError,
    bad_gateway => BadGateway,
    service_unavailable => ServiceUnavailable,
}

impl ApiError {
    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Single-field validation failure
    pub fn field(field: &str, problem: impl Into<String>) -> Self {
        let field_errors = HashMap::from([(field.to_string(), problem.into())]);
        ApiError::validation_error("Invalid field value", Some(field_errors))
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::ConfigMissing(what) => {
                tracing::error!("Database configuration missing: {}", what);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidSignature(msg) => ApiError::bad_request(format!("Invalid webhook signature: {}", msg)),
            PaymentError::InvalidData(msg) => ApiError::bad_request(msg),
            PaymentError::NotConfigured(what) => {
                tracing::error!("Payment gateway not configured: {}", what);
                ApiError::service_unavailable("Payments are not available right now")
            }
            PaymentError::AlreadyPurchased => ApiError::conflict("Lifetime access already purchased"),
            PaymentError::ProviderApi(msg) => {
                tracing::error!("Payment provider error: {}", msg);
                ApiError::bad_gateway("Payment provider request failed")
            }
            PaymentError::Database(db) => db.into(),
        }
    }
}

impl From<GeneratorError> for ApiError {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::Disabled => ApiError::service_unavailable("AI quiz generation is disabled"),
            GeneratorError::Http(e) => {
                tracing::error!("Quiz generator request failed: {}", e);
                ApiError::bad_gateway("Quiz generation provider request failed")
            }
            GeneratorError::Provider(msg) => match ApiError::from_message(msg.clone()) {
                // Provider-side rate limits and auth problems keep their meaning,
                // anything unclassified is reported as an upstream failure.
                ApiError::InternalServerError(_) => ApiError::bad_gateway(msg),
                classified => classified,
            },
            GeneratorError::Malformed(msg) => ApiError::bad_gateway(format!("Quiz generation returned malformed output: {}", msg)),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::from_message(format!("{:#}", err))
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
