// handlers/public/auth/login.rs - POST /auth/login handler

use axum::{extract::State, http::HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::{generate_jwt, Claims};
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::billing::signature::constant_time_eq;

pub const LOGIN_SECRET_HEADER: &str = "x-login-secret";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: User,
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::field("email", "email is invalid")),
    }
}

/**
 * POST /auth/login - Exchange a verified identity for an API token
 *
 * Called by the frontend after the upstream OAuth callback. Upserts the user
 * and returns a signed JWT. Disabled unless `allow_login_exchange` is set;
 * when a login secret is configured the caller must send it in `x-login-secret`.
 *
 * ```json
 * { "email": "student@example.com", "name": "Optional Name" }
 * ```
 */
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let security = &state.config.security;
    if !security.allow_login_exchange {
        return Err(ApiError::forbidden("Login exchange is disabled"));
    }

    if let Some(expected) = &security.login_exchange_secret {
        let supplied = headers.get(LOGIN_SECRET_HEADER).and_then(|v| v.to_str().ok());
        let accepted = supplied.is_some_and(|value| constant_time_eq(value.as_bytes(), expected.as_bytes()));
        if !accepted {
            warn!("Rejected login exchange with a missing or wrong secret");
            return Err(ApiError::unauthorized("Invalid login secret"));
        }
    }

    let email = normalize_email(&request.email)?;
    let name = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let user = state
        .store
        .upsert_user(&email, name, state.config.is_admin_email(&email))
        .await?;

    let claims = Claims::new(&user, security.jwt_expiry_hours, Utc::now());
    let token = generate_jwt(&claims, security).map_err(|e| {
        tracing::error!("Failed to issue token for user {}: {}", user.id, e);
        ApiError::internal_server_error("Failed to issue token")
    })?;

    info!("User {} logged in ({})", user.id, user.role);
    Ok(ApiResponse::success(LoginResponse {
        token,
        expires_in: security.jwt_expiry_hours * 3600,
        user,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased_and_checked() {
        assert_eq!(normalize_email("  Student@Example.COM ").unwrap(), "student@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a@localhost").is_err());
    }
}
