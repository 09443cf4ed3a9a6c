use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::validate_jwt;
use crate::database::models::User;
use crate::error::ApiError;

/// Authenticated user, loaded from the store on every request
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

/// JWT authentication middleware: validates the bearer token and injects `AuthUser`
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;

    let claims = validate_jwt(&token, &state.config.security).map_err(|e| ApiError::unauthorized(e.to_string()))?;

    // Tokens outlive deleted accounts, so the user must still exist
    let user = state
        .store
        .get_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid token: user no longer exists"))?;

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

/// Admin gate; runs after `jwt_auth_middleware` and checks the stored role
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = request
        .extensions()
        .get::<AuthUser>()
        .map(|AuthUser(user)| user.is_admin())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    if !is_admin {
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}
