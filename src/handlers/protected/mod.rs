// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware injects `AuthUser` (the stored user row)

pub mod billing;
pub mod content;
pub mod feedback;
pub mod me;
pub mod progress;
pub mod sessions;

use chrono::Utc;

use crate::app::AppState;
use crate::database::models::User;
use crate::error::ApiError;
use crate::services::{billing as billing_service, content::Viewer};

/// Content viewer for the current request: admin flag plus paid access
pub(crate) async fn viewer(state: &AppState, user: &User) -> Result<Viewer, ApiError> {
    Ok(billing_service::viewer_for(state.store.as_ref(), user, Utc::now()).await?)
}
