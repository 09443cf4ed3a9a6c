// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Route Prefix: none (/, /health, /auth/*, /webhooks/*)

pub mod auth;
pub mod webhooks;

mod health;
mod root;

pub use health::health;
pub use root::root;
