pub mod billing;
pub mod import;
pub mod quota;

use anyhow::Context;

use crate::database::models::User;
use crate::database::Store;

/// Look up a user by email or fail with a readable message
pub async fn user_by_email(store: &dyn Store, email: &str) -> anyhow::Result<User> {
    let email = email.trim().to_ascii_lowercase();
    store
        .find_user_by_email(&email)
        .await?
        .with_context(|| format!("User {} not found", email))
}
