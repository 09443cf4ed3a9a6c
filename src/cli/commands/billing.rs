use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::cli::{utils, CommandContext};
use crate::services::billing;

#[derive(Subcommand)]
pub enum BillingCommands {
    #[command(about = "Upgrade users whose lifetime payment succeeded but whose plan is not lifetime")]
    Reconcile {
        #[arg(long, help = "Report the changes without writing them")]
        dry_run: bool,
    },

    #[command(about = "Grant lifetime access to a user by email")]
    GrantLifetime {
        #[arg(help = "Email of an existing user")]
        email: String,
    },
}

pub async fn handle(cmd: BillingCommands, ctx: &CommandContext) -> anyhow::Result<()> {
    match cmd {
        BillingCommands::Reconcile { dry_run } => {
            let changes = billing::reconcile_lifetime(ctx.store.as_ref(), dry_run, Utc::now()).await?;
            let verb = if dry_run { "Would upgrade" } else { "Upgraded" };
            utils::output_rows(ctx.output, "changes", &changes, "Nothing to reconcile", |c| {
                format!(
                    "{} {} ({}) from {}/{}",
                    verb,
                    c.user_id,
                    c.email.as_deref().unwrap_or("unknown email"),
                    c.previous_plan,
                    c.previous_status
                )
            })
        }
        BillingCommands::GrantLifetime { email } => {
            let email = email.trim().to_ascii_lowercase();
            let subscription = billing::grant_lifetime(ctx.store.as_ref(), &email, Utc::now()).await?;
            utils::output_success(
                ctx.output,
                &format!("Granted lifetime access to {}", email),
                Some(json!({ "subscription": subscription })),
            )
        }
    }
}
