use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use super::user_by_email;
use crate::cli::{utils, CommandContext};
use crate::services::ai;

#[derive(Subcommand)]
pub enum QuotaCommands {
    #[command(about = "Zero today's AI generation count for a user")]
    Reset {
        email: String,
    },

    #[command(about = "Change a user's daily AI generation limit")]
    SetLimit {
        email: String,
        #[arg(help = "New daily limit (0 disables generation for the user)")]
        limit: i32,
    },
}

pub async fn handle(cmd: QuotaCommands, ctx: &CommandContext) -> anyhow::Result<()> {
    let now = Utc::now();
    match cmd {
        QuotaCommands::Reset { email } => {
            let user = user_by_email(ctx.store.as_ref(), &email).await?;
            let quota = ai::reset_quota(ctx.store.as_ref(), &ctx.config.ai, user.id, now).await?;
            utils::output_success(
                ctx.output,
                &format!("Reset AI quota for {} ({} per day)", user.email, quota.daily_limit),
                Some(json!({ "quota": quota })),
            )
        }
        QuotaCommands::SetLimit { email, limit } => {
            let user = user_by_email(ctx.store.as_ref(), &email).await?;
            let quota = ai::set_daily_limit(ctx.store.as_ref(), &ctx.config.ai, user.id, limit, now).await?;
            utils::output_success(
                ctx.output,
                &format!("Set daily AI limit for {} to {}", user.email, quota.daily_limit),
                Some(json!({ "quota": quota })),
            )
        }
    }
}
