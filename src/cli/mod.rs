pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::{self, AppConfig};
use crate::database::{DatabaseManager, PgStore, Store};

#[derive(Parser)]
#[command(name = "prep")]
#[command(about = "Admin CLI for the CISSP Prep API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply the bundled database migrations")]
    Migrate,

    #[command(about = "Import a class bundle (decks, flashcards, quizzes) from a JSON file")]
    Import {
        #[arg(help = "Path to the bundle JSON file")]
        file: std::path::PathBuf,
    },

    #[command(about = "Subscription maintenance")]
    Billing {
        #[command(subcommand)]
        cmd: commands::billing::BillingCommands,
    },

    #[command(about = "AI generation quota management")]
    Quota {
        #[command(subcommand)]
        cmd: commands::quota::QuotaCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Everything a command needs: the store and the loaded config
pub struct CommandContext {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub output: OutputFormat,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output = OutputFormat::from_cli(&cli);
    let config = Arc::new(config::config().clone());

    let mut database = config.database.clone();
    // The CLI migrates only when asked to
    database.run_migrations = false;
    let pool = DatabaseManager::connect(&database).await?;

    if let Commands::Migrate = cli.command {
        DatabaseManager::migrate(&pool).await?;
        return utils::output_success(output, "Migrations applied", None);
    }

    let ctx = CommandContext {
        store: Arc::new(PgStore::new(pool)),
        config,
        output,
    };
    dispatch(cli.command, &ctx).await
}

/// Runs a store-backed command
pub async fn dispatch(command: Commands, ctx: &CommandContext) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => Err(anyhow::anyhow!("migrate needs a database connection")),
        Commands::Import { file } => commands::import::handle(&file, ctx).await,
        Commands::Billing { cmd } => commands::billing::handle(cmd, ctx).await,
        Commands::Quota { cmd } => commands::quota::handle(cmd, ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use commands::{billing::BillingCommands, quota::QuotaCommands};

    fn context() -> CommandContext {
        CommandContext {
            store: Arc::new(MemoryStore::new()),
            config: Arc::new(AppConfig::development()),
            output: OutputFormat::Json,
        }
    }

    #[test]
    fn parses_nested_subcommands() {
        let cli = Cli::try_parse_from(["prep", "--json", "billing", "reconcile", "--dry-run"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Billing {
                cmd: BillingCommands::Reconcile { dry_run: true }
            }
        ));

        let cli = Cli::try_parse_from(["prep", "quota", "set-limit", "a@example.com", "7"]).unwrap();
        assert!(matches!(cli.command, Commands::Quota { cmd: QuotaCommands::SetLimit { limit: 7, .. } }));
    }

    #[tokio::test]
    async fn grant_lifetime_and_set_limit() {
        let ctx = context();
        let user = ctx.store.upsert_user("learner@example.com", None, false).await.unwrap();

        dispatch(
            Commands::Billing {
                cmd: BillingCommands::GrantLifetime {
                    email: "Learner@Example.com".into(),
                },
            },
            &ctx,
        )
        .await
        .unwrap();
        let subscription = ctx.store.get_subscription(user.id).await.unwrap().unwrap();
        assert!(subscription.is_lifetime());

        dispatch(
            Commands::Quota {
                cmd: QuotaCommands::SetLimit {
                    email: "learner@example.com".into(),
                    limit: 7,
                },
            },
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(ctx.store.get_ai_quota(user.id).await.unwrap().unwrap().daily_limit, 7);
    }

    #[tokio::test]
    async fn quota_reset_for_unknown_user_fails() {
        let ctx = context();
        let result = dispatch(
            Commands::Quota {
                cmd: QuotaCommands::Reset {
                    email: "ghost@example.com".into(),
                },
            },
            &ctx,
        )
        .await;
        assert!(result.is_err());
    }
}
