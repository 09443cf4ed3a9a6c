use anyhow::Context;
use serde_json::json;
use std::path::Path;

use crate::cli::{utils, CommandContext};
use crate::services::content::{self, ClassBundle};

/// `prep import <file.json>`
pub async fn handle(file: &Path, ctx: &CommandContext) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let bundle: ClassBundle =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a valid class bundle", file.display()))?;

    let name = bundle.name.clone();
    let summary = content::import_bundle(ctx.store.as_ref(), bundle).await?;

    utils::output_success(
        ctx.output,
        &format!(
            "Imported class '{}': {} decks, {} flashcards, {} quiz questions",
            name, summary.decks, summary.flashcards, summary.quiz_questions
        ),
        Some(json!({ "summary": summary })),
    )
}
