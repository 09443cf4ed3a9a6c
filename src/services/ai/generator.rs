//! Quiz generator seam.
//!
//! `OpenAiGenerator` posts to an OpenAI-compatible `/chat/completions`
//! endpoint and expects the reply to be a JSON array of questions.
//! `StubGenerator` is deterministic and backs the test suite.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::AiConfig;
use crate::services::content::QuizDraft;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("AI quiz generation is disabled")]
    Disabled,

    #[error("request to quiz generator failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Provider(String),

    #[error("malformed generator output: {0}")]
    Malformed(String),
}

/// Source material for one generation call
#[derive(Debug, Clone)]
pub struct GenerationPrompt {
    /// Deck or flashcard title line
    pub subject: String,
    pub material: String,
    pub count: usize,
}

impl GenerationPrompt {
    pub fn system_message(&self) -> String {
        format!(
            "You write CISSP exam practice questions. Reply with only a JSON array of {} objects, \
             each with \"question\" (string), \"options\" (2 to 6 strings), \"correct_index\" \
             (zero-based integer) and \"explanation\" (string). No prose, no markdown.",
            self.count
        )
    }

    pub fn user_message(&self) -> String {
        format!("Topic: {}\n\n{}", self.subject, self.material)
    }
}

#[async_trait]
pub trait QuizGenerator: Send + Sync {
    /// Model name recorded in the generation log
    fn model(&self) -> &str;

    /// Candidate questions; callers validate each one
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<Vec<QuizDraft>, GeneratorError>;
}

pub fn generator_for(config: &AiConfig) -> Result<Arc<dyn QuizGenerator>, GeneratorError> {
    if !config.enabled {
        return Ok(Arc::new(DisabledGenerator));
    }
    Ok(Arc::new(OpenAiGenerator::new(config)?))
}

/// Pull the candidate array out of a model reply.
///
/// Models like to wrap JSON in code fences or a sentence, so everything
/// outside the outermost brackets is ignored. Entries that do not have the
/// question shape are dropped here; content rules are checked by the caller.
pub fn parse_candidates(text: &str) -> Result<Vec<QuizDraft>, GeneratorError> {
    let start = text.find('[');
    let end = text.rfind(']');
    let slice = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => return Err(GeneratorError::Malformed("reply does not contain a JSON array".to_string())),
    };

    let values: Vec<Value> =
        serde_json::from_str(slice).map_err(|e| GeneratorError::Malformed(e.to_string()))?;
    Ok(values
        .into_iter()
        .filter_map(|value| serde_json::from_value::<QuizDraft>(value).ok())
        .collect())
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionBody {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: &AiConfig) -> Result<Self, GeneratorError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GeneratorError::Provider("AI_API_KEY is required when AI generation is enabled".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl QuizGenerator for OpenAiGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &GenerationPrompt) -> Result<Vec<QuizDraft>, GeneratorError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system_message() },
                { "role": "user", "content": prompt.user_message() }
            ],
            "temperature": 0.4
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Keep the provider's own wording so rate limits and auth failures stay recognisable
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| text.chars().take(200).collect());
            let detail = match status.as_u16() {
                401 => format!("Unauthorized: {}", detail),
                429 => format!("Rate limit: {}", detail),
                _ => format!("HTTP {} - {}", status.as_u16(), detail),
            };
            tracing::error!("Quiz generator rejected request: {}", detail);
            return Err(GeneratorError::Provider(detail));
        }

        let body: CompletionBody =
            serde_json::from_str(&text).map_err(|e| GeneratorError::Malformed(format!("unexpected response: {}", e)))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GeneratorError::Malformed("reply has no message content".to_string()))?;

        parse_candidates(&content)
    }
}

/// Stands in when generation is switched off in config
pub struct DisabledGenerator;

#[async_trait]
impl QuizGenerator for DisabledGenerator {
    fn model(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &GenerationPrompt) -> Result<Vec<QuizDraft>, GeneratorError> {
        Err(GeneratorError::Disabled)
    }
}

/// Deterministic generator: `count` valid questions built from the subject,
/// followed by `invalid` candidates that fail validation.
#[derive(Debug, Clone, Default)]
pub struct StubGenerator {
    pub invalid: usize,
    pub fail_with: Option<String>,
}

#[async_trait]
impl QuizGenerator for StubGenerator {
    fn model(&self) -> &str {
        "stub"
    }

    async fn generate(&self, prompt: &GenerationPrompt) -> Result<Vec<QuizDraft>, GeneratorError> {
        if let Some(message) = &self.fail_with {
            return Err(GeneratorError::Provider(message.clone()));
        }

        let mut drafts: Vec<QuizDraft> = (0..prompt.count)
            .map(|i| QuizDraft {
                question: format!("{} question {}", prompt.subject, i + 1),
                options: vec!["Option A".into(), "Option B".into(), "Option C".into(), "Option D".into()],
                correct_index: (i % 4) as i32,
                explanation: Some(format!("Generated from {}", prompt.subject)),
                sort_order: i as i32,
            })
            .collect();

        drafts.extend((0..self.invalid).map(|_| QuizDraft {
            question: "Missing options".into(),
            options: vec!["Only one".into()],
            correct_index: 3,
            explanation: None,
            sort_order: 0,
        }));
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_array() {
        let reply = "Here you go:\n```json\n[{\"question\":\"What is CIA?\",\"options\":[\"a\",\"b\"],\"correct_index\":0,\"explanation\":\"triad\"}]\n```";
        let drafts = parse_candidates(reply).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].question, "What is CIA?");
        assert_eq!(drafts[0].explanation.as_deref(), Some("triad"));
    }

    #[test]
    fn drops_entries_with_wrong_shape() {
        let reply = r#"[{"question":"ok","options":["a","b"],"correct_index":1},{"prompt":"nope"}]"#;
        assert_eq!(parse_candidates(reply).unwrap().len(), 1);
    }

    #[test]
    fn reply_without_array_is_malformed() {
        assert!(matches!(parse_candidates("I cannot help with that"), Err(GeneratorError::Malformed(_))));
    }

    #[tokio::test]
    async fn stub_appends_invalid_candidates() {
        let stub = StubGenerator { invalid: 2, fail_with: None };
        let prompt = GenerationPrompt {
            subject: "Asset Security".into(),
            material: String::new(),
            count: 3,
        };
        let drafts = stub.generate(&prompt).await.unwrap();
        assert_eq!(drafts.len(), 5);
        assert!(drafts[..3].iter().all(|d| d.cleaned().is_ok()));
        assert!(drafts[3..].iter().all(|d| d.cleaned().is_err()));
    }

    #[test]
    fn disabled_config_builds_disabled_generator() {
        let config = crate::config::AppConfig::development().ai;
        let generator = generator_for(&config).unwrap();
        assert_eq!(generator.model(), "disabled");
    }
}
