use crate::error::{FetchError, ParseError};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Upper bound for a single completion call. Local models can be slow.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// A generic client for single-shot text completions.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Sends one system + user message pair and returns the raw text answer.
    async fn complete(&self, system_prompt: &str, prompt: String) -> Result<String, FetchError>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gpt-4o", "llama3").
    pub fn new(config: OpenAIConfig, model: String) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(LLM_TIMEOUT).build()?;
        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            model,
        })
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, system_prompt: &str, prompt: String) -> Result<String, FetchError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or(ParseError::MissingField("choices"))?
            .message
            .content
            .ok_or(ParseError::MissingField("content"))?;

        if content.trim().is_empty() {
            return Err(ParseError::invalid("LLM returned an empty response").into());
        }
        debug!(model = %self.model, len = content.len(), "LLM completion received");
        Ok(content)
    }
}

/// Removes a surrounding Markdown code fence (```json ... ```) if present.
///
/// Models are told to return bare JSON but routinely wrap it anyway.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) glued to the opening fence,
    // whether the payload follows on the same line or the next.
    let body = rest
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '+')
        .trim_start();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Fills `{name}` placeholders in one pass over `template`.
///
/// Inserted values are never rescanned, so user text that happens to contain
/// a placeholder is passed through verbatim. Unknown `{...}` are kept as-is.
pub fn render_prompt(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find(|(name, _)| {
            tail.strip_prefix(name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
