//! Shared Application State
//!
//! `AppState` holds the collaborator services built once at startup. Every
//! WebSocket connection gets its own `Controller` over these shared services.

use crate::config::{Config, Provider};
use anyhow::Context;
use async_openai::config::OpenAIConfig;
use jedi_core::chat::LLMChatService;
use jedi_core::curriculum::LLMCurriculumService;
use jedi_core::llm_client::{LLMClient, OpenAICompatibleClient};
use jedi_core::quiz::LLMQuizService;
use jedi_core::video::YouTubeSearch;
use jedi_core::{Controller, ControllerSettings, Services};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub settings: ControllerSettings,
}

impl AppState {
    /// Builds the services selected by `config.provider`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let services = match config.provider {
            Provider::Mock => {
                info!("Using mock services.");
                return Ok(Self::mock(config.controller_settings()));
            }
            provider => {
                let prompts = load_prompts(&config.prompts_path)?;
                let llm = llm_client(config, provider)?;
                let youtube_key = config
                    .youtube_api_key
                    .clone()
                    .context("YOUTUBE_API_KEY is required for live providers")?;
                Services {
                    curriculum: Arc::new(LLMCurriculumService::new(
                        llm.clone(),
                        prompt(&prompts, "curriculum")?,
                    )),
                    videos: Arc::new(YouTubeSearch::new(youtube_key)?),
                    quiz: Arc::new(LLMQuizService::new(llm.clone(), prompt(&prompts, "quiz")?)),
                    chat: Arc::new(LLMChatService::new(llm, prompt(&prompts, "chat")?)),
                }
            }
        };

        Ok(Self {
            services,
            settings: config.controller_settings(),
        })
    }

    /// Offline state over the mock services.
    pub fn mock(settings: ControllerSettings) -> Self {
        Self {
            services: Services::mock(),
            settings,
        }
    }

    /// A fresh session over the shared services.
    pub fn controller(&self) -> Controller {
        Controller::new(self.services.clone(), self.settings)
    }
}

fn llm_client(config: &Config, provider: Provider) -> anyhow::Result<Arc<dyn LLMClient>> {
    let openai_config = match provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            OpenAIConfig::new()
                .with_api_key(config.openai_api_key.clone().unwrap_or_default())
                .with_api_base("https://api.openai.com/v1")
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            OpenAIConfig::new()
                .with_api_key(config.gemini_api_key.clone().unwrap_or_default())
                .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai")
        }
        Provider::Ollama | Provider::Mock => {
            info!(base_url = %config.ollama_base_url, "Using Ollama provider.");
            // Ollama ignores the key but the client always sends one.
            OpenAIConfig::new()
                .with_api_key("ollama")
                .with_api_base(config.ollama_base_url.trim_end_matches('/'))
        }
    };
    let client = OpenAICompatibleClient::new(openai_config, config.chat_model.clone())
        .context("Failed to build LLM client")?;
    Ok(Arc::new(client))
}

/// Reads every `*.md` file in `prompts_path`, keyed by file stem.
pub fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = std::fs::read_dir(prompts_path)
        .with_context(|| format!("Cannot read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = std::fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

fn prompt(prompts: &HashMap<String, String>, key: &str) -> anyhow::Result<String> {
    prompts
        .get(key)
        .cloned()
        .with_context(|| format!("{key}.md not found in prompts directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn prompts_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("prompts")
    }

    #[test]
    fn bundled_prompts_carry_their_placeholders() {
        let prompts = load_prompts(&prompts_dir()).unwrap();
        assert!(prompt(&prompts, "curriculum").unwrap().contains("{topic}"));
        let quiz = prompt(&prompts, "quiz").unwrap();
        assert!(quiz.contains("{subtopic}") && quiz.contains("{num_questions}"));
        let chat = prompt(&prompts, "chat").unwrap();
        assert!(chat.contains("{topic}") && chat.contains("{question}"));
    }

    #[test]
    fn missing_prompt_is_reported_by_name() {
        let err = prompt(&HashMap::new(), "quiz").unwrap_err();
        assert!(err.to_string().contains("quiz.md"));
    }
}
