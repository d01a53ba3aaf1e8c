use jedi_core::ControllerSettings;
use jedi_core::enrichment::EnrichmentSettings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Backends that can generate curricula, quizzes and answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
    Ollama,
    /// Deterministic offline services. Needs no keys.
    Mock,
}

impl Provider {
    fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o",
            Provider::Gemini => "gemini-2.0-flash",
            Provider::Ollama => "llama3",
            Provider::Mock => "mock",
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "gemini" => Ok(Provider::Gemini),
            "ollama" => Ok(Provider::Ollama),
            "mock" => Ok(Provider::Mock),
            other => Err(ConfigError::InvalidValue(
                "LLM_PROVIDER".to_string(),
                format!("'{other}' is not one of openai, gemini, ollama, mock"),
            )),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ollama_base_url: String,
    pub youtube_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub enrichment_delay: Duration,
    pub videos_per_subtopic: usize,
    pub quiz_questions: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:8000")?;

        let provider: Provider = std::env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "ollama".to_string())
            .parse()?;

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        let youtube_api_key = std::env::var("YOUTUBE_API_KEY").ok();
        let ollama_base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OLLAMA_BASE_URL.to_string());

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| provider.default_model().to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let enrichment_delay = Duration::from_millis(parse_var("ENRICHMENT_DELAY_MS", "300")?);
        let videos_per_subtopic = parse_count("VIDEOS_PER_SUBTOPIC", "3")?;
        let quiz_questions = parse_count("QUIZ_QUESTIONS", "3")?;

        match provider {
            Provider::OpenAI if openai_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                ));
            }
            Provider::Gemini if gemini_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                ));
            }
            _ => {}
        }
        if provider != Provider::Mock && youtube_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "YOUTUBE_API_KEY must be set unless LLM_PROVIDER is 'mock'".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            ollama_base_url,
            youtube_api_key,
            chat_model,
            log_level,
            prompts_path,
            enrichment_delay,
            videos_per_subtopic,
            quiz_questions,
        })
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            enrichment: EnrichmentSettings {
                delay: self.enrichment_delay,
                max_results: self.videos_per_subtopic,
            },
            quiz_questions: self.quiz_questions,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

/// Like `parse_var`, but zero is rejected.
fn parse_count(name: &str, default: &str) -> Result<usize, ConfigError> {
    match parse_var(name, default)? {
        0 => Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be at least 1".to_string(),
        )),
        n => Ok(n),
    }
}
