use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::errors::{ReportingError, Result};

pub const DEFAULT_API_KEY_ENV: &str = "COSTATLAS_AI_API_KEY";

/// Text-in/text-out narrative collaborator.
pub trait NarrativeService {
    fn name(&self) -> &str;

    fn generate(&self, system_prompt: &str, prompt: &str) -> Result<String>;
}

/// # AiServiceConfig
/// Connection settings of an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiServiceConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        AiServiceConfig {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.4,
            timeout_secs: 60,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

fn service_err(reason: String) -> ReportingError {
    ReportingError::ServiceErr(reason)
}

/// # HttpNarrativeService
/// Blocking chat-completions client with bounded retries and exponential
/// backoff. Client errors (4xx) are not retried.
#[derive(Debug)]
pub struct HttpNarrativeService {
    config: AiServiceConfig,
    api_key: String,
}

impl HttpNarrativeService {
    /// Builds the client, reading the API key from the configured variable.
    pub fn from_env(config: AiServiceConfig) -> Result<HttpNarrativeService> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                service_err(format!(
                    "API key variable {} is not set",
                    config.api_key_env
                ))
            })?;
        Ok(HttpNarrativeService::new(config, api_key))
    }

    pub fn new(config: AiServiceConfig, api_key: String) -> HttpNarrativeService {
        HttpNarrativeService { config, api_key }
    }

    pub fn config(&self) -> &AiServiceConfig {
        &self.config
    }

    fn extract_content(response: ChatResponse) -> Result<String> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| service_err("empty completion".to_string()))
    }
}

impl NarrativeService for HttpNarrativeService {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn generate(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| service_err(e.to_string()))?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
        };

        let max_backoff = Duration::from_millis(self.config.max_backoff_ms);
        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms);
        let mut last_err = String::new();
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!(
                    "narrative: retry attempt {}/{} after {:?}",
                    attempt, self.config.max_retries, backoff
                );
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(max_backoff);
            }
            match client
                .post(&self.config.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body = resp
                            .json::<ChatResponse>()
                            .map_err(|e| service_err(format!("deserialization failed: {e}")))?;
                        return Self::extract_content(body);
                    }
                    if status.is_client_error() {
                        let body_text = resp.text().unwrap_or_default();
                        return Err(service_err(format!("HTTP {status}: {body_text}")));
                    }
                    last_err = format!("HTTP {status}");
                }
                Err(e) => last_err = e.to_string(),
            }
        }
        Err(service_err(format!(
            "all {} retries exhausted: {last_err}",
            self.config.max_retries
        )))
    }
}
