
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::RagError;
use crate::config::Config;
use crate::generation::relevance_prompt;

const SYSTEM_MESSAGE: &str = "You are a helpful assistant.";
const RELEVANCE_MAX_TOKENS: u32 = 10;
const RELEVANCE_TEMPERATURE: f32 = 0.2;

/// Client for an OpenAI-compatible chat-completions service.
///
/// The API key is resolved exactly once at construction — environment
/// variable first, then the config file — and held immutably for the life of
/// the client. Failures are propagated to the caller as `Generation` errors;
/// this layer never retries, so any retry policy belongs upstream.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    completions_url: Url,
    model: String,
    api_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl CompletionClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self, RagError> {
        let completions_url = config.generation.completions_url().map_err(|e| {
            RagError::Config(format!("Invalid completion service URL: {}", e))
        })?;

        let api_key = resolve_api_key(config)?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.generation.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            completions_url,
            model: config.generation.model.clone(),
            api_key,
            agent,
        })
    }

    /// Identifier of the completion model this client targets
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call the completion service with the provided prompt and parameters.
    ///
    /// Returns the generated text unchanged apart from trimming surrounding
    /// whitespace.
    #[inline]
    pub fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, RagError> {
        debug!(
            "Requesting completion (prompt length: {}, max_tokens: {})",
            prompt.len(),
            max_tokens
        );

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_MESSAGE.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens,
            temperature,
        };

        let request_json = serde_json::to_string(&request).map_err(|e| {
            RagError::Generation(format!("Failed to serialize completion request: {}", e))
        })?;

        let auth_header = format!("Bearer {}", self.api_key);
        let response_text = self
            .agent
            .post(self.completions_url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", auth_header.as_str())
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| classify_transport_error(&e))?;

        let response: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Generation(format!("Failed to parse completion response: {}", e))
        })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            RagError::Generation("Completion response contained no choices".to_string())
        })?;

        Ok(choice.message.content.trim().to_string())
    }

    /// Decide whether a query concerns depression drug recommendations.
    ///
    /// A single low-temperature yes/no completion; anything other than "yes"
    /// counts as off topic.
    #[inline]
    pub fn classify_relevance(&self, query: &str) -> Result<bool, RagError> {
        let prompt = relevance_prompt(query);
        let response = self.complete(&prompt, RELEVANCE_MAX_TOKENS, RELEVANCE_TEMPERATURE)?;

        let verdict = response.trim().trim_end_matches('.');
        let relevant = verdict.eq_ignore_ascii_case("yes");
        debug!("Relevance verdict for query: {}", relevant);
        Ok(relevant)
    }
}

fn resolve_api_key(config: &Config) -> Result<String, RagError> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.trim().is_empty() {
            debug!("Using API key from OPENAI_API_KEY environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = &config.generation.api_key {
        if !key.trim().is_empty() {
            debug!("Using API key from config file");
            return Ok(key.clone());
        }
    }

    Err(RagError::Config(
        "Completion API key not found. Set the OPENAI_API_KEY environment variable \
         or add an api_key to the [generation] section of the config file."
            .to_string(),
    ))
}

fn classify_transport_error(error: &ureq::Error) -> RagError {
    match error {
        ureq::Error::StatusCode(401 | 403) => {
            warn!("Completion service rejected credentials");
            RagError::Generation(
                "Authentication failed: the completion service rejected the API key".to_string(),
            )
        }
        ureq::Error::StatusCode(429) => {
            warn!("Completion service rate limit hit");
            RagError::Generation("Rate limited by the completion service (HTTP 429)".to_string())
        }
        ureq::Error::StatusCode(status) => {
            RagError::Generation(format!("Completion request failed: HTTP {}", status))
        }
        ureq::Error::Timeout(_) => {
            RagError::Generation(format!("Completion request timed out: {}", error))
        }
        _ => RagError::Generation(format!("Completion request failed: {}", error)),
    }
}
