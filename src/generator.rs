//! Answer-generation service client (OpenRouter-compatible chat completions).
//!
//! One request, one reply. The client never retries internally: a failed or
//! empty completion surfaces as an error, and each caller applies its own
//! retry policy (the correction loop's bounded retries, the improvement
//! loop's skip-and-continue).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::util::truncate;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Hard cap on a single round-trip; a timeout is an ordinary failure that
/// feeds the caller's retry path.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const MAX_COMPLETION_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Copy)]
pub enum Model {
    Flash, // fast tier, default for script rewrites and context blurbs
    Pro,   // deeper tier for stubborn corrections
}

impl Model {
    pub fn id(&self) -> &'static str {
        match self {
            Model::Flash => "google/gemini-2.5-flash",
            Model::Pro => "google/gemini-2.5-pro",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Model::Flash => "Gemini Flash",
            Model::Pro => "Gemini Pro",
        }
    }
}

/// The single seam the synthesis loop talks through. Injected at
/// construction so tests can script replies without a network.
pub trait GenerateAnswers: Send {
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

pub struct OpenRouterGenerator {
    client: reqwest::blocking::Client,
    api_key: String,
    model_id: String,
}

impl OpenRouterGenerator {
    pub fn new(api_key: String, model_id: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            model_id,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl GenerateAnswers for OpenRouterGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model_id.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: MAX_COMPLETION_TOKENS,
            stream: false,
        };

        let response = self
            .client
            .post(OPENROUTER_URL)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()?;

        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            let error_msg = match status.as_u16() {
                401 => "invalid API key".to_string(),
                429 => "rate limited by the generation service; try again shortly".to_string(),
                500..=599 => format!(
                    "generation service error ({}); it may be temporarily unavailable",
                    status
                ),
                _ => format!("API error {}: {}", status, truncate(&text, 200)),
            };
            anyhow::bail!("{}", error_msg);
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse completion response: {}", e))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            anyhow::bail!("generation service returned an empty completion");
        }

        Ok(content)
    }
}
