//! Ollama chat API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LanguageModel, LlmError, LlmResult};

/// Default Ollama server URL.
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, temperature: f32, timeout: Duration) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            temperature,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.host)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str, model: &str) -> LlmResult<String> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        debug!(model, prompt_len = prompt.len(), "Sending chat request to Ollama");
        let response = self.client.post(self.chat_url()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            if status.as_u16() == 404 {
                return Err(LlmError::ModelNotFound(model.to_string()));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.message
            .map(|m| m.content)
            .ok_or_else(|| LlmError::InvalidResponse("response has no message".to_string()))
    }
}
