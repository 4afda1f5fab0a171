//! Chat-completion HTTP client

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::types::*;

/// Client for an OpenAI-compatible chat-completion endpoint
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(Error::Http)?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create with custom base URL (for testing or custom endpoints)
    pub fn with_base_url(config: &LlmConfig, base_url: impl Into<String>) -> Result<Self> {
        let mut client = Self::new(config)?;
        client.base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(client)
    }

    /// Full URL requests are posted to
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send one chat completion request and return the reply text.
    ///
    /// Only HTTP 200 with a non-empty `choices` array counts as success.
    pub async fn complete(&self, request: &ChatCompletionRequest) -> Result<String> {
        let url = self.endpoint();

        debug!(
            url = %url,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if status != StatusCode::OK {
            warn!("Chat API error: {} - {}", status, body);
            return Err(Error::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            Error::InvalidResponse(format!("Failed to parse response: {} - {}", e, body))
        })?;

        let choices = match &parsed.choices {
            Some(choices) if !choices.is_empty() => choices,
            _ => {
                warn!("Chat API response has no choices: {}", body);
                return Err(Error::NoChoices);
            }
        };

        let content = choices[0]
            .message
            .content
            .clone()
            .ok_or_else(|| Error::InvalidResponse("first choice has no content".to_string()))?;

        info!(
            "Chat API response: finish_reason={:?}, tokens={}",
            choices[0].finish_reason,
            parsed.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
        );

        Ok(content)
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }
}
