use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;
use crate::core::router::{ApiSpec, ProviderClient};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    content: String,
}

pub struct OpenAiClient {
    api_key: String,
    api_url: String,
    client: Client,
}

impl OpenAiClient {
    /// `api_url` overrides the default endpoint, which also makes this
    /// client serve OpenAI-compatible gateways.
    pub fn new(api_key: String, api_url: Option<String>) -> Self {
        Self {
            api_key,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn spec(&self) -> ApiSpec {
        ApiSpec::Openai
    }

    async fn generate(
        &self,
        model_identifier: &str,
        input: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, EngineError> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(OpenAiMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(OpenAiMessage {
            role: "user",
            content: input,
        });

        let req = OpenAiRequest {
            model: model_identifier,
            messages,
        };
        let res = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await
            .map_err(EngineError::upstream)?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(EngineError::Upstream(anyhow!(
                "OpenAI API error ({}): {}",
                status,
                res.text().await.unwrap_or_default()
            )));
        }

        let parsed: OpenAiResponse = res.json().await.map_err(EngineError::upstream)?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}
