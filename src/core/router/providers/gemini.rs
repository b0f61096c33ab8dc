use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;
use crate::core::router::{ApiSpec, ProviderClient};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Serialize)]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResContent,
}

#[derive(Deserialize)]
struct GeminiResContent {
    #[serde(default)]
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    text: String,
}

pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, api_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: api_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn spec(&self) -> ApiSpec {
        ApiSpec::Gemini
    }

    async fn generate(
        &self,
        model_identifier: &str,
        input: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, EngineError> {
        // The role on system_instruction is ignored by the API but required
        // by the payload shape.
        let system_instruction = system_prompt.map(|text| GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: text.to_string(),
            }],
        });

        let req = GeminiRequest {
            system_instruction,
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: input.to_string(),
                }],
            }],
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            model_identifier,
            self.api_key
        );
        let res = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(EngineError::upstream)?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(EngineError::Upstream(anyhow!(
                "Gemini API error ({}): {}",
                status,
                res.text().await.unwrap_or_default()
            )));
        }

        let parsed: GeminiResponse = res.json().await.map_err(EngineError::upstream)?;
        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }
}
