//! Model registry and provider routing.
//!
//! A [`RouterSnapshot`] is an immutable point-in-time view of the registered
//! models and their vendor clients. [`ProviderRouter`] holds the current
//! snapshot behind a reader/writer lock: readers clone the `Arc` and release
//! the lock before any network call, writers install a wholly new snapshot.
//! Reinitialization is therefore never observed as a partial state: calls
//! already in flight keep using the snapshot they started with.

pub mod providers;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::core::error::EngineError;
use crate::core::session::Model;
use providers::{GeminiClient, OpenAiClient};

/// Wire-protocol discriminator. One vendor client implementation exists per
/// variant, resolved once at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiSpec {
    Gemini,
    Openai,
}

impl ApiSpec {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gemini" => Some(ApiSpec::Gemini),
            "openai" => Some(ApiSpec::Openai),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiSpec::Gemini => "gemini",
            ApiSpec::Openai => "openai",
        }
    }
}

/// Capability interface over one vendor's content-generation API.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn spec(&self) -> ApiSpec;

    /// One synchronous content-generation call. Returns the first text
    /// output; vendor errors are wrapped, never swallowed.
    async fn generate(
        &self,
        model_identifier: &str,
        input: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, EngineError>;
}

/// Immutable registry view: model-id -> Model, wire-spec -> client.
pub struct RouterSnapshot {
    models: HashMap<String, Model>,
    clients: HashMap<ApiSpec, Arc<dyn ProviderClient>>,
}

impl RouterSnapshot {
    fn empty() -> Self {
        Self {
            models: HashMap::new(),
            clients: HashMap::new(),
        }
    }

    fn build(models: Vec<Model>) -> Self {
        let mut snapshot = Self::empty();
        for model in models {
            match ApiSpec::parse(&model.api_spec) {
                Some(spec) => {
                    // The first model carrying a spec supplies that client's
                    // credentials and endpoint; later models reuse it.
                    if !snapshot.clients.contains_key(&spec) {
                        let client: Arc<dyn ProviderClient> = match spec {
                            ApiSpec::Gemini => Arc::new(GeminiClient::new(
                                model.api_key.clone(),
                                model.api_url.clone(),
                            )),
                            ApiSpec::Openai => Arc::new(OpenAiClient::new(
                                model.api_key.clone(),
                                model.api_url.clone(),
                            )),
                        };
                        snapshot.clients.insert(spec, client);
                        info!(spec = spec.as_str(), "initialized provider client");
                    }
                }
                None => {
                    warn!(
                        model = %model.id,
                        spec = %model.api_spec,
                        "unknown or unspecified api spec, no client for this model"
                    );
                }
            }
            snapshot.models.insert(model.id.clone(), model);
        }
        snapshot
    }

    #[cfg(test)]
    pub(crate) fn stub(models: Vec<Model>, clients: Vec<Arc<dyn ProviderClient>>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
            clients: clients.into_iter().map(|c| (c.spec(), c)).collect(),
        }
    }

    pub fn model(&self, model_id: &str) -> Option<&Model> {
        self.models.get(model_id)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Resolve `model_id` to its registered model and wire-spec client, then
    /// issue one content-generation call against the vendor-side identifier.
    pub async fn generate(
        &self,
        model_id: &str,
        input: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, EngineError> {
        let model = self
            .models
            .get(model_id)
            .ok_or_else(|| EngineError::NotFound(format!("model '{}' is not registered", model_id)))?;
        let spec = ApiSpec::parse(&model.api_spec).ok_or_else(|| {
            EngineError::NotFound(format!(
                "no provider handles api spec '{}' (model '{}')",
                model.api_spec, model_id
            ))
        })?;
        let client = self.clients.get(&spec).ok_or_else(|| {
            EngineError::NotFound(format!(
                "provider client for spec '{}' is not initialized",
                spec.as_str()
            ))
        })?;
        client
            .generate(&model.model_identifier, input, system_prompt)
            .await
    }
}

/// Shared router handle. Many concurrent readers, one writer; a swap never
/// disturbs readers that already hold a snapshot.
pub struct ProviderRouter {
    current: RwLock<Arc<RouterSnapshot>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RouterSnapshot::empty())),
        }
    }

    /// Replace the registry wholesale with a snapshot built from `models`.
    pub async fn initialize(&self, models: Vec<Model>) {
        let next = Arc::new(RouterSnapshot::build(models));
        let count = next.model_count();
        *self.current.write().await = next;
        info!(models = count, "provider router initialized");
    }

    /// Point-in-time view; the read lock is released before the caller does
    /// any work against it.
    pub async fn snapshot(&self) -> Arc<RouterSnapshot> {
        self.current.read().await.clone()
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
