use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{AgentTask, extract_json_object};
use crate::core::agents::PriceSample;
use crate::core::error::EngineError;
use crate::core::router::RouterSnapshot;
use crate::core::session::Workload;
use crate::storage::PriceStore;

const SHOPPING_SYSTEM_PROMPT: &str = "You are a shopping assistant. Find the current price of the \
product mentioned in the user message and answer with a single JSON object, for example: \
{ \"name\": \"product name\", \"price\": 12.34, \"source\": \"amazon.com\", \"url\": \"https://...\" }. \
The url field is optional.";

/// Shape of the JSON object the model is asked to produce.
#[derive(Debug, Deserialize)]
struct ShoppingResult {
    name: String,
    price: f64,
    source: String,
    #[serde(default)]
    url: Option<String>,
}

/// Price-discovery agent: asks the model for the current price of the product
/// described in the payload and appends a sample row to the price history.
/// The payload itself is left unchanged.
pub struct ShoppingAgent {
    prices: Arc<PriceStore>,
}

impl ShoppingAgent {
    pub fn new(prices: Arc<PriceStore>) -> Self {
        Self { prices }
    }
}

#[async_trait]
impl AgentTask for ShoppingAgent {
    async fn do_work(
        &self,
        workload: &mut Workload,
        router: &RouterSnapshot,
    ) -> Result<(), EngineError> {
        let model_id = workload.primary_model()?.to_string();
        let response = router
            .generate(&model_id, &workload.payload, Some(SHOPPING_SYSTEM_PROMPT))
            .await?;

        let json = extract_json_object(&response)
            .ok_or_else(|| EngineError::Upstream(anyhow!("no JSON object in model response")))?;
        let result: ShoppingResult = serde_json::from_str(json).map_err(|e| {
            EngineError::Upstream(anyhow!("model response is not a shopping result: {e}"))
        })?;

        let sample = PriceSample {
            name: result.name,
            price: result.price,
            date: Utc::now(),
            source: result.source,
            url: result.url,
        };
        info!(product = %sample.name, price = sample.price, source = %sample.source, "recording price sample");
        self.prices.insert_sample(&sample).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::router::{ApiSpec, ProviderClient};
    use crate::core::session::{Model, WorkloadStatus};

    struct CannedClient(&'static str);

    #[async_trait]
    impl ProviderClient for CannedClient {
        fn spec(&self) -> ApiSpec {
            ApiSpec::Gemini
        }

        async fn generate(
            &self,
            _model_identifier: &str,
            _input: &str,
            _system_prompt: Option<&str>,
        ) -> Result<String, EngineError> {
            Ok(self.0.to_string())
        }
    }

    fn snapshot(reply: &'static str) -> RouterSnapshot {
        RouterSnapshot::stub(
            vec![Model {
                id: "m1".into(),
                provider: "google".into(),
                api_key: "k".into(),
                model_identifier: "gemini-2.5-flash".into(),
                api_url: None,
                api_spec: "gemini".into(),
            }],
            vec![Arc::new(CannedClient(reply))],
        )
    }

    fn workload() -> Workload {
        Workload {
            id: "w1".into(),
            name: "shopping".into(),
            description: String::new(),
            agent_id: "a1".into(),
            agent_type: "shopping".into(),
            models: vec!["m1".into()],
            payload: "price of a 20V cordless drill".into(),
            status: WorkloadStatus::Running,
            config: String::new(),
            created_at: Utc::now(),
        }
    }

    fn temp_store() -> (Arc<PriceStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceStore::open(&dir.path().join("prices.db")).unwrap();
        (Arc::new(store), dir)
    }

    #[tokio::test]
    async fn records_a_sample_and_keeps_the_payload() {
        let (prices, _dir) = temp_store();
        let agent = ShoppingAgent::new(prices.clone());
        let mut w = workload();

        let reply = "Found it! {\"name\": \"Cordless Drill\", \"price\": 89.99, \"source\": \"example.com\"}";
        agent.do_work(&mut w, &snapshot(reply)).await.unwrap();

        assert_eq!(w.payload, "price of a 20V cordless drill");
        let samples = prices.all_samples().await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "Cordless Drill");
        assert_eq!(samples[0].price, 89.99);
        assert_eq!(samples[0].url, None);
    }

    #[tokio::test]
    async fn prose_without_json_is_an_upstream_failure() {
        let (prices, _dir) = temp_store();
        let agent = ShoppingAgent::new(prices.clone());
        let mut w = workload();

        let err = agent
            .do_work(&mut w, &snapshot("I could not find that product."))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Upstream(_)));
        assert!(prices.all_samples().await.unwrap().is_empty());
    }
}
