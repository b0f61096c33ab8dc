use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::*;
use crate::core::error::EngineError;
use crate::core::session::Model;

struct StaticClient {
    spec: ApiSpec,
    reply: String,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, Option<String>)>>,
}

impl StaticClient {
    fn new(spec: ApiSpec, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            spec,
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ProviderClient for StaticClient {
    fn spec(&self) -> ApiSpec {
        self.spec
    }

    async fn generate(
        &self,
        model_identifier: &str,
        _input: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().await = Some((
            model_identifier.to_string(),
            system_prompt.map(str::to_string),
        ));
        Ok(self.reply.clone())
    }
}

fn model(id: &str, spec: &str, identifier: &str) -> Model {
    Model {
        id: id.to_string(),
        provider: "test".to_string(),
        api_key: "key".to_string(),
        model_identifier: identifier.to_string(),
        api_url: None,
        api_spec: spec.to_string(),
    }
}

#[tokio::test]
async fn generate_routes_by_wire_spec() {
    let gemini = StaticClient::new(ApiSpec::Gemini, "from-gemini");
    let openai = StaticClient::new(ApiSpec::Openai, "from-openai");
    let snapshot = RouterSnapshot::stub(
        vec![
            model("g1", "gemini", "gemini-2.5-flash"),
            model("o1", "openai", "gpt-4o"),
        ],
        vec![gemini.clone(), openai.clone()],
    );

    let reply = snapshot.generate("g1", "hello", None).await.unwrap();
    assert_eq!(reply, "from-gemini");
    assert_eq!(gemini.calls.load(Ordering::SeqCst), 1);
    assert_eq!(openai.calls.load(Ordering::SeqCst), 0);

    let reply = snapshot.generate("o1", "hello", None).await.unwrap();
    assert_eq!(reply, "from-openai");
    assert_eq!(openai.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generate_uses_the_vendor_side_identifier() {
    let client = StaticClient::new(ApiSpec::Openai, "ok");
    let snapshot = RouterSnapshot::stub(
        vec![model("registry-id", "openai", "gpt-4o-mini")],
        vec![client.clone()],
    );

    snapshot
        .generate("registry-id", "hi", Some("be terse"))
        .await
        .unwrap();

    let seen = client.last_request.lock().await.clone().unwrap();
    assert_eq!(seen.0, "gpt-4o-mini");
    assert_eq!(seen.1.as_deref(), Some("be terse"));
}

#[tokio::test]
async fn unknown_model_id_is_not_found() {
    let snapshot = RouterSnapshot::stub(vec![], vec![]);
    let err = snapshot.generate("missing", "hi", None).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn model_with_unrecognized_spec_has_no_client() {
    let router = ProviderRouter::new();
    router
        .initialize(vec![model("l1", "llama", "llama-3-70b")])
        .await;

    let snapshot = router.snapshot().await;
    // The model is registered, but generate cannot resolve a client for it.
    assert!(snapshot.model("l1").is_some());
    let err = snapshot.generate("l1", "hi", None).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn missing_client_for_known_spec_is_not_found() {
    let snapshot = RouterSnapshot::stub(vec![model("o1", "openai", "gpt-4o")], vec![]);
    let err = snapshot.generate("o1", "hi", None).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn reinitialize_does_not_disturb_held_snapshots() {
    let router = ProviderRouter::new();
    router
        .initialize(vec![model("g1", "gemini", "gemini-2.5-flash")])
        .await;

    // An in-flight call holds a snapshot reference, not the lock.
    let held = router.snapshot().await;
    router.initialize(vec![]).await;

    assert!(held.model("g1").is_some());
    assert!(router.snapshot().await.model("g1").is_none());
}

#[test]
fn api_spec_parsing() {
    assert_eq!(ApiSpec::parse("gemini"), Some(ApiSpec::Gemini));
    assert_eq!(ApiSpec::parse("openai"), Some(ApiSpec::Openai));
    assert_eq!(ApiSpec::parse(""), None);
    assert_eq!(ApiSpec::parse("Gemini"), None);
}
