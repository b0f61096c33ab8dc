use async_trait::async_trait;

use super::{AgentTask, PAYLOAD_SEPARATOR};
use crate::core::error::EngineError;
use crate::core::router::RouterSnapshot;
use crate::core::session::Workload;

/// Plain conversational agent: the payload is the prompt, the response is
/// appended below it.
pub struct ChatAgent;

#[async_trait]
impl AgentTask for ChatAgent {
    async fn do_work(
        &self,
        workload: &mut Workload,
        router: &RouterSnapshot,
    ) -> Result<(), EngineError> {
        let model_id = workload.primary_model()?.to_string();
        let response = router.generate(&model_id, &workload.payload, None).await?;

        workload.payload = format!("{}{}{}", workload.payload, PAYLOAD_SEPARATOR, response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::router::{ApiSpec, ProviderClient};
    use crate::core::session::Model;

    struct CannedClient(&'static str);

    #[async_trait]
    impl ProviderClient for CannedClient {
        fn spec(&self) -> ApiSpec {
            ApiSpec::Openai
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

    fn workload(models: Vec<String>) -> Workload {
        Workload {
            id: "w1".into(),
            name: "chat".into(),
            description: String::new(),
            agent_id: "a1".into(),
            agent_type: "chat".into(),
            models,
            payload: "what is a drover?".into(),
            status: crate::core::session::WorkloadStatus::Running,
            config: String::new(),
            created_at: chrono::Utc::now(),
        }
    }

    fn snapshot() -> RouterSnapshot {
        RouterSnapshot::stub(
            vec![Model {
                id: "m1".into(),
                provider: "openai".into(),
                api_key: "k".into(),
                model_identifier: "gpt-4o".into(),
                api_url: None,
                api_spec: "openai".into(),
            }],
            vec![Arc::new(CannedClient("a stock herder"))],
        )
    }

    #[tokio::test]
    async fn appends_response_below_the_original_payload() {
        let mut w = workload(vec!["m1".into()]);
        ChatAgent.do_work(&mut w, &snapshot()).await.unwrap();
        assert_eq!(w.payload, "what is a drover?\n\n---\n\na stock herder");
    }

    #[tokio::test]
    async fn missing_models_is_invalid_argument_and_leaves_payload_alone() {
        let mut w = workload(vec![]);
        let err = ChatAgent.do_work(&mut w, &snapshot()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert_eq!(w.payload, "what is a drover?");
    }
}
