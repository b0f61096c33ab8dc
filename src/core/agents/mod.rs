//! Agent dispatch: one polymorphic unit of work per workload type tag.
//!
//! New agent types are added by registering an implementation under a new
//! tag; the dispatch site never changes.

mod chat;
mod price_watch;
mod relationship;
mod shopper;

pub use chat::ChatAgent;
pub use price_watch::{NO_DROPS_MESSAGE, PriceDrop, PriceSample, PriceWatchAgent, detect_drops};
pub use relationship::RelationshipAgent;
pub use shopper::ShoppingAgent;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::core::error::EngineError;
use crate::core::router::RouterSnapshot;
use crate::core::session::Workload;

/// Separator between a workload's original payload and appended results.
pub const PAYLOAD_SEPARATOR: &str = "\n\n---\n\n";

/// A unit of domain logic run by a worker against one workload.
///
/// Implementations read `workload.payload` as their instruction input, call
/// the router at most once, and either leave the payload unchanged (failure)
/// or append/replace it with a result derived from the model response.
#[async_trait]
pub trait AgentTask: Send + Sync {
    async fn do_work(
        &self,
        workload: &mut Workload,
        router: &RouterSnapshot,
    ) -> Result<(), EngineError>;
}

impl std::fmt::Debug for dyn AgentTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AgentTask")
    }
}

/// Registration table: dispatch tag -> agent implementation.
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn AgentTask>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    pub fn register(&mut self, agent_type: impl Into<String>, agent: Arc<dyn AgentTask>) {
        self.agents.insert(agent_type.into(), agent);
    }

    pub fn resolve(&self, agent_type: &str) -> Result<Arc<dyn AgentTask>, EngineError> {
        self.agents
            .get(agent_type)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("unknown agent type '{}'", agent_type)))
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// First JSON object in a model response, which tends to wrap JSON in prose
/// or a code fence.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let re = Regex::new(r"(?s)\{.*\}").expect("object pattern");
    re.find(text).map(|m| m.as_str())
}

/// First JSON array in a model response.
pub(crate) fn extract_json_array(text: &str) -> Option<&str> {
    let re = Regex::new(r"(?s)\[.*\]").expect("array pattern");
    re.find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopAgent;

    #[async_trait]
    impl AgentTask for NoopAgent {
        async fn do_work(
            &self,
            _workload: &mut Workload,
            _router: &RouterSnapshot,
        ) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn registry_resolves_registered_tags_only() {
        let mut registry = AgentRegistry::new();
        registry.register("chat", Arc::new(NoopAgent));

        assert!(registry.resolve("chat").is_ok());
        let err = registry.resolve("spreadsheet").unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(registry.tags(), vec!["chat"]);
    }

    #[test]
    fn json_object_extraction() {
        let text = "Sure, here it is:\n```json\n{\"name\": \"Widget\", \"price\": 9.5}\n```";
        let json = extract_json_object(text).unwrap();
        assert!(json.starts_with('{') && json.ends_with('}'));
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["name"], "Widget");

        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn json_array_extraction() {
        let text = "The companies are: [{\"name\": \"acme\", \"relationship\": \"vendor\"}] done";
        let json = extract_json_array(text).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed[0]["relationship"], "vendor");

        assert!(extract_json_array("nothing").is_none());
    }
}
