use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{AgentTask, PAYLOAD_SEPARATOR, extract_json_array};
use crate::core::error::EngineError;
use crate::core::router::RouterSnapshot;
use crate::core::session::Workload;
use crate::graph::{GraphWriter, sanitize_relationship_type};

const RELATIONSHIP_SYSTEM_PROMPT: &str = "You are a stock analyst. List every company related to \
the one mentioned in the user message, including vendors, customers and competitors. Answer with a \
JSON array, for example: [ { \"name\": \"nvidia\", \"relationship\": \"vendor\" }, ... ]. A company \
with several relationships lists them comma-separated in the relationship field.";

/// One edge the model proposes between the workload's company and another.
#[derive(Debug, Deserialize)]
struct CompanyRelationship {
    name: String,
    relationship: String,
}

/// Maps a company name to its related companies and records each relationship
/// edge through the graph writer. The workload's `name` is the primary
/// company node and must be set.
pub struct RelationshipAgent {
    graph: Arc<dyn GraphWriter>,
}

impl RelationshipAgent {
    pub fn new(graph: Arc<dyn GraphWriter>) -> Self {
        Self { graph }
    }

    async fn record_relationships(
        &self,
        company: &str,
        relationships: &[CompanyRelationship],
    ) -> String {
        let mut summary = String::new();
        for rel in relationships {
            for raw_type in rel.relationship.split(',') {
                let rel_type = sanitize_relationship_type(raw_type);
                if rel_type.is_empty() {
                    continue;
                }
                match self
                    .graph
                    .merge_relationship(company, &rel.name, &rel_type)
                    .await
                {
                    Ok(()) => {
                        summary.push_str(&format!(
                            "Added relationship: {} -[{}]-> {}\n",
                            rel.name, rel_type, company
                        ));
                    }
                    Err(err) => {
                        // Keep going; the remaining edges are still worth
                        // writing, and the summary records the failure.
                        warn!(company, other = %rel.name, error = %err, "graph write failed");
                        summary.push_str(&format!(
                            "Failed to add relationship: {} -[{}]-> {}: {}\n",
                            rel.name, rel_type, company, err
                        ));
                    }
                }
            }
        }
        summary
    }
}

#[async_trait]
impl AgentTask for RelationshipAgent {
    async fn do_work(
        &self,
        workload: &mut Workload,
        router: &RouterSnapshot,
    ) -> Result<(), EngineError> {
        if workload.name.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "workload name must carry the primary company name".into(),
            ));
        }

        let model_id = workload.primary_model()?.to_string();
        let response = router
            .generate(
                &model_id,
                &workload.payload,
                Some(RELATIONSHIP_SYSTEM_PROMPT),
            )
            .await?;

        let json = extract_json_array(&response)
            .ok_or_else(|| EngineError::Upstream(anyhow!("no JSON array in model response")))?;
        let relationships: Vec<CompanyRelationship> = serde_json::from_str(json).map_err(|e| {
            EngineError::Upstream(anyhow!("model response is not a relationship list: {e}"))
        })?;

        let summary = self
            .record_relationships(&workload.name, &relationships)
            .await;

        workload.payload = format!(
            "{}{}{}\n\nProcessed relationships:\n{}",
            workload.payload, PAYLOAD_SEPARATOR, response, summary
        );
        Ok(())
    }
}
