//! Graph-database relationship writer.
//!
//! The relationship agent treats this as a side-effecting collaborator: one
//! MERGE per (company, other, type) edge. The production implementation
//! targets the Neo4j HTTP transaction endpoint.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::GraphConfig;

#[async_trait]
pub trait GraphWriter: Send + Sync {
    /// Merge `(other)-[:relationship_type]->(company)`, creating both company
    /// nodes as needed. `relationship_type` must already be sanitized.
    async fn merge_relationship(
        &self,
        company: &str,
        other: &str,
        relationship_type: &str,
    ) -> Result<()>;
}

/// Prepare a model-supplied string for use as a relationship type.
/// Relationship types cannot be parameterized in Cypher, so the result is
/// restricted to `[A-Z0-9_]` before it is interpolated into a statement.
pub fn sanitize_relationship_type(raw: &str) -> String {
    let mut out = String::new();
    for c in raw.trim().to_uppercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if c == ' ' || c == '-' {
            out.push('_');
        }
    }
    out
}

pub struct Neo4jHttpWriter {
    endpoint: String,
    username: String,
    password: String,
    client: Client,
}

impl Neo4jHttpWriter {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            endpoint: format!("{}/db/neo4j/tx/commit", config.uri.trim_end_matches('/')),
            username: config.username.clone(),
            password: config.password.clone(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl GraphWriter for Neo4jHttpWriter {
    async fn merge_relationship(
        &self,
        company: &str,
        other: &str,
        relationship_type: &str,
    ) -> Result<()> {
        let statement = format!(
            "MERGE (c1:Company {{name: $company}}) \
             MERGE (c2:Company {{name: $other}}) \
             MERGE (c2)-[r:{}]->(c1)",
            relationship_type
        );
        let body = json!({
            "statements": [{
                "statement": statement,
                "parameters": { "company": company, "other": other }
            }]
        });

        let res = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(anyhow!(
                "graph endpoint returned {}: {}",
                status,
                res.text().await.unwrap_or_default()
            ));
        }

        // The transaction endpoint reports Cypher failures in-body with a
        // 200 status.
        let parsed: serde_json::Value = res.json().await?;
        if let Some(errors) = parsed.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                return Err(anyhow!("graph write rejected: {}", json!(errors)));
            }
        }
        Ok(())
    }
}

/// Stand-in registered when no `[graph]` block is configured; every write
/// fails with a clear message instead of panicking the agent.
pub struct UnconfiguredGraph;

#[async_trait]
impl GraphWriter for UnconfiguredGraph {
    async fn merge_relationship(&self, _company: &str, _other: &str, _rel: &str) -> Result<()> {
        Err(anyhow!(
            "no graph database configured; add a [graph] section to drover.toml"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_produces_upper_snake_identifiers() {
        assert_eq!(sanitize_relationship_type(" vendor "), "VENDOR");
        assert_eq!(sanitize_relationship_type("supply chain partner"), "SUPPLY_CHAIN_PARTNER");
        assert_eq!(sanitize_relationship_type("joint-venture"), "JOINT_VENTURE");
        assert_eq!(sanitize_relationship_type("customer]->(x) DETACH DELETE"), "CUSTOMER_X_DETACH_DELETE");
        assert_eq!(sanitize_relationship_type("  "), "");
    }
}
