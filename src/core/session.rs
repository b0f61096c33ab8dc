//! Workload (session) entity, its status state machine, and the static
//! descriptors used for agent selection and model registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::EngineError;

/// Lifecycle of a workload. Persisted as its `as_str` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkloadStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadStatus::Pending => "PENDING",
            WorkloadStatus::Running => "RUNNING",
            WorkloadStatus::Completed => "COMPLETED",
            WorkloadStatus::Failed => "FAILED",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(WorkloadStatus::Pending),
            "RUNNING" => Some(WorkloadStatus::Running),
            "COMPLETED" => Some(WorkloadStatus::Completed),
            "FAILED" => Some(WorkloadStatus::Failed),
            _ => None,
        }
    }
}

/// Allowed status transitions.
///
/// Pending -> Running is driven by the submitter at enqueue time. Running ->
/// Completed/Failed happens only inside the worker that owns the workload.
/// Terminal states have no outgoing edge except explicit re-arming back to
/// Running, which is again submitter-driven; there is no automatic retry.
pub fn can_transition(from: WorkloadStatus, to: WorkloadStatus) -> bool {
    match from {
        WorkloadStatus::Pending => matches!(to, WorkloadStatus::Running),
        WorkloadStatus::Running => {
            matches!(to, WorkloadStatus::Completed | WorkloadStatus::Failed)
        }
        WorkloadStatus::Completed | WorkloadStatus::Failed => {
            matches!(to, WorkloadStatus::Running)
        }
    }
}

/// A registered backend model. Immutable once loaded into a router snapshot;
/// reinitialization replaces the whole set, never a single field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub provider: String,
    pub api_key: String,
    /// Vendor-side model name, e.g. "gemini-2.5-flash" or "gpt-4o".
    #[serde(rename = "model_id")]
    pub model_identifier: String,
    #[serde(default)]
    pub api_url: Option<String>,
    /// Wire-protocol discriminator: "gemini" or "openai".
    #[serde(default)]
    pub api_spec: String,
}

/// Static agent descriptor, used only to select a dispatch tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub agent_type: String,
}

/// A unit of work. `status` and `payload` are the only fields mutated after
/// creation: the submitter arms the workload (Pending -> Running) and the one
/// worker that dequeues it writes the terminal status and result payload. The
/// queue hands each workload to exactly one worker, so no locking is needed
/// in the payload store itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent_id: String,
    pub agent_type: String,
    /// Ordered model ids the agent may use. Current agents use the first.
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub payload: String,
    pub status: WorkloadStatus,
    /// Opaque per-workload JSON for agents that need delivery settings.
    #[serde(default)]
    pub config: String,
    pub created_at: DateTime<Utc>,
}

impl Workload {
    /// A fresh Pending workload for the given agent.
    pub fn create(agent: &AgentRecord, models: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: agent.name.clone(),
            description: String::new(),
            agent_id: agent.id.clone(),
            agent_type: agent.agent_type.clone(),
            models,
            payload: String::new(),
            status: WorkloadStatus::Pending,
            config: String::new(),
            created_at: Utc::now(),
        }
    }

    /// The model id agents dispatch against (first-model-wins).
    pub fn primary_model(&self) -> Result<&str, EngineError> {
        self.models
            .first()
            .map(String::as_str)
            .ok_or_else(|| EngineError::InvalidArgument("workload has no models attached".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            WorkloadStatus::Pending,
            WorkloadStatus::Running,
            WorkloadStatus::Completed,
            WorkloadStatus::Failed,
        ] {
            assert_eq!(WorkloadStatus::from_status(status.as_str()), Some(status));
        }
        assert_eq!(WorkloadStatus::from_status("QUEUED"), None);
    }

    #[test]
    fn lifecycle_transitions() {
        assert!(can_transition(
            WorkloadStatus::Pending,
            WorkloadStatus::Running
        ));
        assert!(can_transition(
            WorkloadStatus::Running,
            WorkloadStatus::Completed
        ));
        assert!(can_transition(
            WorkloadStatus::Running,
            WorkloadStatus::Failed
        ));
    }

    #[test]
    fn terminal_states_only_re_arm() {
        for terminal in [WorkloadStatus::Completed, WorkloadStatus::Failed] {
            assert!(can_transition(terminal, WorkloadStatus::Running));
            assert!(!can_transition(terminal, WorkloadStatus::Completed));
            assert!(!can_transition(terminal, WorkloadStatus::Failed));
            assert!(!can_transition(terminal, WorkloadStatus::Pending));
        }
        assert!(!can_transition(
            WorkloadStatus::Pending,
            WorkloadStatus::Completed
        ));
    }

    #[test]
    fn primary_model_requires_a_model() {
        let agent = AgentRecord {
            id: "a1".into(),
            name: "chat".into(),
            description: String::new(),
            agent_type: "chat".into(),
        };
        let mut workload = Workload::create(&agent, vec![]);
        assert!(matches!(
            workload.primary_model(),
            Err(EngineError::InvalidArgument(_))
        ));

        workload.models = vec!["m1".into(), "m2".into()];
        assert_eq!(workload.primary_model().unwrap(), "m1");
    }
}
