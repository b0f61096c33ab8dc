//! SQLite persistence for sessions, agents and models.
//!
//! The engine treats this store as durable and linearizable per key and puts
//! no retries around it: a failed write is logged by the caller and that
//! workload's in-memory outcome is lost. Exactly one executor ever holds a
//! given workload id, so row upserts need no further coordination.

mod prices;

pub use prices::PriceStore;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tokio::sync::Mutex;

use crate::core::error::EngineError;
use crate::core::session::{AgentRecord, Model, Workload, WorkloadStatus};

pub struct Datastore {
    conn: Arc<Mutex<Connection>>,
}

impl Datastore {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path).map_err(EngineError::persistence)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                agent_type TEXT NOT NULL
            )",
            [],
        )
        .map_err(EngineError::persistence)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                agent_id TEXT NOT NULL DEFAULT '',
                agent_type TEXT NOT NULL,
                models TEXT NOT NULL DEFAULT '',
                payload TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                config TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(EngineError::persistence)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS models (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                api_key TEXT NOT NULL,
                model_id TEXT NOT NULL,
                api_url TEXT,
                api_spec TEXT NOT NULL DEFAULT ''
            )",
            [],
        )
        .map_err(EngineError::persistence)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // --- sessions ---

    pub async fn add_session(&self, workload: &Workload) -> Result<(), EngineError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO sessions
                (id, name, description, agent_id, agent_type, models, payload, status, config, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                workload.id,
                workload.name,
                workload.description,
                workload.agent_id,
                workload.agent_type,
                workload.models.join(","),
                workload.payload,
                workload.status.as_str(),
                workload.config,
                workload.created_at.to_rfc3339(),
            ],
        )
        .map_err(EngineError::persistence)?;
        Ok(())
    }

    pub async fn get_session(&self, id: &str) -> Result<Workload, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, description, agent_id, agent_type, models, payload, status, config, created_at
                 FROM sessions WHERE id = ?1 LIMIT 1",
            )
            .map_err(EngineError::persistence)?;
        let mut rows = stmt.query(params![id]).map_err(EngineError::persistence)?;
        match rows.next().map_err(EngineError::persistence)? {
            Some(row) => workload_from_row(row).map_err(EngineError::persistence),
            None => Err(EngineError::NotFound(format!("session '{}'", id))),
        }
    }

    pub async fn list_sessions(&self) -> Result<Vec<Workload>, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, description, agent_id, agent_type, models, payload, status, config, created_at
                 FROM sessions ORDER BY created_at ASC",
            )
            .map_err(EngineError::persistence)?;
        let rows = stmt
            .query_map([], workload_from_row)
            .map_err(EngineError::persistence)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(EngineError::persistence)?);
        }
        Ok(out)
    }

    // --- agents ---

    pub async fn add_agent(&self, agent: &AgentRecord) -> Result<(), EngineError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO agents (id, name, description, agent_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![agent.id, agent.name, agent.description, agent.agent_type],
        )
        .map_err(EngineError::persistence)?;
        Ok(())
    }

    pub async fn get_agent(&self, id: &str) -> Result<AgentRecord, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT id, name, description, agent_type FROM agents WHERE id = ?1 LIMIT 1")
            .map_err(EngineError::persistence)?;
        let mut rows = stmt.query(params![id]).map_err(EngineError::persistence)?;
        match rows.next().map_err(EngineError::persistence)? {
            Some(row) => agent_from_row(row).map_err(EngineError::persistence),
            None => Err(EngineError::NotFound(format!("agent '{}'", id))),
        }
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentRecord>, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT id, name, description, agent_type FROM agents ORDER BY id ASC")
            .map_err(EngineError::persistence)?;
        let rows = stmt
            .query_map([], agent_from_row)
            .map_err(EngineError::persistence)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(EngineError::persistence)?);
        }
        Ok(out)
    }

    // --- models ---

    pub async fn add_model(&self, model: &Model) -> Result<(), EngineError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO models (id, provider, api_key, model_id, api_url, api_spec)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                model.id,
                model.provider,
                model.api_key,
                model.model_identifier,
                model.api_url,
                model.api_spec,
            ],
        )
        .map_err(EngineError::persistence)?;
        Ok(())
    }

    pub async fn get_model(&self, id: &str) -> Result<Model, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, provider, api_key, model_id, api_url, api_spec
                 FROM models WHERE id = ?1 LIMIT 1",
            )
            .map_err(EngineError::persistence)?;
        let mut rows = stmt.query(params![id]).map_err(EngineError::persistence)?;
        match rows.next().map_err(EngineError::persistence)? {
            Some(row) => model_from_row(row).map_err(EngineError::persistence),
            None => Err(EngineError::NotFound(format!("model '{}'", id))),
        }
    }

    pub async fn list_models(&self) -> Result<Vec<Model>, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, provider, api_key, model_id, api_url, api_spec
                 FROM models ORDER BY id ASC",
            )
            .map_err(EngineError::persistence)?;
        let rows = stmt
            .query_map([], model_from_row)
            .map_err(EngineError::persistence)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(EngineError::persistence)?);
        }
        Ok(out)
    }
}

fn workload_from_row(row: &Row<'_>) -> rusqlite::Result<Workload> {
    let models: String = row.get(5)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    Ok(Workload {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        agent_id: row.get(3)?,
        agent_type: row.get(4)?,
        models: if models.is_empty() {
            Vec::new()
        } else {
            models.split(',').map(str::to_string).collect()
        },
        payload: row.get(6)?,
        status: WorkloadStatus::from_status(&status).unwrap_or(WorkloadStatus::Pending),
        config: row.get(8)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<AgentRecord> {
    Ok(AgentRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        agent_type: row.get(3)?,
    })
}

fn model_from_row(row: &Row<'_>) -> rusqlite::Result<Model> {
    Ok(Model {
        id: row.get(0)?,
        provider: row.get(1)?,
        api_key: row.get(2)?,
        model_identifier: row.get(3)?,
        api_url: row.get(4)?,
        api_spec: row.get(5)?,
    })
}
