//! Interactive controller: the submission surface of the engine.
//!
//! Workloads are authored here and handed to the pool fully formed. The
//! controller owns the queue's send side; when it returns, the queue closes
//! and the pool drains.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::pool::{WorkloadSender, submit_workload};
use crate::core::router::ProviderRouter;
use crate::core::session::{AgentRecord, Model, Workload, WorkloadStatus};
use crate::storage::Datastore;

pub struct Controller {
    store: Arc<Datastore>,
    router: Arc<ProviderRouter>,
    queue: WorkloadSender,
    agents: HashMap<String, AgentRecord>,
    current: Option<Workload>,
    payload_buffer: String,
    in_payload_mode: bool,
}

enum Outcome {
    Continue,
    Quit,
}

impl Controller {
    pub async fn new(
        store: Arc<Datastore>,
        router: Arc<ProviderRouter>,
        queue: WorkloadSender,
    ) -> Result<Self> {
        let agents = store
            .list_agents()
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        Ok(Self {
            store,
            router,
            queue,
            agents,
            current: None,
            payload_buffer: String::new(),
            in_payload_mode: false,
        })
    }

    /// Read commands until `/quit` or end of input.
    pub async fn run(mut self) -> Result<()> {
        println!("drover controller ready. Type /help for commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim_end().to_string();
            if self.in_payload_mode && !line.starts_with('/') {
                self.payload_buffer.push_str(&line);
                self.payload_buffer.push('\n');
                continue;
            }
            if line.is_empty() {
                continue;
            }
            match self.handle_command(&line).await {
                Ok(Outcome::Continue) => {}
                Ok(Outcome::Quit) => break,
                Err(err) => println!("error: {err:#}"),
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, line: &str) -> Result<Outcome> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["/help"] => {
                print_help();
            }
            ["/quit"] => return Ok(Outcome::Quit),
            ["/list", "agents"] => self.list_agents().await?,
            ["/list", "sessions"] => self.list_sessions().await?,
            ["/list", "models"] => self.list_models().await?,
            ["/add", "agent", file] => self.add_agent(file).await?,
            ["/add", "model", file] => self.add_model(file).await?,
            ["/reload", "models"] => {
                let models = self.store.list_models().await?;
                let count = models.len();
                self.router.initialize(models).await;
                println!("Provider router reloaded with {count} model(s).");
            }
            ["/session", "start", agent_id, models @ ..] => {
                self.start_session(agent_id, models).await?;
            }
            ["/session", "run"] => self.run_current().await?,
            ["/session", "run", session_id] => self.run_by_id(session_id).await?,
            ["/session", "save"] => self.save_current().await?,
            _ => println!("Unknown command. Type /help for a list of commands."),
        }
        Ok(Outcome::Continue)
    }

    async fn list_agents(&self) -> Result<()> {
        if self.agents.is_empty() {
            println!("No agents registered.");
            return Ok(());
        }
        let mut agents: Vec<&AgentRecord> = self.agents.values().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        for agent in agents {
            println!(
                "  - {} [{}]: {}\n    {}",
                agent.id, agent.agent_type, agent.name, agent.description
            );
        }
        Ok(())
    }

    async fn list_sessions(&self) -> Result<()> {
        let sessions = self.store.list_sessions().await?;
        if sessions.is_empty() {
            println!("No sessions created.");
            return Ok(());
        }
        for session in sessions {
            let mut payload: String = session.payload.replace('\n', " ").chars().take(50).collect();
            if payload.chars().count() == 50 {
                payload.push_str("...");
            }
            println!(
                "  - {} [{}] {}: {}",
                session.id,
                session.status.as_str(),
                session.name,
                payload
            );
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<()> {
        let models = self.store.list_models().await?;
        if models.is_empty() {
            println!("No models registered.");
            return Ok(());
        }
        for model in models {
            println!(
                "  - {} [{}]: {} ({})",
                model.id, model.api_spec, model.model_identifier, model.provider
            );
        }
        Ok(())
    }

    async fn add_agent(&mut self, file: &str) -> Result<()> {
        let path = file.strip_prefix('@').unwrap_or(file);
        let raw = std::fs::read_to_string(Path::new(path))?;
        let agent: AgentRecord = serde_json::from_str(&raw)?;
        self.store.add_agent(&agent).await?;
        println!("Agent '{}' with id '{}' added.", agent.name, agent.id);
        self.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    async fn add_model(&mut self, file: &str) -> Result<()> {
        let path = file.strip_prefix('@').unwrap_or(file);
        let raw = std::fs::read_to_string(Path::new(path))?;
        let model: Model = serde_json::from_str(&raw)?;
        self.store.add_model(&model).await?;
        println!(
            "Model '{}' added. Run /reload models to make it routable.",
            model.id
        );
        Ok(())
    }

    async fn start_session(&mut self, agent_id: &str, models: &[&str]) -> Result<()> {
        // The cache covers agents added this run; fall back to the store for
        // anything registered earlier.
        if !self.agents.contains_key(agent_id) {
            match self.store.get_agent(agent_id).await {
                Ok(agent) => {
                    self.agents.insert(agent.id.clone(), agent);
                }
                Err(_) => {
                    println!("Agent with id '{agent_id}' not found.");
                    return Ok(());
                }
            }
        }
        for model_id in models {
            if self.store.get_model(model_id).await.is_err() {
                println!("warning: model '{model_id}' is not in the registry");
            }
        }
        let agent = &self.agents[agent_id];
        let models = models.iter().map(|m| m.to_string()).collect();
        self.current = Some(Workload::create(agent, models));
        self.payload_buffer.clear();
        self.in_payload_mode = true;
        println!("What should the agent do? Enter the instruction below, then /session run.");
        Ok(())
    }

    async fn run_current(&mut self) -> Result<()> {
        let Some(mut workload) = self.current.take() else {
            println!("No active session. Use '/session start <agent-id>' first.");
            return Ok(());
        };
        self.in_payload_mode = false;
        workload.payload = std::mem::take(&mut self.payload_buffer).trim_end().to_string();
        let id = workload.id.clone();
        submit_workload(workload, &self.store, &self.queue).await?;
        println!("Running session {id}.");
        Ok(())
    }

    async fn run_by_id(&mut self, session_id: &str) -> Result<()> {
        // Re-arming a finished session goes through the same Running
        // transition as a fresh one. A session already Running may be held
        // by a worker; enqueueing it again would break single ownership.
        match self.store.get_session(session_id).await {
            Ok(workload) => {
                if workload.status == WorkloadStatus::Running {
                    println!("Session {session_id} is already running.");
                    return Ok(());
                }
                if let Ok(model_id) = workload.primary_model() {
                    if self.router.snapshot().await.model(model_id).is_none() {
                        println!("warning: model '{model_id}' is not routable; the run may fail");
                    }
                }
                submit_workload(workload, &self.store, &self.queue).await?;
                println!("Running session {session_id}.");
            }
            Err(err) => println!("Cannot run '{session_id}': {err}"),
        }
        Ok(())
    }

    async fn save_current(&mut self) -> Result<()> {
        let Some(workload) = self.current.as_mut() else {
            println!("No active session. Use '/session start <agent-id>' first.");
            return Ok(());
        };
        self.in_payload_mode = false;
        workload.payload = self.payload_buffer.trim_end().to_string();
        self.store.add_session(workload).await?;
        println!("Saved session {}.", workload.id);
        Ok(())
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  /help                                  Show this help message");
    println!("  /list agents|sessions|models           List registered entries");
    println!("  /add agent @<file.json>                Register an agent from a file");
    println!("  /add model @<file.json>                Register a model from a file");
    println!("  /reload models                         Rebuild the provider router from the store");
    println!("  /session start <agent-id> [model-id..] Author a new workload");
    println!("  /session run [session-id]              Submit the current (or stored) workload");
    println!("  /session save                          Persist the current workload without running");
    println!("  /quit                                  Exit");
}
