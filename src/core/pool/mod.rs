//! Fixed-size worker pool over a shared FIFO queue.
//!
//! Submission arms a workload (Pending -> Running, persisted before work
//! begins) and sends it to the queue; exactly one executor dequeues it, runs
//! the agent step against a router snapshot, and persists the terminal
//! status. Closing the submitter side of the queue drains it: each executor
//! finishes its current item and exits.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::agents::AgentRegistry;
use crate::core::router::ProviderRouter;
use crate::core::session::{Workload, WorkloadStatus, can_transition};
use crate::storage::Datastore;

pub const DEFAULT_WORKERS: usize = 5;

pub type WorkloadSender = mpsc::UnboundedSender<Workload>;

pub fn workload_queue() -> (WorkloadSender, mpsc::UnboundedReceiver<Workload>) {
    mpsc::unbounded_channel()
}

/// Arm a workload and hand it to the pool. The Running status is persisted
/// before the workload is enqueued so a concurrent reader never observes a
/// queued-but-Pending session. Re-running a finished workload goes through
/// this same path.
pub async fn submit_workload(
    mut workload: Workload,
    store: &Datastore,
    queue: &WorkloadSender,
) -> anyhow::Result<()> {
    if !can_transition(workload.status, WorkloadStatus::Running) {
        anyhow::bail!(
            "workload {} cannot be armed from status {}",
            workload.id,
            workload.status.as_str()
        );
    }
    workload.status = WorkloadStatus::Running;
    store
        .add_session(&workload)
        .await
        .context("persisting armed workload")?;
    queue
        .send(workload)
        .map_err(|_| anyhow::anyhow!("workload queue is closed"))?;
    Ok(())
}

pub struct WorkerPool {
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Start `count` executors sharing one receiver. Each runs an unending
    /// dequeue loop until the channel is closed and drained.
    pub fn spawn(
        count: usize,
        receiver: mpsc::UnboundedReceiver<Workload>,
        registry: Arc<AgentRegistry>,
        router: Arc<ProviderRouter>,
        store: Arc<Datastore>,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = JoinSet::new();
        for worker_id in 0..count {
            let receiver = receiver.clone();
            let registry = registry.clone();
            let router = router.clone();
            let store = store.clone();
            workers.spawn(async move {
                loop {
                    // Hold the receiver lock only for the dequeue itself so a
                    // slow agent step never blocks the other executors.
                    let next = { receiver.lock().await.recv().await };
                    let Some(workload) = next else { break };
                    process_workload(worker_id, workload, &registry, &router, &store).await;
                }
                debug!(worker_id, "worker shutting down");
            });
        }
        Self { workers }
    }

    /// Wait for every executor to finish its current item and exit. Call
    /// after dropping all queue senders.
    pub async fn join(mut self) {
        while self.workers.join_next().await.is_some() {}
        info!("worker pool drained");
    }
}

async fn process_workload(
    worker_id: usize,
    mut workload: Workload,
    registry: &AgentRegistry,
    router: &ProviderRouter,
    store: &Datastore,
) {
    info!(
        worker_id,
        workload_id = %workload.id,
        agent_type = %workload.agent_type,
        "processing workload"
    );

    // Detected before any state change: drop without persisting so the
    // stored status is left exactly as the submitter wrote it.
    let agent = match registry.resolve(&workload.agent_type) {
        Ok(agent) => agent,
        Err(err) => {
            warn!(worker_id, workload_id = %workload.id, error = %err, "dropping workload");
            return;
        }
    };

    let snapshot = router.snapshot().await;
    let payload_before = workload.payload.clone();

    match agent.do_work(&mut workload, &snapshot).await {
        Ok(()) => {
            workload.status = WorkloadStatus::Completed;
        }
        Err(err) => {
            error!(worker_id, workload_id = %workload.id, error = %err, "agent step failed");
            // Failed workloads keep their pre-run payload, and the status is
            // still persisted so the session is not stuck Running forever.
            workload.payload = payload_before;
            workload.status = WorkloadStatus::Failed;
        }
    }

    if let Err(err) = store.add_session(&workload).await {
        error!(
            worker_id,
            workload_id = %workload.id,
            error = %err,
            "failed to persist workload outcome"
        );
    }
}
