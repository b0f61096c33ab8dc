mod cli;
mod config;
mod core;
mod graph;
mod logging;
mod mail;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::cli::Controller;
use crate::config::Config;
use crate::core::agents::{
    AgentRegistry, ChatAgent, PriceWatchAgent, RelationshipAgent, ShoppingAgent,
};
use crate::core::pool::{WorkerPool, workload_queue};
use crate::core::router::ProviderRouter;
use crate::graph::{GraphWriter, Neo4jHttpWriter, UnconfiguredGraph};
use crate::storage::{Datastore, PriceStore};

struct Args {
    config_path: PathBuf,
    workers: Option<usize>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: PathBuf::from("drover.toml"),
        workers: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                args.config_path = PathBuf::from(value);
            }
            "--workers" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--workers requires a number"))?;
                args.workers = Some(value.parse()?);
            }
            other => anyhow::bail!("unknown argument '{other}'"),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = parse_args()?;
    let config = Config::load(&args.config_path)?;
    let workers = args.workers.unwrap_or(config.workers);

    let store = Arc::new(Datastore::open(&config.db_path)?);
    let prices = Arc::new(PriceStore::open(&config.price_db_path)?);

    let router = Arc::new(ProviderRouter::new());
    router.initialize(store.list_models().await?).await;

    let graph: Arc<dyn GraphWriter> = match &config.graph {
        Some(graph_config) => Arc::new(Neo4jHttpWriter::new(graph_config)),
        None => Arc::new(UnconfiguredGraph),
    };

    let mut registry = AgentRegistry::new();
    registry.register("chat", Arc::new(ChatAgent));
    registry.register("shopping", Arc::new(ShoppingAgent::new(prices.clone())));
    registry.register(
        "shopping-notification",
        Arc::new(PriceWatchAgent::new(prices.clone())),
    );
    registry.register("company-relationship", Arc::new(RelationshipAgent::new(graph)));
    let registry = Arc::new(registry);
    info!(agents = ?registry.tags(), "agent registry ready");

    let (queue_tx, queue_rx) = workload_queue();
    let pool = WorkerPool::spawn(workers, queue_rx, registry, router.clone(), store.clone());
    info!(workers, "worker pool started");

    let controller = Controller::new(store, router, queue_tx).await?;
    tokio::select! {
        result = controller.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // Both select arms leave the queue's send side dropped; wait for the
    // executors to finish their current items.
    pool.join().await;
    Ok(())
}
