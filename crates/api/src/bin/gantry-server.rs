//! The Gantry server: ingress, engine, and scheduler in one process.

use std::sync::Arc;
use std::time::Duration;

use gantry_api::{router, AppState, ServerConfig, WebhookSecrets};
use gantry_engine::Engine;
use gantry_events::{EventBus, MemoryEventStore};
use gantry_queue::{JobQueue, LaneMap};
use gantry_scheduler::run_scheduler_loop;
use gantry_storage::{
    MemoryExecutionRepository, MemoryScheduledEventRepository, MemoryWorkflowRepository,
};
use gantry_strategy::StrategyRegistry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(bind = %config.bind, "starting gantry-server");

    let store = Arc::new(MemoryEventStore::new());
    let bus = Arc::new(EventBus::new(store));
    let queue = JobQueue::new(LaneMap::builtin());
    let strategies = Arc::new(StrategyRegistry::with_builtins());
    let workflows = Arc::new(MemoryWorkflowRepository::new());
    let executions = Arc::new(MemoryExecutionRepository::new());
    let schedules = Arc::new(MemoryScheduledEventRepository::new());

    let engine = Engine::new(
        queue,
        bus,
        strategies.clone(),
        workflows.clone(),
        executions.clone(),
        config.engine.clone(),
    );
    engine.start();

    let scheduler_cancel = CancellationToken::new();
    tokio::spawn(run_scheduler_loop(
        schedules.clone(),
        engine.clone(),
        Duration::from_millis(config.scheduler_interval_ms),
        scheduler_cancel.clone(),
    ));

    let state = AppState {
        engine: engine.clone(),
        workflows,
        executions,
        schedules,
        strategies,
        webhook_secrets: Arc::new(WebhookSecrets::new()),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    scheduler_cancel.cancel();
    engine.shutdown();
    Ok(())
}
