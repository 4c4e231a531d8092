use anyhow::{Context, Result};
use clap::Parser;
use loqa_calls::model::ChatModel;
use loqa_calls::nats::{forward_silence_prompts, run_bridge};
use loqa_calls::notify::Notifier;
use loqa_calls::{
    create_router, AppState, CallOrchestrator, Config, LogNotifier, MemoryAuditStore,
    MemoryCalendar, NatsClient, OfflineModel,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loqa-calls", version, about = "Real-time phone call orchestration")]
struct Args {
    /// Config file path (without extension)
    #[arg(long, default_value = "config/loqa-calls")]
    config: String,

    /// Serve the HTTP API only; no NATS connection
    #[arg(long)]
    http_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let cfg = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Could not load config {}: {:#}; using defaults", args.config, e);
            Config::default()
        }
    };

    info!("Loqa Calls v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let nats = if args.http_only {
        info!("HTTP-only mode: replies and prompts are logged, model calls degrade");
        None
    } else {
        Some(NatsClient::connect(&cfg.nats).await?)
    };

    let (model, notifier): (Arc<dyn ChatModel>, Arc<dyn Notifier>) = match &nats {
        Some(client) => (Arc::new(client.chat_model()), Arc::new(client.notifier())),
        None => (Arc::new(OfflineModel), Arc::new(LogNotifier)),
    };

    let (orchestrator, turn_events) = CallOrchestrator::new(
        &cfg,
        Arc::new(MemoryCalendar::new()),
        model,
        Arc::new(MemoryAuditStore::new()),
        notifier,
    );
    let orchestrator = Arc::new(orchestrator);

    orchestrator.spawn_background_tasks();
    tokio::spawn(forward_silence_prompts(
        orchestrator.clone(),
        turn_events,
        nats.clone(),
    ));

    if let Some(client) = nats {
        let bridge = orchestrator.clone();
        tokio::spawn(async move {
            if let Err(e) = run_bridge(bridge, client).await {
                error!("Call event bridge stopped: {:#}", e);
            }
        });
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(AppState::new(orchestrator))).await?;

    Ok(())
}
