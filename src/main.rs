//! platform-runtime
//!
//! Process runtime supervisor: sequences startup of the database, background
//! workers, socket transport and HTTP listener, keeps a live health board, and
//! tears everything down in order on SIGINT/SIGTERM.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML) ──▶ RuntimeConfigProvider ◀── file watcher / SIGHUP
//!                            │
//!                            ▼ change feed
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                 HttpLifecycleCoordinator                      │
//!   │                                                               │
//!   │  start: DB warm → DB bootstrap → WorkerManager → HttpServer   │
//!   │         → socket attach → listen → ready → audit              │
//!   │                                                               │
//!   │  stop:  socket → http close → workers → DB drain/shutdown     │
//!   │         → audit → stopped                                     │
//!   └──────────────┬──────────────────────────────┬─────────────────┘
//!                  │ mark_*                       │ record
//!                  ▼                              ▼
//!        RuntimeHealthRegistry              AuditSink
//!        (board + change feed)        (log / JSON lines file)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::Router;
use clap::Parser;

use platform_runtime::admin::{admin_router, AdminState};
use platform_runtime::audit::{AuditSink, JsonLinesAuditSink, TracingAuditSink};
use platform_runtime::config::loader::load_config;
use platform_runtime::config::watcher::{forward_updates, ConfigWatcher};
use platform_runtime::config::{RuntimeConfig, RuntimeConfigProvider};
use platform_runtime::database::PgDatabase;
use platform_runtime::dependencies::search::HttpSearchIndex;
use platform_runtime::error::SupervisorError;
use platform_runtime::health::RuntimeHealthRegistry;
use platform_runtime::http::WebSocketHub;
use platform_runtime::lifecycle::signals::{shutdown_signal, spawn_reload_on_hangup};
use platform_runtime::lifecycle::{
    CoordinatorParts, HttpLifecycleCoordinator, StartOptions, StopOptions,
};
use platform_runtime::observability::{logging, metrics};
use platform_runtime::workers::{
    IntervalWorker, NewsAggregationJob, ProfileEngagementJob, WorkerManager,
    NEWS_AGGREGATION_WORKER, PROFILE_ENGAGEMENT_WORKER,
};

#[derive(Parser)]
#[command(name = "platform-runtime", version)]
#[command(about = "Process runtime supervisor", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "RUNTIME_CONFIG")]
    config: Option<PathBuf>,

    /// Override `http.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => RuntimeConfig::default(),
    };

    if cli.check {
        println!("configuration OK");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "platform-runtime starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Runtime failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: RuntimeConfig) -> Result<(), SupervisorError> {
    let provider = Arc::new(RuntimeConfigProvider::new(config.clone()));

    // Kept alive for the life of the process.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            forward_updates(updates, Arc::clone(&provider));
            spawn_reload_on_hangup(path.clone(), Arc::clone(&provider));
            match watcher.run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Config file watcher unavailable, SIGHUP reload only");
                    None
                }
            }
        }
        None => None,
    };

    let health = Arc::new(RuntimeHealthRegistry::new());

    let workers = Arc::new(
        WorkerManager::builder(Arc::clone(&health))
            .dependency(Arc::new(HttpSearchIndex::new(config.search.clone())))
            .register(
                PROFILE_ENGAGEMENT_WORKER,
                Arc::new(IntervalWorker::new(PROFILE_ENGAGEMENT_WORKER, ProfileEngagementJob::new())),
            )
            .register(
                NEWS_AGGREGATION_WORKER,
                Arc::new(IntervalWorker::new(NEWS_AGGREGATION_WORKER, NewsAggregationJob::new())),
            )
            .telemetry_ttl(config.telemetry.cache_ttl())
            .stop_timeout(config.http.stage_timeout())
            .build(&config.workers)?,
    );
    let _config_listener = workers.spawn_config_listener(provider.on_runtime_config_change());

    let audit: Arc<dyn AuditSink> = match &config.audit.path {
        Some(path) => Arc::new(JsonLinesAuditSink::new(path)),
        None => Arc::new(TracingAuditSink),
    };

    let mut routes = Router::new();
    if let Some(api_key) = &config.admin.api_key {
        routes = routes.merge(admin_router(AdminState {
            health: Arc::clone(&health),
            workers: Arc::clone(&workers),
            api_key: Arc::from(api_key.as_str()),
        }));
    }

    let coordinator = HttpLifecycleCoordinator::new(CoordinatorParts {
        settings: config.http.clone(),
        health,
        workers,
        database: Arc::new(PgDatabase::new(config.database.clone())),
        socket: Arc::new(WebSocketHub::new(config.socket.clone())),
        audit,
        routes,
    });

    let server = coordinator.start(StartOptions { port: cli.port }).await?;
    tracing::info!(port = server.port(), "Accepting traffic");

    let signal = shutdown_signal().await;
    let report = coordinator.stop(StopOptions::new(signal)).await;

    if report.is_clean() {
        tracing::info!("Shutdown complete");
    } else {
        tracing::warn!(failed_stages = ?report.failed_stages(), "Shutdown complete with failed stages");
    }
    Ok(())
}
