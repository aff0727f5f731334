//! # FrameWorks observability daemon
//!
//! Runs the four drivers of the observability core in one process:
//!
//! - the **consumer driver**, fed by the `POST /v1/events` ingest endpoint,
//!   validating and routing telemetry into ClickHouse and Postgres;
//! - the **lookout driver**, fed by the `POST /v1/incidents` endpoint,
//!   feeding incident-bus messages into the investigation workflow;
//! - the **heartbeat driver**, sweeping eligible tenants and dispatching
//!   LLM-backed investigations;
//! - the **infra driver**, sweeping clusters and nodes and mailing
//!   deduplicated operator alerts.
//!
//! External collaborators (tenant registry, billing, stream and cluster
//! directories, orchestrator, SMTP) are wired here behind the core's ports.

/// Daemon configuration
pub mod config;

/// Read-only Postgres adapters for the directory ports
pub mod directory;

/// Ingest HTTP surface
pub mod http;

/// LLM orchestrator adapter
pub mod llm;

/// SMTP mailer
pub mod mailer;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use frameworks_core::agent::investigation::InvestigationWorkflow;
use frameworks_core::agent::lookout::LookoutTrigger;
use frameworks_core::agent::notify::EmailReportNotifier;
use frameworks_core::agent::{HeartbeatAgent, HeartbeatDeps};
use frameworks_core::clock::SystemClock;
use frameworks_core::database::infrastructure::clickhouse::ClickhouseStore;
use frameworks_core::database::infrastructure::postgres::{
    self, PostgresAggregateStore, PostgresReportStore,
};
use frameworks_core::infra::InfraMonitor;
use frameworks_core::ingest::IngestRouter;
use frameworks_core::runtime::{self, ChannelSource, IncidentChannelSource};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use directory::PostgresDirectory;
use llm::HttpOrchestrator;
use mailer::SmtpMailer;

/// Command line arguments for the observability daemon
#[derive(Parser, Debug)]
#[command(name = "frameworks-server")]
#[command(about = "Telemetry ingest and triage daemon for the FrameWorks control plane")]
struct Args {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(host) = args.host {
        config.server_host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frameworks_server=debug,frameworks_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("daemon configuration loaded");

    // OLTP store.
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await?;
    if let Err(e) = postgres::initialize_schema(&pool).await {
        warn!(error = %e, "OLTP schema initialization failed");
    }

    // OLAP store.
    let olap = Arc::new(ClickhouseStore::connect(
        &config.clickhouse_url,
        &config.clickhouse_database,
        &config.clickhouse_user,
        &config.clickhouse_password,
    ));
    if let Err(e) = olap.initialize_schema().await {
        warn!(error = %e, "OLAP schema initialization failed");
    }

    let clock = Arc::new(SystemClock);
    let aggregates = Arc::new(PostgresAggregateStore::new(pool.clone()));
    let reports = Arc::new(PostgresReportStore::new(pool.clone()));
    let directory = Arc::new(PostgresDirectory::new(pool.clone()));
    let mailer = Arc::new(SmtpMailer::new(
        &config.smtp_host,
        config.smtp_username.clone(),
        config.smtp_password.clone(),
        config.smtp_from.clone(),
    )?);
    let orchestrator = Arc::new(HttpOrchestrator::new(
        config.llm_endpoint.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));

    let cancel = CancellationToken::new();

    // Ingest pipeline: HTTP endpoint -> channel -> consumer driver.
    let router = Arc::new(IngestRouter::new(olap.clone(), aggregates.clone()));
    let (ingest_tx, source) = ChannelSource::new(config.ingest_buffer);
    let consumer = tokio::spawn(runtime::run_consumer(source, router, cancel.clone()));

    // Heartbeat agent.
    let notifier = Arc::new(EmailReportNotifier::new(directory.clone(), mailer.clone()));
    let investigation = InvestigationWorkflow::new(
        orchestrator.clone(),
        reports.clone(),
        notifier.clone(),
        olap.clone(),
        clock.clone(),
    );
    let agent = Arc::new(HeartbeatAgent::new(
        config.heartbeat_config(),
        HeartbeatDeps {
            tenants: directory.clone(),
            billing: directory.clone(),
            streams: directory.clone(),
            analytics: olap.clone(),
            orchestrator: orchestrator.clone(),
            olap: olap.clone(),
            reports: reports.clone(),
            clock: clock.clone(),
        },
        investigation,
    ));
    let heartbeat = runtime::spawn_heartbeat(agent, cancel.clone());

    // Lookout trigger: incident endpoint -> channel -> lookout driver.
    let lookout_trigger = Arc::new(LookoutTrigger::new(
        config.lookout_config(),
        directory.clone(),
        directory.clone(),
        olap.clone(),
        InvestigationWorkflow::new(
            orchestrator,
            reports,
            notifier,
            olap.clone(),
            clock.clone(),
        ),
    ));
    let (incident_tx, incident_source) = IncidentChannelSource::new(config.ingest_buffer);
    let lookout = tokio::spawn(runtime::run_lookout(
        incident_source,
        lookout_trigger,
        cancel.clone(),
    ));

    // Infrastructure monitor.
    let monitor = Arc::new(InfraMonitor::new(
        config.infra_config(),
        directory.clone(),
        directory.clone(),
        olap.clone(),
        mailer,
        clock,
    ));
    let infra = runtime::spawn_infra_monitor(
        monitor,
        std::time::Duration::from_secs(config.infra_tick_secs),
        cancel.clone(),
    );

    // Ingest surface.
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "ingest endpoint listening");

    let app = http::app(ingest_tx, incident_tx);
    let shutdown = cancel.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "ingest server exited with error");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining drivers");
    cancel.cancel();

    let _ = tokio::join!(consumer, lookout, heartbeat, infra, server);
    info!("daemon stopped");
    Ok(())
}
