//! HTTP server command implementation.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use polly::config::{Config, JobSettings};
use polly::leader::{LeaderElection, LeaderGate};
use polly::mail::{HttpMailSender, LogMailSender, MailDispatchJob, MailSender, MailService};
use polly::scheduler::{Job, JobScheduler, LeaderGated};
use polly::search::{HttpSearchIndex, IndexDocuments, IndexSyncJob, StalePurgeJob};
use polly::server;
use polly::storage::StorageService;
use polly::store::sql::SqlGenericStore;

use super::{Overrides, load_config, open_database};

pub async fn run(config_path: &str, overrides: Overrides) -> Result<()> {
    let config = load_config(config_path, overrides).await?;

    let pool = open_database(&config.database)
        .await
        .context("Failed to open database")?;
    let storage = StorageService::new(Arc::new(SqlGenericStore::new(pool.clone())));

    let sender: Arc<dyn MailSender> = match config.mail.gateway_url.as_deref() {
        Some(url) => Arc::new(HttpMailSender::new(
            url,
            config.mail.token.clone(),
            config.mail.timeout(),
        )?),
        None => {
            warn!("No mail gateway configured, mails will only be logged");
            Arc::new(LogMailSender)
        }
    };
    let mail = MailService::new(storage.clone(), sender);

    let leader = LeaderElection::new(
        config.leader.elector_url.as_deref(),
        config.leader.resolved_hostname(),
        config.leader.timeout(),
    )?;
    info!(
        hostname = leader.hostname(),
        elector = config.leader.elector_url.as_deref().unwrap_or("none"),
        "Leader election configured"
    );
    let gate: Arc<dyn LeaderGate> = Arc::new(leader);

    let scheduler = JobScheduler::new();
    start_jobs(&scheduler, &config, &storage, &mail, &gate)?;

    // Create shutdown channel for HTTP-triggered shutdown
    let (shutdown_tx, shutdown_rx) = server::shutdown_channel();

    let state = server::AppState {
        storage: storage.clone(),
        mail,
        documents: IndexDocuments::new(storage),
        admin_token: config.server.admin_token.clone(),
        api_token: config.server.api_token.clone(),
        max_concurrent_requests: config.server.max_concurrent_requests.max(1),
        max_body_bytes: config.server.max_body_bytes,
        shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    let app = server::build_app(state, config.server.request_timeout());

    let ip: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, "Starting server");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_rx))
    .await?;

    // Let a running tick finish before the pool goes away
    scheduler.shutdown().await;
    pool.close().await;

    info!("Server stopped");
    Ok(())
}

/// Stop a running server by calling the shutdown endpoint.
pub async fn stop(config_path: &str, port_override: Option<u16>) -> Result<()> {
    let config = Config::load(config_path).await?;
    let port = port_override.unwrap_or(config.server.port);

    let client = reqwest::Client::new();
    let mut request = client.post(format!("http://127.0.0.1:{port}/api/admin/v1/shutdown"));
    if let Some(token) = &config.server.admin_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("No server running on port {port}"))?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to stop server: HTTP {}", response.status());
    }

    println!("Shutdown initiated for server on port {port}");
    Ok(())
}

fn start_jobs(
    scheduler: &JobScheduler,
    config: &Config,
    storage: &StorageService,
    mail: &MailService,
    gate: &Arc<dyn LeaderGate>,
) -> Result<()> {
    schedule(
        scheduler,
        MailDispatchJob::new(mail.clone()),
        config.jobs.mail_dispatch(),
        gate,
    )?;

    match config.search.url.as_deref() {
        Some(url) => {
            let index = Arc::new(HttpSearchIndex::new(url, config.search.timeout())?);
            schedule(
                scheduler,
                IndexSyncJob::new(storage.clone(), index),
                config.jobs.index_sync(),
                gate,
            )?;
        }
        None => info!("No search index configured, index sync disabled"),
    }

    schedule(
        scheduler,
        StalePurgeJob::new(storage.clone(), config.search.retention()),
        config.jobs.stale_purge(),
        gate,
    )?;

    info!(jobs = scheduler.job_count(), "Scheduler started");
    Ok(())
}

fn schedule<J: Job + 'static>(
    scheduler: &JobScheduler,
    job: J,
    settings: JobSettings,
    gate: &Arc<dyn LeaderGate>,
) -> Result<()> {
    if !settings.enabled {
        info!(job = job.name(), "Job disabled");
        return Ok(());
    }

    let timing = settings
        .timing()
        .with_context(|| format!("Invalid timing for job '{}'", job.name()))?;
    let job: Arc<dyn Job> = if settings.leader_only {
        Arc::new(LeaderGated::new(job, gate.clone()))
    } else {
        Arc::new(job)
    };
    scheduler.spawn(job, timing);
    Ok(())
}

async fn shutdown_signal(http_shutdown: tokio::sync::oneshot::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
        _ = http_shutdown => info!("Received shutdown request via HTTP, shutting down..."),
    }
}
