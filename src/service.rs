//! Service assembly: wires the ledger, queue, storage providers, worker
//! pools, and scheduler together, and owns graceful shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use logvault::chain::{self, ChainRecord};
use logvault::config::{Config, ProviderConfig, ProviderKind};
use logvault::ledger::LedgerStore;
use logvault::models::JobStatus;
use logvault::observability::Metrics;
use logvault::queue::{FjallQueue, TaskBroker, TaskQueue};
use logvault::scheduler::SourceScheduler;
use logvault::storage::{ArchiveStore, MultiStore, ObjectBackend};
use logvault::upstream::{LogPullClient, LogSource};
use logvault::worker::{self, ExpireProcessor, Processors, PullProcessor, VerifyProcessor};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(config: Config) -> Result<(), AnyError> {
    let ledger = Arc::new(LedgerStore::open(&config.service.ledger_path)?);
    let queue_store = Arc::new(FjallQueue::open(&config.service.queue_path)?);

    let mut backends: Vec<Arc<dyn ObjectBackend>> = Vec::new();
    for provider in &config.storage.providers {
        backends.push(Arc::new(build_backend(
            provider,
            config.storage.retention_grace_days,
        )?));
        info!(provider = %provider.name, "storage provider configured");
    }
    let storage = Arc::new(MultiStore::new(backends));

    let upstream: Arc<dyn LogSource> = Arc::new(LogPullClient::new(&config.upstream)?);

    let (broker, pull_rx, maintenance_rx) = TaskBroker::new(
        queue_store.clone(),
        config.worker.pull_workers,
        config.worker.maintenance_workers,
        config.worker.channel_size,
    );
    let queue: Arc<dyn TaskQueue> = Arc::new(broker);

    let processors = Arc::new(Processors {
        pull: PullProcessor::new(
            ledger.clone(),
            storage.clone(),
            upstream,
            queue.clone(),
        ),
        verify: VerifyProcessor::new(ledger.clone(), storage.clone()),
        expire: ExpireProcessor::new(ledger.clone(), storage),
    });

    let metrics = Arc::new(Metrics::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handles = worker::spawn_workers(
        processors,
        queue_store.clone(),
        metrics.clone(),
        pull_rx,
        maintenance_rx,
        shutdown_rx.clone(),
    );

    let scheduler = SourceScheduler::new(
        ledger.clone(),
        queue,
        &config.scheduler,
        &config.upstream,
    );
    let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    info!("logvault service started");
    shutdown_signal().await;

    // Stop the scheduler between ticks, then let workers drain.
    let _ = shutdown_tx.send(true);
    scheduler_handle.await?;
    for handle in worker_handles {
        handle.await?;
    }

    queue_store.flush()?;
    ledger.persist()?;

    let snapshot = metrics.snapshot();
    info!(
        tasks_completed = snapshot.tasks_completed,
        tasks_failed = snapshot.tasks_failed,
        "logvault service stopped"
    );
    Ok(())
}

/// Recomputes a source's full audit chain from the ledger and reports the
/// first broken link, if any.
pub async fn verify_chain(config: Config, source_id: Uuid) -> Result<(), AnyError> {
    let ledger = LedgerStore::open(&config.service.ledger_path)?;
    let jobs = ledger.list_source_jobs(source_id)?;

    // Expired jobs keep their digests, so the chain stays checkable after
    // content erasure.
    let records: Vec<ChainRecord> = jobs
        .iter()
        .filter(|j| matches!(j.status, JobStatus::Done | JobStatus::Expired))
        .map(|j| ChainRecord {
            job_id: j.id.to_string(),
            sha256: j.sha256.clone(),
            chain_hash: j.chain_hash.clone(),
        })
        .collect();

    match chain::verify_chain(&records) {
        Ok(()) => {
            println!(
                "chain intact: {} links verified for source {}",
                records.len(),
                source_id
            );
            if let Some(last) = records.last() {
                println!("final hash: {}", last.chain_hash);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("chain verification FAILED: {e}");
            Err(e.into())
        }
    }
}

fn build_backend(provider: &ProviderConfig, retention_grace_days: u32) -> Result<ArchiveStore, AnyError> {
    let store: Arc<dyn object_store::ObjectStore> = match provider.kind {
        ProviderKind::Memory => Arc::new(object_store::memory::InMemory::new()),
        ProviderKind::Local => {
            let root = provider
                .root
                .as_ref()
                .ok_or_else(|| format!("provider {}: missing root", provider.name))?;
            std::fs::create_dir_all(root)?;
            Arc::new(object_store::local::LocalFileSystem::new_with_prefix(root)?)
        }
        ProviderKind::S3 => {
            let bucket = provider
                .bucket
                .as_ref()
                .ok_or_else(|| format!("provider {}: missing bucket", provider.name))?;
            let mut builder = object_store::aws::AmazonS3Builder::new()
                .with_bucket_name(bucket.clone())
                .with_region(provider.region.clone().unwrap_or_else(|| "us-east-1".to_string()));
            if let Some(endpoint) = &provider.endpoint {
                builder = builder.with_endpoint(endpoint.clone()).with_allow_http(true);
            }
            if let Some(access_key) = &provider.access_key {
                builder = builder.with_access_key_id(access_key.clone());
            }
            if let Some(secret_key) = &provider.secret_key {
                builder = builder.with_secret_access_key(secret_key.clone());
            }
            Arc::new(builder.build()?)
        }
    };

    Ok(ArchiveStore::new(
        store,
        provider.name.clone(),
        retention_grace_days,
    ))
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
