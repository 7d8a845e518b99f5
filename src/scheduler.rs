//! Periodic control loop dispatching pull and expire tasks.
//!
//! Each tick runs two independent sweeps: due sources get a pull task for
//! a trailing window, and every tenant gets an expire task carrying its
//! retention period. The tick itself never blocks on task completion, and
//! per-item enqueue failures never stop a sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::{SchedulerConfig, UpstreamConfig};
use crate::ledger::LedgerStore;
use crate::queue::{Task, TaskQueue};

pub struct SourceScheduler {
    ledger: Arc<LedgerStore>,
    queue: Arc<dyn TaskQueue>,
    tick_interval: Duration,
    max_window: chrono::Duration,
    min_delay: chrono::Duration,
}

impl SourceScheduler {
    pub fn new(
        ledger: Arc<LedgerStore>,
        queue: Arc<dyn TaskQueue>,
        scheduler: &SchedulerConfig,
        upstream: &UpstreamConfig,
    ) -> Self {
        Self {
            ledger,
            queue,
            tick_interval: Duration::from_secs(scheduler.tick_secs),
            max_window: chrono::Duration::seconds(upstream.max_window_secs as i64),
            min_delay: chrono::Duration::seconds(upstream.min_delay_secs as i64),
        }
    }

    /// Runs until the shutdown signal flips; stops cleanly between ticks.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_secs = self.tick_interval.as_secs(), "scheduler started");
        let mut ticker = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(Utc::now()).await,
                _ = shutdown.changed() => {
                    info!("scheduler stopping");
                    break;
                }
            }
        }
    }

    /// One scheduling pass. Takes `now` explicitly so sweeps are
    /// reproducible in tests.
    pub async fn tick(&self, now: DateTime<Utc>) {
        self.sweep_due_sources(now).await;
        self.sweep_retention().await;
    }

    async fn sweep_due_sources(&self, now: DateTime<Utc>) {
        let sources = match self.ledger.list_due_sources(now) {
            Ok(sources) => sources,
            Err(e) => {
                error!(error = %e, "scheduler: list due sources");
                return;
            }
        };

        for source in sources {
            // Trailing window ending one availability-delay before now,
            // sized to the upstream's maximum.
            let period_end = now - self.min_delay;
            let period_start = period_end - self.max_window;

            let task = Task::Pull {
                source_id: source.id,
                tenant_id: source.tenant_id,
                period_start,
                period_end,
            };
            if let Err(e) = self.queue.enqueue(task).await {
                error!(source_id = %source.id, error = %e, "scheduler: enqueue pull task");
                continue;
            }
            debug!(source_id = %source.id, %period_start, %period_end, "pull scheduled");
        }
    }

    async fn sweep_retention(&self) {
        let tenants = match self.ledger.list_tenants() {
            Ok(tenants) => tenants,
            Err(e) => {
                error!(error = %e, "scheduler: list tenants");
                return;
            }
        };

        for tenant in tenants {
            let task = Task::Expire {
                tenant_id: tenant.id,
                retention_days: tenant.retention_days,
            };
            if let Err(e) = self.queue.enqueue(task).await {
                error!(tenant_id = %tenant.id, error = %e, "scheduler: enqueue expire task");
            }
        }
    }
}
