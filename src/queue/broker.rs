//! TaskBroker distributes tasks from the scheduler and processors to the
//! worker pools.
//!
//! Flow:
//! 1. Caller invokes `broker.enqueue(task)`.
//! 2. Broker persists the task to [`FjallQueue`] and obtains its sequence.
//! 3. Broker sends a `TaskEnvelope { seq, task }` to a worker channel,
//!    round-robin within the lane's pool (pulls to the pull pool,
//!    verify/expire to the maintenance pool).
//!
//! Bounded channels provide backpressure; a closed channel is logged but
//! does not fail the enqueue, since the task is already durable.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::store::{FjallQueue, Result};
use super::task::{Lane, Task};

/// A task paired with its durable sequence number.
#[derive(Clone, Debug)]
pub struct TaskEnvelope {
    pub seq: u64,
    pub task: Task,
}

/// Enqueue capability handed to the scheduler and processors. The
/// delivery queue behind it is assumed to be at-least-once.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: Task) -> Result<u64>;
}

pub struct TaskBroker {
    queue: Arc<FjallQueue>,
    pull_channels: Vec<mpsc::Sender<TaskEnvelope>>,
    maintenance_channels: Vec<mpsc::Sender<TaskEnvelope>>,
    next_pull: AtomicUsize,
    next_maintenance: AtomicUsize,
}

impl TaskBroker {
    /// Returns the broker plus the receiver ends for both worker pools.
    pub fn new(
        queue: Arc<FjallQueue>,
        pull_workers: usize,
        maintenance_workers: usize,
        channel_size: usize,
    ) -> (
        Self,
        Vec<mpsc::Receiver<TaskEnvelope>>,
        Vec<mpsc::Receiver<TaskEnvelope>>,
    ) {
        info!(
            pull_workers,
            maintenance_workers, channel_size, "creating task broker"
        );

        let mut pull_channels = Vec::with_capacity(pull_workers);
        let mut pull_receivers = Vec::with_capacity(pull_workers);
        for _ in 0..pull_workers {
            let (tx, rx) = mpsc::channel(channel_size);
            pull_channels.push(tx);
            pull_receivers.push(rx);
        }

        let mut maintenance_channels = Vec::with_capacity(maintenance_workers);
        let mut maintenance_receivers = Vec::with_capacity(maintenance_workers);
        for _ in 0..maintenance_workers {
            let (tx, rx) = mpsc::channel(channel_size);
            maintenance_channels.push(tx);
            maintenance_receivers.push(rx);
        }

        let broker = Self {
            queue,
            pull_channels,
            maintenance_channels,
            next_pull: AtomicUsize::new(0),
            next_maintenance: AtomicUsize::new(0),
        };

        (broker, pull_receivers, maintenance_receivers)
    }

    fn route(&self, lane: Lane) -> (&[mpsc::Sender<TaskEnvelope>], usize) {
        match lane {
            Lane::Low => {
                let idx = self.next_maintenance.fetch_add(1, Ordering::Relaxed);
                (&self.maintenance_channels, idx)
            }
            Lane::Critical | Lane::Default => {
                let idx = self.next_pull.fetch_add(1, Ordering::Relaxed);
                (&self.pull_channels, idx)
            }
        }
    }
}

#[async_trait]
impl TaskQueue for TaskBroker {
    async fn enqueue(&self, task: Task) -> Result<u64> {
        let seq = self.queue.enqueue(&task)?;

        let lane = task.lane();
        let envelope = TaskEnvelope { seq, task };
        let (channels, idx) = self.route(lane);
        let worker_idx = idx % channels.len();

        // Bounded send: blocks when the worker is saturated (backpressure).
        match channels[worker_idx].send(envelope).await {
            Ok(()) => debug!(seq, ?lane, worker_idx, "task dispatched"),
            Err(_) => {
                // Worker is gone; the task is durable in the queue store.
                warn!(seq, ?lane, worker_idx, "worker channel closed, task not delivered");
            }
        }

        Ok(seq)
    }
}
