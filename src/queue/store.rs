//! Fjall-persisted task queue with a dead-letter partition.
//!
//! Layout:
//! - `tasks` partition: u64 (big-endian) -> Task (JSON)
//! - `metadata` partition: "next_seq" -> u64 counter
//! - `dlq` partition: u64 (big-endian) -> DeadLetter (JSON)
//!
//! Tasks are persisted before they are handed to workers, so a worker
//! crash never loses an accepted task.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::task::Task;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task not found: seq={0}")]
    TaskNotFound(u64),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Task that exhausted processing, parked for operator inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub task: Task,
    pub failure_code: String,
    pub failure_message: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

pub struct FjallQueue {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    metadata: PartitionHandle,
    dlq: PartitionHandle,
    seq_counter: Arc<AtomicU64>,
}

impl FjallQueue {
    /// Open or create a queue at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("opening task queue at: {}", path.as_ref().display());

        let keyspace = Config::new(path).open()?;

        let tasks = keyspace.open_partition("tasks", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;
        let dlq = keyspace.open_partition("dlq", PartitionCreateOptions::default())?;

        let current_seq = metadata
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        Ok(Self {
            keyspace,
            tasks,
            metadata,
            dlq,
            seq_counter: Arc::new(AtomicU64::new(current_seq)),
        })
    }

    /// Persist a task and return its sequence number.
    pub fn enqueue(&self, task: &Task) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);

        let value = serde_json::to_vec(task)?;
        self.tasks.insert(seq.to_be_bytes(), value)?;

        // Persist the counter for crash recovery.
        self.metadata
            .insert(b"next_seq", (seq + 1).to_be_bytes())?;

        debug!(seq, kind = task.kind(), "task persisted");
        Ok(seq)
    }

    pub fn get_task(&self, seq: u64) -> Result<Option<Task>> {
        match self.tasks.get(seq.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Park a task in the dead-letter partition after processing exhaustion.
    pub fn move_to_dlq(
        &self,
        seq: u64,
        failure_code: impl Into<String>,
        failure_message: impl Into<String>,
        attempts: u32,
    ) -> Result<()> {
        let task = self.get_task(seq)?.ok_or(QueueError::TaskNotFound(seq))?;

        let entry = DeadLetter {
            task,
            failure_code: failure_code.into(),
            failure_message: failure_message.into(),
            attempts,
            failed_at: Utc::now(),
        };

        self.dlq
            .insert(seq.to_be_bytes(), serde_json::to_vec(&entry)?)?;
        info!(seq, attempts, "task moved to dead-letter queue");
        Ok(())
    }

    pub fn get_dead_letter(&self, seq: u64) -> Result<Option<DeadLetter>> {
        match self.dlq.get(seq.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::SeqCst)
    }

    /// Flush all writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn verify_task() -> Task {
        Task::Verify {
            job_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_enqueue_and_retrieve() {
        let temp_dir = TempDir::new().unwrap();
        let queue = FjallQueue::open(temp_dir.path()).unwrap();

        let task = verify_task();
        let seq = queue.enqueue(&task).unwrap();
        assert_eq!(seq, 0);

        let retrieved = queue.get_task(seq).unwrap().unwrap();
        assert_eq!(retrieved.kind(), "log:verify");
    }

    #[test]
    fn test_sequential_ids_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let queue = FjallQueue::open(temp_dir.path()).unwrap();
            assert_eq!(queue.enqueue(&verify_task()).unwrap(), 0);
            assert_eq!(queue.enqueue(&verify_task()).unwrap(), 1);
        }

        let queue = FjallQueue::open(temp_dir.path()).unwrap();
        assert_eq!(queue.current_seq(), 2);
        assert_eq!(queue.enqueue(&verify_task()).unwrap(), 2);
        assert!(queue.get_task(0).unwrap().is_some());
    }

    #[test]
    fn test_move_to_dlq() {
        let temp_dir = TempDir::new().unwrap();
        let queue = FjallQueue::open(temp_dir.path()).unwrap();

        let seq = queue.enqueue(&verify_task()).unwrap();
        queue
            .move_to_dlq(seq, "STORAGE_ERROR", "provider unavailable", 3)
            .unwrap();

        let parked = queue.get_dead_letter(seq).unwrap().unwrap();
        assert_eq!(parked.failure_code, "STORAGE_ERROR");
        assert_eq!(parked.attempts, 3);

        let missing = queue.move_to_dlq(999, "X", "Y", 1);
        assert!(matches!(missing, Err(QueueError::TaskNotFound(999))));
    }
}
