//! Task payloads exchanged with the delivery queue.
//!
//! Each task maps to exactly one handler and one lane: pulls ride the
//! default lane, verify and expire ride the low lane, and the critical
//! lane is reserved for operator-driven work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Critical,
    Default,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    Pull {
        source_id: Uuid,
        tenant_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    },
    Verify {
        job_id: Uuid,
    },
    Expire {
        tenant_id: Uuid,
        retention_days: u32,
    },
}

impl Task {
    pub fn lane(&self) -> Lane {
        match self {
            Task::Pull { .. } => Lane::Default,
            Task::Verify { .. } | Task::Expire { .. } => Lane::Low,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Pull { .. } => "log:pull",
            Task::Verify { .. } => "log:verify",
            Task::Expire { .. } => "log:expire",
        }
    }
}
