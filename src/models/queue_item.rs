use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a queue item. Items are only ever created as `pending` or
/// `scheduled`; the remaining states are reached through status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Scheduled,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 5] = [
        QueueStatus::Pending,
        QueueStatus::Scheduled,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
    ];

    /// Statuses counted as "active" for duplicate-enqueue purposes.
    pub const ACTIVE: [QueueStatus; 3] = [
        QueueStatus::Pending,
        QueueStatus::Scheduled,
        QueueStatus::Processing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Scheduled => "scheduled",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical grouping of queue items by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    /// Multi-portal job publishing (Indeed, Google Jobs, ...).
    JobPortals,
    /// Social network posting for a job opening.
    SocialMedia,
    /// Delayed rejection email for an application.
    RejectionEmail,
}

impl Pipeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pipeline::JobPortals => "job_portals",
            Pipeline::SocialMedia => "social_media",
            Pipeline::RejectionEmail => "rejection_email",
        }
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of deferred work tied to a job-like entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub job_id: String,
    pub pipeline: Pipeline,
    pub status: QueueStatus,
    pub target_portals: Vec<String>,
    pub priority: i64,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub attempts: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row shape as stored: `target_portals` and `result_data` are JSON text.
/// `TryFrom` below is the only place that text is decoded.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueItemRow {
    pub id: Uuid,
    pub job_id: String,
    pub pipeline: Pipeline,
    pub status: QueueStatus,
    pub target_portals: String,
    pub priority: i64,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub attempts: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<QueueItemRow> for QueueItem {
    type Error = serde_json::Error;

    fn try_from(row: QueueItemRow) -> Result<Self, Self::Error> {
        let target_portals: Vec<String> = serde_json::from_str(&row.target_portals)?;
        let result_data = row
            .result_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(QueueItem {
            id: row.id,
            job_id: row.job_id,
            pipeline: row.pipeline,
            status: row.status,
            target_portals,
            priority: row.priority,
            scheduled_for: row.scheduled_for,
            attempts: row.attempts,
            last_attempt_at: row.last_attempt_at,
            error_message: row.error_message,
            result_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Parameters for enqueueing a new item.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub job_id: String,
    pub pipeline: Pipeline,
    pub target_portals: Vec<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: i64,
}

impl NewQueueItem {
    pub fn new(job_id: impl Into<String>, pipeline: Pipeline, target_portals: Vec<String>) -> Self {
        Self {
            job_id: job_id.into(),
            pipeline,
            target_portals,
            scheduled_for: None,
            priority: 0,
        }
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// Per-status row counts. Every status is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub scheduled: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.scheduled + self.processing + self.completed + self.failed
    }

    pub fn count(&self, status: QueueStatus) -> u64 {
        match status {
            QueueStatus::Pending => self.pending,
            QueueStatus::Scheduled => self.scheduled,
            QueueStatus::Processing => self.processing,
            QueueStatus::Completed => self.completed,
            QueueStatus::Failed => self.failed,
        }
    }

    pub fn count_mut(&mut self, status: QueueStatus) -> &mut u64 {
        match status {
            QueueStatus::Pending => &mut self.pending,
            QueueStatus::Scheduled => &mut self.scheduled,
            QueueStatus::Processing => &mut self.processing,
            QueueStatus::Completed => &mut self.completed,
            QueueStatus::Failed => &mut self.failed,
        }
    }
}
