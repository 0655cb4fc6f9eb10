use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::QueueError;
use crate::models::{NewQueueItem, QueueItem, QueueItemRow, QueueStats, QueueStatus};

/// Default row cap for status listings.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Default retention window for terminal items, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// The posting queue. Sole reader/mutator of the queue table; owns the
/// status-transition rules and the JSON encode/decode boundary.
///
/// Construct one per process and pass it by reference.
#[derive(Clone)]
pub struct Queue {
    pool: SqlitePool,
}

impl Queue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a queue item. Items with a future `scheduled_for` start as
    /// `scheduled`, everything else as `pending`. A second active item for
    /// the same job and pipeline is rejected.
    pub async fn enqueue(&self, new: NewQueueItem) -> Result<QueueItem, QueueError> {
        let now = Utc::now();
        let status = match new.scheduled_for {
            Some(at) if at > now => QueueStatus::Scheduled,
            _ => QueueStatus::Pending,
        };
        let portals = serde_json::to_string(&new.target_portals)?;

        let row = db::queue::insert(
            &self.pool,
            Uuid::now_v7(),
            &new.job_id,
            new.pipeline,
            status,
            &portals,
            new.priority,
            new.scheduled_for,
            now,
        )
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                QueueError::Duplicate {
                    job_id: new.job_id.clone(),
                    pipeline: new.pipeline,
                }
            }
            _ => QueueError::Database(e),
        })?;

        tracing::debug!(
            "Enqueued {} item {} for job {} ({})",
            row.pipeline,
            row.id,
            row.job_id,
            row.status
        );

        decode(row)
    }

    /// Generic status mutator. `failed` increments `attempts` by exactly one
    /// and stamps `last_attempt_at`; `processing` stamps `last_attempt_at`
    /// without touching `attempts`. Diagnostic payloads are persisted only
    /// when provided.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: QueueStatus,
        result_data: Option<&serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<QueueItem, QueueError> {
        let encoded = result_data.map(serde_json::to_string).transpose()?;

        let row = db::queue::update_status(
            &self.pool,
            id,
            status,
            encoded.as_deref(),
            error_message,
            Utc::now(),
        )
        .await?
        .ok_or(QueueError::NotFound(id))?;

        decode(row)
    }

    /// Atomically claim the next eligible item and flip it to `processing`.
    /// Due `scheduled` items take precedence over `pending` items regardless
    /// of priority. Returns `None` when the queue has no eligible work.
    pub async fn claim_next(&self) -> Result<Option<QueueItem>, QueueError> {
        match db::queue::claim_next(&self.pool, Utc::now()).await? {
            Some(row) => decode(row).map(Some),
            None => Ok(None),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<QueueItem>, QueueError> {
        match db::queue::find_by_id(&self.pool, id).await? {
            Some(row) => decode(row).map(Some),
            None => Ok(None),
        }
    }

    pub async fn for_job(&self, job_id: &str) -> Result<Vec<QueueItem>, QueueError> {
        let rows = db::queue::list_by_job(&self.pool, job_id).await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn by_status(
        &self,
        status: QueueStatus,
        limit: Option<i64>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let rows =
            db::queue::list_by_status(&self.pool, status, limit.unwrap_or(DEFAULT_LIST_LIMIT))
                .await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn set_priority(&self, id: Uuid, priority: i64) -> Result<QueueItem, QueueError> {
        let row = db::queue::set_priority(&self.pool, id, priority, Utc::now())
            .await?
            .ok_or(QueueError::NotFound(id))?;
        decode(row)
    }

    /// Move an item to a new slot, recomputing status the same way `enqueue`
    /// does: `scheduled` for a future slot, `pending` otherwise.
    pub async fn reschedule(
        &self,
        id: Uuid,
        scheduled_for: Option<chrono::DateTime<Utc>>,
    ) -> Result<QueueItem, QueueError> {
        let now = Utc::now();
        let status = match scheduled_for {
            Some(at) if at > now => QueueStatus::Scheduled,
            _ => QueueStatus::Pending,
        };

        let row = db::queue::reschedule(&self.pool, id, scheduled_for, status, now)
            .await?
            .ok_or(QueueError::NotFound(id))?;
        decode(row)
    }

    /// Hard delete. Returns false when the item no longer exists.
    pub async fn remove(&self, id: Uuid) -> Result<bool, QueueError> {
        Ok(db::queue::delete(&self.pool, id).await? > 0)
    }

    /// Delete `completed`/`failed` items last touched more than
    /// `older_than_days` (default 30) ago. Returns the number removed.
    pub async fn cleanup(&self, older_than_days: Option<i64>) -> Result<u64, QueueError> {
        let days = older_than_days.unwrap_or(DEFAULT_RETENTION_DAYS);
        let cutoff = Utc::now() - Duration::days(days);
        let removed = db::queue::delete_terminal_before(&self.pool, cutoff).await?;
        if removed > 0 {
            tracing::info!("Queue cleanup removed {removed} items older than {days} days");
        }
        Ok(removed)
    }

    /// Does the job have a queue item in any of the given statuses?
    /// Defaults to the active set (`pending`, `scheduled`, `processing`).
    pub async fn has_active(
        &self,
        job_id: &str,
        statuses: Option<&[QueueStatus]>,
    ) -> Result<bool, QueueError> {
        let statuses = statuses.unwrap_or(&QueueStatus::ACTIVE);
        Ok(db::queue::exists_for_job(&self.pool, job_id, statuses).await?)
    }

    /// Promote every `scheduled` item whose slot has arrived to `pending`.
    /// This sweep is the only path that advances scheduled work; it must be
    /// driven periodically (see the worker's maintenance loop).
    pub async fn release_due(&self) -> Result<u64, QueueError> {
        let moved = db::queue::release_due(&self.pool, Utc::now()).await?;
        if moved > 0 {
            tracing::debug!("Released {moved} scheduled items to pending");
        }
        Ok(moved)
    }

    /// Return `processing` items stuck longer than `max_age` to `pending`,
    /// so a crashed worker cannot strand work forever.
    pub async fn requeue_stale(&self, max_age: Duration) -> Result<u64, QueueError> {
        let now = Utc::now();
        let requeued = db::queue::requeue_stale(&self.pool, now - max_age, now).await?;
        if requeued > 0 {
            tracing::warn!("Requeued {requeued} stale processing items");
        }
        Ok(requeued)
    }

    /// Per-status counts; every status is present even at zero.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut stats = QueueStats::default();
        for (status, count) in db::queue::count_by_status(&self.pool).await? {
            *stats.count_mut(status) = count as u64;
        }
        Ok(stats)
    }
}

fn decode(row: QueueItemRow) -> Result<QueueItem, QueueError> {
    QueueItem::try_from(row).map_err(QueueError::from)
}
