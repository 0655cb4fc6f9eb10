use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Pipeline, QueueItemRow, QueueStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS queue_items (
    id              TEXT PRIMARY KEY,
    job_id          TEXT NOT NULL,
    pipeline        TEXT NOT NULL,
    status          TEXT NOT NULL,
    target_portals  TEXT NOT NULL DEFAULT '[]',
    priority        INTEGER NOT NULL DEFAULT 0,
    scheduled_for   TEXT,
    attempts        INTEGER NOT NULL DEFAULT 0,
    last_attempt_at TEXT,
    error_message   TEXT,
    result_data     TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_items_status
    ON queue_items (status, priority DESC, created_at);

CREATE INDEX IF NOT EXISTS idx_queue_items_job
    ON queue_items (job_id);

-- At most one active item per job per pipeline.
CREATE UNIQUE INDEX IF NOT EXISTS uniq_queue_items_active
    ON queue_items (job_id, pipeline)
    WHERE status IN ('pending', 'scheduled', 'processing');
";

/// Apply the queue schema. Idempotent; run once at startup.
pub async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    pool: &SqlitePool,
    id: Uuid,
    job_id: &str,
    pipeline: Pipeline,
    status: QueueStatus,
    target_portals: &str,
    priority: i64,
    scheduled_for: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<QueueItemRow, sqlx::Error> {
    sqlx::query_as::<_, QueueItemRow>(
        "INSERT INTO queue_items
             (id, job_id, pipeline, status, target_portals, priority,
              scheduled_for, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(id)
    .bind(job_id)
    .bind(pipeline)
    .bind(status)
    .bind(target_portals)
    .bind(priority)
    .bind(scheduled_for)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<QueueItemRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueItemRow>("SELECT * FROM queue_items WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_job(pool: &SqlitePool, job_id: &str) -> Result<Vec<QueueItemRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueItemRow>(
        "SELECT * FROM queue_items WHERE job_id = ? ORDER BY created_at ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

pub async fn list_by_status(
    pool: &SqlitePool,
    status: QueueStatus,
    limit: i64,
) -> Result<Vec<QueueItemRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueItemRow>(
        "SELECT * FROM queue_items WHERE status = ?
         ORDER BY priority DESC, created_at ASC
         LIMIT ?",
    )
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Atomically claim the next eligible item, flipping it to `processing`.
///
/// Due `scheduled` items always win over `pending` items; within each group
/// the ordering is priority desc, then `scheduled_for` asc / `created_at` asc.
pub async fn claim_next(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Option<QueueItemRow>, sqlx::Error> {
    let due = sqlx::query_as::<_, QueueItemRow>(
        "UPDATE queue_items
         SET status = 'processing', last_attempt_at = ?, updated_at = ?
         WHERE id = (
             SELECT id FROM queue_items
             WHERE status = 'scheduled' AND scheduled_for <= ?
             ORDER BY priority DESC, scheduled_for ASC
             LIMIT 1
         )
         RETURNING *",
    )
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    if due.is_some() {
        return Ok(due);
    }

    sqlx::query_as::<_, QueueItemRow>(
        "UPDATE queue_items
         SET status = 'processing', last_attempt_at = ?, updated_at = ?
         WHERE id = (
             SELECT id FROM queue_items
             WHERE status = 'pending'
             ORDER BY priority DESC, created_at ASC
             LIMIT 1
         )
         RETURNING *",
    )
    .bind(now)
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// Generic status mutator. `failed` increments `attempts`; `failed` and
/// `processing` stamp `last_attempt_at`; diagnostic payloads are only
/// overwritten when provided.
pub async fn update_status(
    pool: &SqlitePool,
    id: Uuid,
    status: QueueStatus,
    result_data: Option<&str>,
    error_message: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<QueueItemRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueItemRow>(
        "UPDATE queue_items
         SET status = ?,
             attempts = attempts + (CASE WHEN ? = 'failed' THEN 1 ELSE 0 END),
             last_attempt_at = CASE WHEN ? IN ('failed', 'processing')
                                    THEN ? ELSE last_attempt_at END,
             result_data = COALESCE(?, result_data),
             error_message = COALESCE(?, error_message),
             updated_at = ?
         WHERE id = ?
         RETURNING *",
    )
    .bind(status)
    .bind(status)
    .bind(status)
    .bind(now)
    .bind(result_data)
    .bind(error_message)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn set_priority(
    pool: &SqlitePool,
    id: Uuid,
    priority: i64,
    now: DateTime<Utc>,
) -> Result<Option<QueueItemRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueItemRow>(
        "UPDATE queue_items SET priority = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(priority)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Move an item to a new schedule slot. The caller recomputes `status`
/// (`scheduled` for a future slot, `pending` otherwise).
pub async fn reschedule(
    pool: &SqlitePool,
    id: Uuid,
    scheduled_for: Option<DateTime<Utc>>,
    status: QueueStatus,
    now: DateTime<Utc>,
) -> Result<Option<QueueItemRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueItemRow>(
        "UPDATE queue_items SET scheduled_for = ?, status = ?, updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(scheduled_for)
    .bind(status)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM queue_items WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Promote every due `scheduled` item to `pending`. Returns the number moved.
pub async fn release_due(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE queue_items SET status = 'pending', updated_at = ?
         WHERE status = 'scheduled' AND scheduled_for <= ?",
    )
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Return `processing` items whose last attempt started before `cutoff` to
/// `pending`. `attempts` is untouched; a requeue is not a failure.
pub async fn requeue_stale(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE queue_items SET status = 'pending', updated_at = ?
         WHERE status = 'processing'
           AND COALESCE(last_attempt_at, updated_at) <= ?",
    )
    .bind(now)
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete terminal rows last touched before `cutoff`.
pub async fn delete_terminal_before(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM queue_items
         WHERE status IN ('completed', 'failed') AND updated_at < ?",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn exists_for_job(
    pool: &SqlitePool,
    job_id: &str,
    statuses: &[QueueStatus],
) -> Result<bool, sqlx::Error> {
    if statuses.is_empty() {
        return Ok(false);
    }

    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM queue_items WHERE job_id = ? AND status IN ({placeholders}))"
    );

    let mut query = sqlx::query_scalar::<_, bool>(&sql).bind(job_id);
    for status in statuses {
        query = query.bind(status);
    }
    query.fetch_one(pool).await
}

pub async fn count_by_status(
    pool: &SqlitePool,
) -> Result<Vec<(QueueStatus, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (QueueStatus, i64)>(
        "SELECT status, COUNT(*) FROM queue_items GROUP BY status",
    )
    .fetch_all(pool)
    .await
}
