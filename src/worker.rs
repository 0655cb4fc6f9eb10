use chrono::{Duration, Utc};
use tokio::sync::watch;

use crate::error::QueueError;
use crate::models::QueueStatus;
use crate::state::SharedState;

/// Start the worker pool on a dedicated Tokio runtime with its own thread
/// pool. Runs on a separate OS thread and blocks until shutdown is signaled.
pub fn run_pool(
    state: SharedState,
    shutdown: watch::Receiver<bool>,
    worker_count: usize,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("worker-pool".into())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(worker_count)
                .thread_name("queue-worker")
                .enable_all()
                .build()
                .expect("Failed to build worker runtime");

            runtime.block_on(async {
                let mut handles = Vec::with_capacity(worker_count + 1);

                for id in 0..worker_count {
                    handles.push(tokio::spawn(run(id, state.clone(), shutdown.clone())));
                }
                handles.push(tokio::spawn(maintenance(state.clone(), shutdown.clone())));

                tracing::info!("Queue worker pool started ({worker_count} workers)");

                for handle in handles {
                    let _ = handle.await;
                }

                tracing::info!("Queue worker pool stopped");
            });
        })
        .expect("Failed to spawn worker pool thread")
}

/// A single worker loop that polls the queue and processes items.
async fn run(id: usize, state: SharedState, mut shutdown: watch::Receiver<bool>) {
    tracing::debug!("Worker {id} started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        match process_next(&state).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Worker {id} error: {e}");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
            _ = shutdown.changed() => {}
        }
    }

    tracing::debug!("Worker {id} stopped");
}

/// Periodic housekeeping: promote due scheduled items, recover items stuck
/// in `processing`, and prune terminal items past the retention window.
async fn maintenance(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let interval = std::time::Duration::from_secs(state.config.sweep_interval_secs);
    let cleanup_every = (3600 / state.config.sweep_interval_secs).max(1);
    let mut ticks: u64 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => continue,
        }

        if let Err(e) = state.queue.release_due().await {
            tracing::error!("Scheduled sweep failed: {e}");
        }

        let timeout = Duration::seconds(state.config.processing_timeout_secs);
        if let Err(e) = state.queue.requeue_stale(timeout).await {
            tracing::error!("Stale requeue failed: {e}");
        }

        ticks += 1;
        if ticks % cleanup_every == 0 {
            if let Err(e) = state.queue.cleanup(Some(state.config.retention_days)).await {
                tracing::error!("Queue cleanup failed: {e}");
            }
        }
    }

    tracing::debug!("Maintenance loop stopped");
}

/// Claim and process the next queue item. Returns true if an item was
/// processed (successfully or not).
pub async fn process_next(state: &SharedState) -> Result<bool, QueueError> {
    let item = match state.queue.claim_next().await? {
        Some(item) => item,
        None => return Ok(false),
    };

    tracing::debug!(
        "Processing item {} (job={}, pipeline={}, attempt={})",
        item.id,
        item.job_id,
        item.pipeline,
        item.attempts
    );

    let executor = match state.executors.get(item.pipeline) {
        Some(executor) => executor,
        None => {
            // No executor means no retry can ever succeed.
            let message = format!("No executor registered for pipeline {}", item.pipeline);
            tracing::error!("Item {}: {message}", item.id);
            state
                .queue
                .update_status(item.id, QueueStatus::Failed, None, Some(&message))
                .await?;
            return Ok(true);
        }
    };

    let task_timeout = std::time::Duration::from_secs(state.config.task_timeout_secs);
    let outcome = tokio::time::timeout(task_timeout, executor.execute(&item)).await;

    match outcome {
        Ok(Ok(result)) => {
            state
                .queue
                .update_status(item.id, QueueStatus::Completed, result.data.as_ref(), None)
                .await?;
            tracing::debug!("Item {} completed", item.id);
        }
        Ok(Err(e)) => {
            fail_with_retry(state, item.id, &e.message).await?;
        }
        Err(_) => {
            let message = format!(
                "Task timed out after {}s",
                state.config.task_timeout_secs
            );
            fail_with_retry(state, item.id, &message).await?;
        }
    }

    Ok(true)
}

/// Mark an item failed; while attempts remain, push it back onto the
/// schedule with exponential backoff (2^attempts seconds).
async fn fail_with_retry(
    state: &SharedState,
    id: uuid::Uuid,
    message: &str,
) -> Result<(), QueueError> {
    let failed = state
        .queue
        .update_status(id, QueueStatus::Failed, None, Some(message))
        .await?;

    if failed.attempts < state.config.max_attempts {
        let backoff_secs = 2_i64.pow(failed.attempts.clamp(0, 30) as u32);
        let retry_at = Utc::now() + Duration::seconds(backoff_secs);
        state.queue.reschedule(id, Some(retry_at)).await?;
        tracing::warn!(
            "Item {id} failed (attempt {}/{}), retrying in {backoff_secs}s: {message}",
            failed.attempts,
            state.config.max_attempts
        );
    } else {
        tracing::error!(
            "Item {id} failed permanently after {} attempts: {message}",
            failed.attempts
        );
    }

    Ok(())
}
