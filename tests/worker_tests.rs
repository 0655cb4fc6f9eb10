mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use portalq::executors::{
    DryRunExecutor, ExecutorRegistry, TaskError, TaskExecutor, TaskResult,
};
use portalq::models::{NewQueueItem, Pipeline, QueueItem, QueueStatus};
use portalq::worker;

/// Test executor that records every item it sees and returns a canned
/// outcome.
struct RecordingExecutor {
    pipeline: Pipeline,
    seen: Arc<Mutex<Vec<Uuid>>>,
    outcome: Outcome,
}

enum Outcome {
    Succeed(serde_json::Value),
    Fail(&'static str),
    Hang,
}

impl RecordingExecutor {
    fn new(pipeline: Pipeline, outcome: Outcome) -> (Arc<Self>, Arc<Mutex<Vec<Uuid>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(Self {
            pipeline,
            seen: seen.clone(),
            outcome,
        });
        (executor, seen)
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    async fn execute(&self, item: &QueueItem) -> Result<TaskResult, TaskError> {
        self.seen.lock().unwrap().push(item.id);
        match &self.outcome {
            Outcome::Succeed(data) => Ok(TaskResult::with_data(data.clone())),
            Outcome::Fail(message) => Err(TaskError::from(*message)),
            Outcome::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(TaskResult::empty())
            }
        }
    }
}

#[tokio::test]
async fn process_next_on_empty_queue_does_nothing() {
    let pool = common::test_pool().await;
    let state = common::test_state(pool, common::test_config(), ExecutorRegistry::new());

    assert!(!worker::process_next(&state).await.unwrap());
}

#[tokio::test]
async fn successful_execution_completes_the_item_with_result_data() {
    let pool = common::test_pool().await;
    let (executor, seen) =
        RecordingExecutor::new(Pipeline::JobPortals, Outcome::Succeed(json!({ "posted": 2 })));
    let mut executors = ExecutorRegistry::new();
    executors.register(executor);
    let state = common::test_state(pool, common::test_config(), executors);

    let item = state
        .queue
        .enqueue(NewQueueItem::new(
            "J1",
            Pipeline::JobPortals,
            vec!["indeed".to_string(), "google_jobs".to_string()],
        ))
        .await
        .unwrap();

    assert!(worker::process_next(&state).await.unwrap());
    assert_eq!(seen.lock().unwrap().as_slice(), &[item.id]);

    let done = state.queue.get(item.id).await.unwrap().unwrap();
    assert_eq!(done.status, QueueStatus::Completed);
    assert_eq!(done.result_data.unwrap()["posted"], 2);
    assert_eq!(done.attempts, 0);
}

#[tokio::test]
async fn failed_execution_records_error_and_schedules_a_retry() {
    let pool = common::test_pool().await;
    let (executor, _) = RecordingExecutor::new(Pipeline::JobPortals, Outcome::Fail("portal down"));
    let mut executors = ExecutorRegistry::new();
    executors.register(executor);
    let state = common::test_state(pool, common::test_config(), executors);

    let item = state
        .queue
        .enqueue(NewQueueItem::new("J1", Pipeline::JobPortals, vec![]))
        .await
        .unwrap();

    assert!(worker::process_next(&state).await.unwrap());

    let retried = state.queue.get(item.id).await.unwrap().unwrap();
    assert_eq!(retried.status, QueueStatus::Scheduled);
    assert_eq!(retried.attempts, 1);
    assert_eq!(retried.error_message.as_deref(), Some("portal down"));
    assert!(retried.scheduled_for.unwrap() > Utc::now());
}

#[tokio::test]
async fn failed_execution_stops_retrying_after_max_attempts() {
    let pool = common::test_pool().await;
    let (executor, seen) = RecordingExecutor::new(Pipeline::JobPortals, Outcome::Fail("still down"));
    let mut executors = ExecutorRegistry::new();
    executors.register(executor);
    let mut config = common::test_config();
    config.max_attempts = 1;
    let state = common::test_state(pool, config, executors);

    let item = state
        .queue
        .enqueue(NewQueueItem::new("J1", Pipeline::JobPortals, vec![]))
        .await
        .unwrap();

    assert!(worker::process_next(&state).await.unwrap());

    let dead = state.queue.get(item.id).await.unwrap().unwrap();
    assert_eq!(dead.status, QueueStatus::Failed);
    assert_eq!(dead.attempts, 1);
    assert_eq!(seen.lock().unwrap().len(), 1);

    // terminal: nothing left to claim
    assert!(!worker::process_next(&state).await.unwrap());
}

#[tokio::test]
async fn missing_executor_fails_the_item_permanently() {
    let pool = common::test_pool().await;
    let state = common::test_state(pool, common::test_config(), ExecutorRegistry::new());

    let item = state
        .queue
        .enqueue(NewQueueItem::new("J1", Pipeline::SocialMedia, vec![]))
        .await
        .unwrap();

    assert!(worker::process_next(&state).await.unwrap());

    let dead = state.queue.get(item.id).await.unwrap().unwrap();
    assert_eq!(dead.status, QueueStatus::Failed);
    assert!(dead
        .error_message
        .unwrap()
        .contains("No executor registered"));

    assert!(!worker::process_next(&state).await.unwrap());
}

#[tokio::test]
async fn hung_executor_is_timed_out_and_retried() {
    let pool = common::test_pool().await;
    let (executor, _) = RecordingExecutor::new(Pipeline::JobPortals, Outcome::Hang);
    let mut executors = ExecutorRegistry::new();
    executors.register(executor);
    let mut config = common::test_config();
    config.task_timeout_secs = 1;
    let state = common::test_state(pool, config, executors);

    let item = state
        .queue
        .enqueue(NewQueueItem::new("J1", Pipeline::JobPortals, vec![]))
        .await
        .unwrap();

    assert!(worker::process_next(&state).await.unwrap());

    let timed_out = state.queue.get(item.id).await.unwrap().unwrap();
    assert_eq!(timed_out.status, QueueStatus::Scheduled);
    assert_eq!(timed_out.attempts, 1);
    assert!(timed_out.error_message.unwrap().contains("timed out"));
}

#[tokio::test]
async fn dry_run_executor_reports_target_count() {
    let pool = common::test_pool().await;
    let mut executors = ExecutorRegistry::new();
    executors.register(Arc::new(DryRunExecutor::new(Pipeline::JobPortals)));
    let state = common::test_state(pool, common::test_config(), executors);

    let item = state
        .queue
        .enqueue(NewQueueItem::new(
            "J1",
            Pipeline::JobPortals,
            vec!["indeed".to_string(), "google_jobs".to_string()],
        ))
        .await
        .unwrap();

    assert!(worker::process_next(&state).await.unwrap());

    let done = state.queue.get(item.id).await.unwrap().unwrap();
    assert_eq!(done.status, QueueStatus::Completed);
    assert_eq!(done.result_data.unwrap()["posted"], 2);
}
