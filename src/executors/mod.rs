pub mod dry_run;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Pipeline, QueueItem};

pub use dry_run::DryRunExecutor;

/// Outcome of a successfully executed task. `data` lands in the item's
/// `result_data` column.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub data: Option<serde_json::Value>,
}

impl TaskResult {
    pub fn empty() -> Self {
        Self { data: None }
    }

    pub fn with_data(data: serde_json::Value) -> Self {
        Self { data: Some(data) }
    }
}

#[derive(Debug)]
pub struct TaskError {
    pub message: String,
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<String> for TaskError {
    fn from(s: String) -> Self {
        TaskError { message: s }
    }
}

impl From<&str> for TaskError {
    fn from(s: &str) -> Self {
        TaskError {
            message: s.to_string(),
        }
    }
}

/// The dispatch seam between the queue and the outside world. Implementations
/// perform the actual portal publishing, social posting, or email delivery
/// for one pipeline.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn pipeline(&self) -> Pipeline;
    async fn execute(&self, item: &QueueItem) -> Result<TaskResult, TaskError>;
}

pub struct ExecutorRegistry {
    executors: HashMap<Pipeline, Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, executor: Arc<dyn TaskExecutor>) {
        self.executors.insert(executor.pipeline(), executor);
    }

    pub fn get(&self, pipeline: Pipeline) -> Option<&Arc<dyn TaskExecutor>> {
        self.executors.get(&pipeline)
    }

    pub fn pipelines(&self) -> Vec<Pipeline> {
        self.executors.keys().copied().collect()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
