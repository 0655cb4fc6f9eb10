use async_trait::async_trait;
use serde_json::json;

use crate::models::{Pipeline, QueueItem};

use super::{TaskError, TaskExecutor, TaskResult};

/// Stand-in executor for deployments without real portal/social/email
/// adapters wired up. Logs what would have been posted and reports the
/// target count as the result payload.
pub struct DryRunExecutor {
    pipeline: Pipeline,
}

impl DryRunExecutor {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl TaskExecutor for DryRunExecutor {
    fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    async fn execute(&self, item: &QueueItem) -> Result<TaskResult, TaskError> {
        tracing::info!(
            "Dry run: would post job {} to {:?} via {}",
            item.job_id,
            item.target_portals,
            self.pipeline
        );

        Ok(TaskResult::with_data(json!({
            "dry_run": true,
            "posted": item.target_portals.len(),
        })))
    }
}
