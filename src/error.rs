use thiserror::Error;
use uuid::Uuid;

use crate::models::Pipeline;

/// The single error contract for every queue operation. Absent rows on read
/// paths are `Ok(None)` / `Ok(vec![])`, not errors; storage failures always
/// propagate.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue item not found: {0}")]
    NotFound(Uuid),

    #[error("job {job_id} already has an active {pipeline} queue item")]
    Duplicate { job_id: String, pipeline: Pipeline },

    #[error("invalid queue payload: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl QueueError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, QueueError::Duplicate { .. })
    }
}
