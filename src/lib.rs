pub mod config;
pub mod db;
pub mod error;
pub mod executors;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod state;
pub mod worker;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::executors::{DryRunExecutor, ExecutorRegistry};
use crate::models::Pipeline;
use crate::queue::Queue;
use crate::state::{AppState, SharedState};

pub use crate::error::QueueError;
pub use crate::models::{NewQueueItem, QueueItem, QueueStats, QueueStatus};

/// Build the shared process state: the queue service plus an executor per
/// pipeline. Dry-run executors stand in until real adapters are registered.
pub fn build_state(pool: SqlitePool, config: Config) -> SharedState {
    let mut executors = ExecutorRegistry::new();
    executors.register(Arc::new(DryRunExecutor::new(Pipeline::JobPortals)));
    executors.register(Arc::new(DryRunExecutor::new(Pipeline::SocialMedia)));
    executors.register(Arc::new(DryRunExecutor::new(Pipeline::RejectionEmail)));

    tracing::info!("Executors registered for {:?}", executors.pipelines());

    Arc::new(AppState {
        queue: Queue::new(pool),
        config,
        executors,
    })
}
