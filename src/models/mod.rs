pub mod queue_item;

pub use queue_item::{NewQueueItem, Pipeline, QueueItem, QueueItemRow, QueueStats, QueueStatus};
