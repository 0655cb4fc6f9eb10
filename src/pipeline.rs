use chrono::{DateTime, Utc};

use crate::error::QueueError;
use crate::models::{NewQueueItem, Pipeline, QueueItem, QueueStatus};
use crate::queue::Queue;

/// Scheduling knobs shared by the submit calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostOptions {
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: i64,
}

/// Typed front door for the posting pipelines. Builds queue items for each
/// purpose and delegates everything else to the queue.
#[derive(Clone)]
pub struct PipelineManager {
    queue: Queue,
}

impl PipelineManager {
    pub fn new(queue: Queue) -> Self {
        Self { queue }
    }

    /// Queue a job for multi-portal publishing (Indeed, Google Jobs, ...).
    pub async fn submit_portal_post(
        &self,
        job_id: &str,
        portals: Vec<String>,
        opts: PostOptions,
    ) -> Result<QueueItem, QueueError> {
        self.submit(job_id, Pipeline::JobPortals, portals, opts).await
    }

    /// Queue a job opening for social network posting.
    pub async fn submit_social_post(
        &self,
        job_id: &str,
        networks: Vec<String>,
        opts: PostOptions,
    ) -> Result<QueueItem, QueueError> {
        self.submit(job_id, Pipeline::SocialMedia, networks, opts).await
    }

    /// Queue a delayed rejection email for an application, to go out at
    /// `send_at`.
    pub async fn submit_rejection_email(
        &self,
        application_id: &str,
        send_at: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        self.submit(
            application_id,
            Pipeline::RejectionEmail,
            Vec::new(),
            PostOptions {
                scheduled_for: Some(send_at),
                priority: 0,
            },
        )
        .await
    }

    /// Cancel a rejection email that has not started sending. Items already
    /// `processing` or terminal are left alone. Returns true if anything was
    /// cancelled.
    pub async fn cancel_rejection_email(
        &self,
        application_id: &str,
    ) -> Result<bool, QueueError> {
        let mut cancelled = false;
        for item in self.queue.for_job(application_id).await? {
            if item.pipeline == Pipeline::RejectionEmail
                && matches!(item.status, QueueStatus::Pending | QueueStatus::Scheduled)
            {
                cancelled |= self.queue.remove(item.id).await?;
            }
        }
        Ok(cancelled)
    }

    async fn submit(
        &self,
        job_id: &str,
        pipeline: Pipeline,
        targets: Vec<String>,
        opts: PostOptions,
    ) -> Result<QueueItem, QueueError> {
        let mut new = NewQueueItem::new(job_id, pipeline, targets).priority(opts.priority);
        if let Some(at) = opts.scheduled_for {
            new = new.scheduled_for(at);
        }

        self.queue.enqueue(new).await
    }
}
