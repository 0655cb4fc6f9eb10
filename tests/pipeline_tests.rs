mod common;

use chrono::{Duration, Utc};

use portalq::models::{Pipeline, QueueStatus};
use portalq::pipeline::{PipelineManager, PostOptions};

#[tokio::test]
async fn portal_and_social_posts_for_one_job_coexist() {
    let queue = common::test_queue().await;
    let manager = PipelineManager::new(queue.clone());

    let portal = manager
        .submit_portal_post(
            "J1",
            vec!["indeed".to_string()],
            PostOptions {
                priority: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(portal.pipeline, Pipeline::JobPortals);
    assert_eq!(portal.priority, 5);
    assert_eq!(portal.status, QueueStatus::Pending);

    let social = manager
        .submit_social_post("J1", vec!["linkedin".to_string()], PostOptions::default())
        .await
        .unwrap();
    assert_eq!(social.pipeline, Pipeline::SocialMedia);

    assert_eq!(queue.for_job("J1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_portal_post_is_rejected() {
    let queue = common::test_queue().await;
    let manager = PipelineManager::new(queue);

    manager
        .submit_portal_post("J1", vec!["indeed".to_string()], PostOptions::default())
        .await
        .unwrap();

    let err = manager
        .submit_portal_post("J1", vec!["indeed".to_string()], PostOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
}

#[tokio::test]
async fn rejection_email_is_scheduled_and_cancellable() {
    let queue = common::test_queue().await;
    let manager = PipelineManager::new(queue.clone());
    let send_at = Utc::now() + Duration::days(3);

    let email = manager
        .submit_rejection_email("APP-7", send_at)
        .await
        .unwrap();
    assert_eq!(email.pipeline, Pipeline::RejectionEmail);
    assert_eq!(email.status, QueueStatus::Scheduled);
    assert_eq!(email.scheduled_for, Some(send_at));

    assert!(manager.cancel_rejection_email("APP-7").await.unwrap());
    assert!(queue.get(email.id).await.unwrap().is_none());

    // nothing left to cancel
    assert!(!manager.cancel_rejection_email("APP-7").await.unwrap());
}

#[tokio::test]
async fn cancel_leaves_in_flight_emails_alone() {
    let queue = common::test_queue().await;
    let pool = queue.pool().clone();
    let manager = PipelineManager::new(queue.clone());

    let email = manager
        .submit_rejection_email("APP-8", Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    // the send window arrives and a worker picks it up
    common::backdate_scheduled_for(&pool, email.id, Utc::now() - Duration::seconds(1)).await;
    let claimed = queue.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, email.id);

    assert!(!manager.cancel_rejection_email("APP-8").await.unwrap());
    assert!(queue.get(email.id).await.unwrap().is_some());
}
