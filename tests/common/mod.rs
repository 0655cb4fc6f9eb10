#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use portalq::config::Config;
use portalq::db;
use portalq::executors::ExecutorRegistry;
use portalq::queue::Queue;
use portalq::state::{AppState, SharedState};

/// A fresh in-memory database with the queue schema applied. Single
/// connection: every `:memory:` connection is its own database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    db::queue::init(&pool)
        .await
        .expect("failed to apply schema");
    pool
}

pub async fn test_queue() -> Queue {
    Queue::new(test_pool().await)
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        workers: 1,
        task_timeout_secs: 5,
        max_attempts: 3,
        processing_timeout_secs: 600,
        sweep_interval_secs: 30,
        retention_days: 30,
        log_level: "debug".to_string(),
    }
}

pub fn test_state(pool: SqlitePool, config: Config, executors: ExecutorRegistry) -> SharedState {
    Arc::new(AppState {
        queue: Queue::new(pool),
        config,
        executors,
    })
}

/// Rewrite `scheduled_for` directly, bypassing the queue API, to simulate
/// time passing.
pub async fn backdate_scheduled_for(pool: &SqlitePool, id: Uuid, at: DateTime<Utc>) {
    sqlx::query("UPDATE queue_items SET scheduled_for = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await
        .expect("failed to backdate scheduled_for");
}

pub async fn backdate_updated_at(pool: &SqlitePool, id: Uuid, at: DateTime<Utc>) {
    sqlx::query("UPDATE queue_items SET updated_at = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await
        .expect("failed to backdate updated_at");
}

pub async fn backdate_last_attempt_at(pool: &SqlitePool, id: Uuid, at: DateTime<Utc>) {
    sqlx::query("UPDATE queue_items SET last_attempt_at = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await
        .expect("failed to backdate last_attempt_at");
}
