//! `cronwork-driver` — pluggable persistence behind the schedule.
//!
//! A [`ScheduleDriver`] stores per-task last-run metadata, carries the
//! pending queue for ad-hoc tasks, and exposes a TTL-bounded lease used to
//! honour `without_overlapping` / `on_one_server`. Three interchangeable
//! implementations ship here: [`CacheDriver`] over any [`KeyValueCache`],
//! [`RedisDriver`] for cross-process deployments, and [`NullDriver`] to
//! disable persistence without branching call sites.

pub mod cache;
pub mod factory;
pub mod keys;
pub mod kv;
pub mod null;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use cronwork_core::TaskRecord;
use thiserror::Error;

pub use cache::CacheDriver;
pub use factory::{DriverConfig, DriverFactory};
pub use kv::{FileCache, KeyValueCache, MemoryCache};
pub use null::NullDriver;
pub use self::redis::RedisDriver;

/// Per-task state metadata: an opaque string-to-value mapping,
/// last-writer-wins.
pub type StateMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Uniform persistence contract shared by all driver variants.
#[async_trait]
pub trait ScheduleDriver: Send + Sync {
    /// Upsert the last recorded state for a task. Unknown ids are fine.
    async fn update_task_state(&self, task_id: &str, metadata: StateMap) -> Result<()>;

    async fn get_task_state(&self, task_id: &str) -> Result<Option<StateMap>>;

    /// Replace the compiled task list read at boot in production mode.
    async fn store_tasks(&self, tasks: &[TaskRecord]) -> Result<()>;

    /// Load the compiled task list, if one was ever stored.
    async fn load_tasks(&self) -> Result<Option<Vec<TaskRecord>>>;

    /// Append to the pending queue. Visible to the very next
    /// [`pop_pending_tasks`](ScheduleDriver::pop_pending_tasks) call,
    /// including across processes for the Redis variant.
    async fn push(&self, task: &TaskRecord) -> Result<()>;

    /// Atomically drain the whole queue. No task is ever delivered to two
    /// drains.
    async fn pop_pending_tasks(&self) -> Result<Vec<TaskRecord>>;

    /// Clear all state and locks for a task id.
    async fn forget(&self, task_id: &str) -> Result<()>;

    /// Take the execution lease for a task. `false` means another holder is
    /// still inside its TTL window and the caller must skip this run.
    async fn try_acquire(&self, task_id: &str, ttl: Duration) -> Result<bool>;

    async fn release(&self, task_id: &str) -> Result<()>;
}
